//! Transport abstraction and the default `ureq` implementation.
//!
//! # Design
//! The pipeline never opens sockets itself. A [`Transport`] takes a built
//! [`HttpRequest`] and resolves to the raw [`HttpResponse`]; status codes are
//! returned as data, never as errors, so the pipeline owns status
//! interpretation. Implementations are shared between concurrent calls and
//! must handle their own pooling and synchronization.

use std::fmt;
use std::future::Future;
use std::io;
use std::time::Duration;

use ureq::http::Response;
use ureq::typestate::{WithBody, WithoutBody};
use ureq::{Agent, Body, RequestBuilder};

use crate::error::TransportError;
use crate::http::{HttpMethod, HttpRequest, HttpResponse};

/// Executes requests against the network.
pub trait Transport: Send + Sync + 'static {
    fn execute(
        &self,
        request: HttpRequest,
    ) -> impl Future<Output = Result<HttpResponse, TransportError>> + Send;
}

/// Blocking `ureq` agent driven from Tokio's blocking pool.
#[derive(Clone)]
pub struct UreqTransport {
    agent: Agent,
}

impl fmt::Debug for UreqTransport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UreqTransport").finish_non_exhaustive()
    }
}

impl UreqTransport {
    pub fn new() -> Self {
        Self::with_timeout(None)
    }

    /// A transport whose requests fail with `TimedOut` after `timeout`.
    pub fn with_timeout(timeout: Option<Duration>) -> Self {
        let agent = Agent::config_builder()
            .http_status_as_error(false)
            .timeout_global(timeout)
            .build()
            .new_agent();
        Self { agent }
    }
}

impl Default for UreqTransport {
    fn default() -> Self {
        Self::new()
    }
}

impl Transport for UreqTransport {
    async fn execute(&self, request: HttpRequest) -> Result<HttpResponse, TransportError> {
        let agent = self.agent.clone();
        tokio::task::spawn_blocking(move || execute_blocking(&agent, request))
            .await
            .map_err(|e| TransportError::failed(format!("transport task failed: {e}")))?
    }
}

fn execute_blocking(agent: &Agent, request: HttpRequest) -> Result<HttpResponse, TransportError> {
    let HttpRequest {
        method,
        url,
        headers,
        body,
    } = request;
    let url = url.as_str();

    let result = match method {
        HttpMethod::Get => send_without_body(agent.get(url), &headers, body),
        HttpMethod::Delete => send_without_body(agent.delete(url), &headers, body),
        HttpMethod::Head => send_without_body(agent.head(url), &headers, body),
        HttpMethod::Options => send_without_body(agent.options(url), &headers, body),
        HttpMethod::Trace => send_without_body(agent.trace(url), &headers, body),
        HttpMethod::Connect => send_without_body(agent.connect(url), &headers, body),
        HttpMethod::Post => send_with_body(agent.post(url), &headers, body),
        HttpMethod::Put => send_with_body(agent.put(url), &headers, body),
        HttpMethod::Patch => send_with_body(agent.patch(url), &headers, body),
    };

    let mut response = result.map_err(classify)?;
    let status = response.status().as_u16();
    let headers = response
        .headers()
        .iter()
        .filter_map(|(name, value)| Some((name.to_string(), value.to_str().ok()?.to_string())))
        .collect();
    // ureq caps bodies at 10 MiB by default; payload size is not a transport concern.
    let body = response
        .body_mut()
        .with_config()
        .limit(u64::MAX)
        .read_to_vec()
        .map_err(|e| TransportError::wrapping("reading response body failed", classify(e)))?;

    Ok(HttpResponse {
        status: Some(status),
        headers,
        body,
    })
}

fn with_headers<B>(mut builder: RequestBuilder<B>, headers: &[(String, String)]) -> RequestBuilder<B> {
    for (name, value) in headers {
        builder = builder.header(name.as_str(), value.as_str());
    }
    builder
}

fn send_without_body(
    builder: RequestBuilder<WithoutBody>,
    headers: &[(String, String)],
    body: Option<Vec<u8>>,
) -> Result<Response<Body>, ureq::Error> {
    let builder = with_headers(builder, headers);
    match body {
        Some(body) => builder.force_send_body().send(&body[..]),
        None => builder.call(),
    }
}

fn send_with_body(
    builder: RequestBuilder<WithBody>,
    headers: &[(String, String)],
    body: Option<Vec<u8>>,
) -> Result<Response<Body>, ureq::Error> {
    let builder = with_headers(builder, headers);
    match body {
        Some(body) => builder.send(&body[..]),
        None => builder.send_empty(),
    }
}

fn classify(error: ureq::Error) -> TransportError {
    match error {
        ureq::Error::Timeout(_) => TransportError::TimedOut,
        ureq::Error::Io(e) if is_offline(&e) => TransportError::Offline,
        ureq::Error::Io(e) => TransportError::wrapping(
            "connection failed",
            TransportError::failed(e.to_string()),
        ),
        other => TransportError::failed(other.to_string()),
    }
}

fn is_offline(error: &io::Error) -> bool {
    matches!(
        error.kind(),
        io::ErrorKind::NetworkUnreachable | io::ErrorKind::NetworkDown | io::ErrorKind::NotConnected
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unreachable_network_is_offline() {
        let err = io::Error::from(io::ErrorKind::NetworkUnreachable);
        assert_eq!(classify(ureq::Error::Io(err)), TransportError::Offline);
    }

    #[test]
    fn io_failures_keep_their_cause() {
        let err = io::Error::new(io::ErrorKind::ConnectionReset, "peer reset");
        let classified = classify(ureq::Error::Io(err));
        assert_eq!(classified.to_string(), "connection failed");
        assert_eq!(
            classified.into_underlying(),
            TransportError::failed("peer reset")
        );
    }

    #[test]
    fn other_failures_are_described() {
        let classified = classify(ureq::Error::HostNotFound);
        assert!(matches!(classified, TransportError::Failed { underlying: None, .. }));
    }
}
