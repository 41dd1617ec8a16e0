//! The call pipeline.
//!
//! # Design
//! [`WebRepository::call`] is the only entry point: it builds the request,
//! runs it on the repository's transport, validates and decodes the
//! response, and returns a [`Call`] bound to the repository's delivery
//! queue. Request construction happens eagerly so a bad endpoint fails
//! without touching the transport; everything else runs when the call is
//! polled. The repository holds no mutable state, so concurrent calls are
//! independent.

use std::sync::Arc;

use serde::de::DeserializeOwned;

use crate::call::Call;
use crate::config::RepositoryConfig;
use crate::delivery::DeliveryQueue;
use crate::endpoint::Endpoint;
use crate::http::HttpCodes;
use crate::response;
use crate::transport::{Transport, UreqTransport};

/// Something that can run endpoints against a host.
pub trait WebRepository {
    type Transport: Transport;

    fn host(&self) -> &str;

    /// Shared transport; concurrent calls reuse it.
    fn transport(&self) -> Arc<Self::Transport>;

    /// Where sinks deliver outcomes.
    fn delivery(&self) -> &DeliveryQueue;

    /// Run `endpoint` and decode its response as `T`.
    ///
    /// Statuses outside `codes` fail with
    /// [`ApiError::UnexpectedStatus`](crate::ApiError::UnexpectedStatus).
    fn call<T>(
        &self,
        endpoint: &impl Endpoint,
        token: Option<&str>,
        cache_ttl: Option<u32>,
        codes: HttpCodes,
    ) -> Call<T>
    where
        T: DeserializeOwned + Send + 'static,
    {
        let delivery = self.delivery().clone();
        let request = match endpoint.request_for(self.host(), token, cache_ttl) {
            Ok(request) => request,
            Err(error) => {
                tracing::error!(%error, host = self.host(), "failed to build request");
                return Call::ready(Err(error), delivery);
            }
        };

        let transport = self.transport();
        let guard = delivery.clone();
        Call::new(
            async move {
                let url = request.url.clone();
                tracing::info!(method = %request.method, %url, "sending request");
                let outcome = transport.execute(request).await;
                guard.debug_assert_not_current();

                let outcome = response::process(outcome, &codes);
                if let Err(error) = &outcome {
                    tracing::error!(%error, %url, "request failed");
                }
                outcome
            },
            delivery,
        )
    }
}

/// A [`WebRepository`] over a fixed host and transport.
pub struct RemoteRepository<T> {
    host: String,
    transport: Arc<T>,
    delivery: DeliveryQueue,
}

impl<T: Transport> RemoteRepository<T> {
    pub fn new(host: impl Into<String>, transport: T, delivery: DeliveryQueue) -> Self {
        Self {
            host: host.into(),
            transport: Arc::new(transport),
            delivery,
        }
    }
}

impl RemoteRepository<UreqTransport> {
    /// Repository over a `ureq` transport delivering on the main queue.
    pub fn from_config(config: &RepositoryConfig) -> Self {
        Self::new(
            config.host.clone(),
            UreqTransport::with_timeout(config.timeout),
            DeliveryQueue::main().clone(),
        )
    }
}

impl<T: Transport> WebRepository for RemoteRepository<T> {
    type Transport = T;

    fn host(&self) -> &str {
        &self.host
    }

    fn transport(&self) -> Arc<T> {
        Arc::clone(&self.transport)
    }

    fn delivery(&self) -> &DeliveryQueue {
        &self.delivery
    }
}

impl<T> std::fmt::Debug for RemoteRepository<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RemoteRepository")
            .field("host", &self.host)
            .field("delivery", &self.delivery)
            .finish_non_exhaustive()
    }
}
