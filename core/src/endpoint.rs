//! Endpoint descriptors and request building.
//!
//! # Design
//! An API call is described by implementing [`Endpoint`]. The trait only
//! asks for data (path, method, query, headers, body); URL assembly and
//! header injection are provided methods so every endpoint builds its
//! request the same way.

use std::borrow::Cow;

use serde::Serialize;
use url::{form_urlencoded, Url};

use crate::error::ApiError;
use crate::http::{HttpMethod, HttpRequest};

pub const JSON_CONTENT_TYPE: &str = "application/json; charset=utf-8";

/// Description of a single API call.
pub trait Endpoint {
    /// Host-relative path. Must be empty or start with `/`.
    fn path(&self) -> Cow<'_, str>;

    fn method(&self) -> HttpMethod;

    fn query_items(&self) -> Option<Vec<(String, String)>> {
        None
    }

    fn headers(&self) -> Option<Vec<(String, String)>> {
        None
    }

    /// Produce the request body. Failures are propagated to the caller.
    fn body(&self) -> Result<Option<Vec<u8>>, ApiError> {
        Ok(None)
    }

    /// Assemble `https://{host}{path}?{query}` for this endpoint.
    fn url_for(&self, host: &str) -> Result<Url, ApiError> {
        if host.is_empty()
            || host
                .chars()
                .any(|c| c.is_whitespace() || matches!(c, '/' | '?' | '#' | '@' | '\\'))
        {
            return Err(ApiError::InvalidUrl);
        }

        let path = self.path();
        if !path.is_empty() && !path.starts_with('/') {
            return Err(ApiError::InvalidUrl);
        }

        let mut url = Url::parse(&format!("https://{host}")).map_err(|_| ApiError::InvalidUrl)?;
        url.set_path(&path);

        if let Some(items) = self.query_items().filter(|items| !items.is_empty()) {
            let query = items
                .iter()
                .map(|(name, value)| format!("{}={}", encode_component(name), encode_component(value)))
                .collect::<Vec<_>>()
                .join("&");
            url.set_query(Some(&query));
        }

        Ok(url)
    }

    /// Build the request for `host`, see [`Endpoint::request_from`].
    fn request_for(
        &self,
        host: &str,
        token: Option<&str>,
        cache_ttl: Option<u32>,
    ) -> Result<HttpRequest, ApiError> {
        let url = self.url_for(host)?;
        self.request_from(url, token, cache_ttl)
    }

    /// Build the request for an already assembled `url`.
    ///
    /// Descriptor headers go first; the JSON content type, the
    /// `Authorization` header (non-empty token only) and the `Cache-Control`
    /// hint (TTL only) replace descriptor headers of the same name.
    fn request_from(
        &self,
        url: Url,
        token: Option<&str>,
        cache_ttl: Option<u32>,
    ) -> Result<HttpRequest, ApiError> {
        let mut request = HttpRequest {
            method: self.method(),
            url,
            headers: self.headers().unwrap_or_default(),
            body: self.body()?,
        };

        request.set_header("Content-Type", JSON_CONTENT_TYPE);
        if let Some(token) = token.filter(|token| !token.is_empty()) {
            request.set_header("Authorization", format!("token {token}"));
        }
        if let Some(ttl) = cache_ttl {
            request.set_header("Cache-Control", format!("max-age={ttl}"));
        }

        Ok(request)
    }
}

/// Percent-encode a query name or value, spaces as `%20`.
fn encode_component(raw: &str) -> String {
    // byte_serialize writes a literal `+` as `%2B`, so every `+` left is a space.
    form_urlencoded::byte_serialize(raw.as_bytes())
        .collect::<String>()
        .replace('+', "%20")
}

/// Serialize `value` as a JSON request body.
pub fn json_body<T: Serialize + ?Sized>(value: &T) -> Result<Option<Vec<u8>>, ApiError> {
    serde_json::to_vec(value)
        .map(Some)
        .map_err(|e| ApiError::SerializationError(e.to_string()))
}
