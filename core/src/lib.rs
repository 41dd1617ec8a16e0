//! Asynchronous HTTP request pipeline with typed decoding.
//!
//! # Overview
//! An API call is described by an [`Endpoint`]. A [`WebRepository`] turns it
//! into an HTTPS request, runs it on a [`Transport`], checks the status
//! against an accepted range, decodes the JSON body, and hands back a
//! [`Call`]: a single-shot future that can be awaited or sunk into a
//! callback running on a [`DeliveryQueue`].
//!
//! # Design
//! - Request building, status validation and decoding are plain functions
//!   over plain data ([`HttpRequest`], [`HttpResponse`]); only the transport
//!   does I/O.
//! - Every failure is an [`ApiError`] value. Nothing is retried.
//! - Pipeline work never runs on the delivery thread; only callbacks do.
//! - [`Call::ensure_time_span`] holds fast outcomes back for a minimum time
//!   so UIs do not flicker.

pub mod call;
pub mod config;
pub mod delivery;
pub mod endpoint;
pub mod error;
pub mod http;
pub mod loadable;
pub mod repository;
pub mod response;
pub mod transport;

pub use call::{Call, Subscription};
pub use config::{ConfigError, RepositoryConfig};
pub use delivery::DeliveryQueue;
pub use endpoint::{json_body, Endpoint, JSON_CONTENT_TYPE};
pub use error::{ApiError, TransportError};
pub use http::{codes, HttpCodes, HttpMethod, HttpRequest, HttpResponse};
pub use loadable::Loadable;
pub use repository::{RemoteRepository, WebRepository};
pub use transport::{Transport, UreqTransport};
