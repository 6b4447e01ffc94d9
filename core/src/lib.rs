//! Client core for the LocalBitcoins HTTP API.
//!
//! # Overview
//! Three kinds of calls share one contract: online-ad feeds, public calls and
//! HMAC-signed private calls. A call is classified by `Method`, turned into a
//! fully signed `HttpRequest`, executed by a `Transport`, and its response is
//! normalized into `Result<serde_json::Value, ApiError>`.
//!
//! # Design
//! - `Method` is a closed enum; each variant knows its category and whether
//!   parameters travel as a POST body or a GET query.
//! - `build_request` / `parse_response` keep the I/O boundary explicit, so a
//!   host can run the round-trip itself. `call` wires them to the client's
//!   transport (`UreqTransport` by default).
//! - Nonces come from a per-client atomic sequence and are strictly
//!   increasing even under concurrent use.

pub mod auth;
pub mod client;
pub mod config;
pub mod error;
pub mod http;
pub mod method;
pub mod params;
#[cfg(feature = "ureq")]
pub mod transport;

pub use auth::{sign, Credentials, NonceSequence};
pub use client::{LbcClient, RequestTarget};
pub use config::ClientConfig;
pub use error::{ApiError, TransportError};
pub use http::{HttpMethod, HttpRequest, HttpResponse, Transport};
pub use method::{classify, Category, Method, MethodSpec, Submission};
pub use params::{ParamValue, RequestParams};
#[cfg(feature = "ureq")]
pub use transport::UreqTransport;
