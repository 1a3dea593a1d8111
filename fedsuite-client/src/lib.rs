//! API client for the forum instances under test
//!
//! [`FederatedApi`] is the seam the harness drives. [`HttpClient`] speaks the
//! real `/api/v4` HTTP API; with the `test-support` feature an in-memory
//! [`fake::FakeFederation`] implements the same trait.

pub mod api;
pub mod forms;
pub mod http;

#[cfg(any(test, feature = "test-support"))]
pub mod fake;

pub use api::FederatedApi;
pub use http::HttpClient;
