//! Concrete collaborator backends.
//!
//! - [`fixture::FixtureGateway`] serves every collaborator from a JSON
//!   fixture file, for offline runs and tests.
//! - [`http::HttpGateway`] talks to the association's REST API (behind the
//!   default `http` feature).
//!
//! The in-memory reference backend lives in `intake_gateway::memory`.

pub mod fixture;
#[cfg(feature = "http")]
pub mod http;

pub use fixture::{FixtureError, FixtureGateway};
#[cfg(feature = "http")]
pub use http::HttpGateway;
