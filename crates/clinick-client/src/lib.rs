//! HTTP client for the Clinick incident reporting backend
//!
//! The backend exposes report creation, listing, a mark-as-seen call, a CSV
//! export and push token registration. [`ReportBackend`] is the seam the
//! dashboard depends on; [`ApiClient`] implements it over HTTP.

#![forbid(unsafe_code)]
#![warn(
    clippy::all,
    clippy::pedantic,
    clippy::nursery,
    missing_docs,
    rust_2018_idioms
)]

pub mod api_client;
pub mod backend;
pub mod error;

#[cfg(feature = "mock")]
pub mod mock;

pub use api_client::ApiClient;
pub use backend::ReportBackend;
pub use error::{ClientError, ClientResult};

#[cfg(feature = "mock")]
pub use mock::MockBackend;
