//! Page acquisition over plain HTTP.
//!
//! The fetch stage of the audit pipeline: retrieve the raw HTML that the
//! DOM builder will sanitize and load.

pub mod http_client;

pub use http_client::{FetchedPage, HttpClient};
