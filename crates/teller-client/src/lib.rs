//! HTTP client for the teller wallet backend.
//!
//! Domain operations (balances, transfers, swaps) are thin parameterized
//! calls built on [`ApiClient::get`] / [`ApiClient::post`]; the client's
//! job is attaching the effective access token to every request and
//! surfacing authorization failures instead of swallowing them.

pub mod client;
pub mod error;

pub use client::{ApiClient, ClientBuilder};
pub use error::{Error, Result};
