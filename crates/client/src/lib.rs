//! Network bridge for iconcache.
//!
//! This crate provides the HTTP fetch pipeline the cache uses to download
//! icons, with SSRF protection and size and content-type gates.

pub mod fetch;

pub use fetch::{FetchClient, FetchConfig, FetchResponse};
