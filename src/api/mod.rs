//! HTTP API
//!
//! The REST surface every node exposes: `/set`, `/get`, `/replicate`,
//! `/health`, `/status`.

mod http;

pub use http::HttpServer;
