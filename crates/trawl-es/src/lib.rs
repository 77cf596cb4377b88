//! Elasticsearch backend for the trawl long-search pipeline
//!
//! Implements [`trawl_core::SearchBackend`] over the `_search?scroll=` and
//! `_search/scroll` HTTP endpoints.

pub mod client;
pub mod config;

pub use client::{EsClient, SHARED_RUNTIME};
pub use config::EsConfig;
