//! Elasticsearch connection configuration

use std::time::Duration;

/// Connection settings for one cluster.
///
/// Retry behavior lives here, not in the pipeline: the generator above the
/// client never retries, so `max_retries` is the only retry knob.
#[derive(Debug, Clone)]
pub struct EsConfig {
    /// Cluster base URL, e.g. "http://localhost:9200"
    pub base_url: String,
    /// Basic-auth user, if the cluster requires one
    pub username: Option<String>,
    pub password: Option<String>,
    /// Per-request timeout
    pub timeout: Duration,
    /// Retries per call on 429/5xx/connection errors
    pub max_retries: u32,
}

impl Default for EsConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:9200".to_string(),
            username: None,
            password: None,
            timeout: Duration::from_secs(30),
            max_retries: 3,
        }
    }
}

impl EsConfig {
    /// Base URL without a trailing slash, ready for path joining.
    pub fn root(&self) -> &str {
        self.base_url.trim_end_matches('/')
    }
}
