//! Elasticsearch HTTP client implementing the search backend contract.
//!
//! Uses async reqwest internally but presents the sync interface the
//! pull-based pipeline expects. One request per page, retried here (and
//! only here) on transient failures.

use std::sync::LazyLock;
use std::time::Duration;

use serde::Deserialize;
use serde_json::Value;

use trawl_core::backend::{Document, Page, SearchBackend};
use trawl_core::error::BackendError;
use trawl_core::retry::retry_with_backoff;

use crate::config::EsConfig;

/// Connect timeout
const CONNECT_TIMEOUT: Duration = Duration::from_secs(30);

/// Shared async HTTP client with connection pooling.
static SHARED_CLIENT: LazyLock<reqwest::Client> = LazyLock::new(|| {
    reqwest::Client::builder()
        .connect_timeout(CONNECT_TIMEOUT)
        .pool_max_idle_per_host(2)
        .build()
        .expect("failed to build HTTP client")
});

/// Shared tokio runtime for HTTP operations.
pub static SHARED_RUNTIME: LazyLock<tokio::runtime::Runtime> = LazyLock::new(|| {
    tokio::runtime::Builder::new_multi_thread()
        .worker_threads(2)
        .enable_all()
        .build()
        .expect("failed to build tokio runtime")
});

fn from_reqwest(e: &reqwest::Error) -> BackendError {
    BackendError::Http {
        status: e.status().map(|s| s.as_u16()),
        message: e.to_string(),
    }
}

/// Response envelope shared by `_search` and `_search/scroll`.
#[derive(Debug, Deserialize)]
struct ScrollResponse {
    #[serde(rename = "_scroll_id", default)]
    scroll_id: Option<String>,
    hits: HitsEnvelope,
}

#[derive(Debug, Deserialize)]
struct HitsEnvelope {
    total: TotalCount,
    hits: Vec<Document>,
}

/// ES 7.x reports the total as `{"value": N, "relation": ...}`;
/// 6.x as a bare integer.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum TotalCount {
    Tracked { value: u64 },
    Bare(u64),
}

impl TotalCount {
    fn value(&self) -> u64 {
        match self {
            Self::Tracked { value } => *value,
            Self::Bare(n) => *n,
        }
    }
}

fn parse_page(text: &str) -> Result<Page, BackendError> {
    let resp: ScrollResponse = serde_json::from_str(text)
        .map_err(|e| BackendError::Malformed(format!("scroll response: {e}")))?;
    Ok(Page {
        cursor: resp.scroll_id.unwrap_or_default(),
        total: resp.hits.total.value(),
        hits: resp.hits.hits,
    })
}

/// Elasticsearch client for one cluster.
pub struct EsClient {
    config: EsConfig,
}

impl EsClient {
    pub fn new(config: EsConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &EsConfig {
        &self.config
    }

    /// POST a JSON body and return the response text.
    fn post_json(&self, url: &str, body: &Value) -> Result<String, BackendError> {
        SHARED_RUNTIME.handle().block_on(async {
            let mut req = SHARED_CLIENT
                .post(url)
                .header(reqwest::header::CONTENT_TYPE, "application/json")
                .timeout(self.config.timeout)
                .body(body.to_string());
            if let Some(user) = &self.config.username {
                req = req.basic_auth(user, self.config.password.as_deref());
            }
            let resp = req
                .send()
                .await
                .and_then(|r| r.error_for_status())
                .map_err(|e| from_reqwest(&e))?;
            resp.text().await.map_err(|e| from_reqwest(&e))
        })
    }

    fn fetch_page(&self, label: &str, url: &str, body: &Value) -> Result<Page, BackendError> {
        retry_with_backoff(label, self.config.max_retries, || {
            let text = self.post_json(url, body)?;
            parse_page(&text)
        })
    }
}

impl SearchBackend for EsClient {
    fn search(
        &self,
        index: &str,
        body: &Value,
        size: usize,
        scroll: &str,
    ) -> Result<Page, BackendError> {
        let url = format!(
            "{}/{}/_search?scroll={}&size={}",
            self.config.root(),
            index,
            scroll,
            size
        );
        log::debug!("opening scroll on {index} (size={size}, scroll={scroll})");
        self.fetch_page("search", &url, body)
    }

    fn scroll(&self, cursor: &str, scroll: &str) -> Result<Page, BackendError> {
        let url = format!("{}/_search/scroll", self.config.root());
        let body = serde_json::json!({
            "scroll": scroll,
            "scroll_id": cursor,
        });
        self.fetch_page("scroll", &url, &body)
    }
}
