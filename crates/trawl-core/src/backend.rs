//! Search backend contract and the long-search data model

use serde_json::Value;

use crate::error::BackendError;

/// Documents requested per page when the caller does not say otherwise.
pub const DEFAULT_BATCH_SIZE: usize = 1000;

/// Cursor lifetime between calls when the caller does not say otherwise.
pub const DEFAULT_SCROLL: &str = "1m";

/// Schemaless record returned by the backend. The pipeline never looks at
/// its fields beyond counting documents.
pub type Document = serde_json::Map<String, Value>;

/// The document sequence of one page, as handed to consumers.
pub type Batch = Vec<Document>;

/// One backend response: a slice of results plus the token for the next one.
#[derive(Debug, Clone)]
pub struct Page {
    /// Opaque token that fetches the page after this one
    pub cursor: String,
    /// Declared total result count, stable for one scroll lifetime
    pub total: u64,
    /// Documents in this page; empty signals exhaustion
    pub hits: Vec<Document>,
}

/// Immutable inputs for one long search.
#[derive(Debug, Clone)]
pub struct SearchRequest {
    /// Index or collection to search
    pub index: String,
    /// Opaque query payload, forwarded to the backend verbatim
    pub body: Value,
    /// Documents requested per page
    pub batch_size: usize,
    /// Cursor lifetime the backend keeps the scroll open between calls
    pub scroll: String,
    /// Hard stop on pages fetched per `generate()`/`resume()` call
    pub batch_limit: Option<usize>,
}

impl SearchRequest {
    pub fn new(index: impl Into<String>, body: Value) -> Self {
        Self {
            index: index.into(),
            body,
            batch_size: DEFAULT_BATCH_SIZE,
            scroll: DEFAULT_SCROLL.to_string(),
            batch_limit: None,
        }
    }
}

/// Paging contract with the search backend.
///
/// Two calls, one page each, both fallible. Implementations may retry
/// transient failures internally; everything above this seam treats a
/// returned error as final for the current call.
pub trait SearchBackend {
    /// Issue the initial search, opening a server-side cursor.
    fn search(
        &self,
        index: &str,
        body: &Value,
        size: usize,
        scroll: &str,
    ) -> Result<Page, BackendError>;

    /// Fetch the next page for an open cursor.
    fn scroll(&self, cursor: &str, scroll: &str) -> Result<Page, BackendError>;
}
