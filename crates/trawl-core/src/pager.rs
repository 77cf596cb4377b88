//! Stateless paging layer over the search backend

use crate::backend::{Page, SearchBackend, SearchRequest};
use crate::error::BackendError;

/// Pure translation layer between the two backend calls and the batch
/// generator: one method per call, no retries, no state. Failure and
/// end-of-results policy live in [`crate::scroll::LongSearch`].
pub struct CursorPager<'a, B: SearchBackend> {
    backend: &'a B,
    request: &'a SearchRequest,
}

impl<'a, B: SearchBackend> CursorPager<'a, B> {
    pub fn new(backend: &'a B, request: &'a SearchRequest) -> Self {
        Self { backend, request }
    }

    /// Issue the initial search and return the first page.
    pub fn open(&self) -> Result<Page, BackendError> {
        self.backend.search(
            &self.request.index,
            &self.request.body,
            self.request.batch_size,
            &self.request.scroll,
        )
    }

    /// Fetch the page that `cursor` points at.
    pub fn advance(&self, cursor: &str) -> Result<Page, BackendError> {
        self.backend.scroll(cursor, &self.request.scroll)
    }
}
