//! Resumable batch generation over a server-side cursor
//!
//! [`LongSearch`] pages through a scroll the backend holds open and yields
//! one [`Batch`] per page, lazily: nothing is fetched until the consumer
//! asks for the next element, and exactly one page fetch is in flight at a
//! time. The cursor needed to fetch the page after batch N is committed to
//! the checkpoint when the consumer pulls batch N+1, that is, only once
//! batch N is safely with the consumer. A batch pulled but never followed by
//! another pull is re-fetched by [`LongSearch::resume`] rather than
//! silently skipped, so delivery across interrupted runs is at-least-once.

use indicatif::ProgressBar;

use crate::backend::{Batch, Document, Page, SearchBackend, SearchRequest};
use crate::error::ScrollError;
use crate::pager::CursorPager;
use crate::progress::upgrade_to_pages;
use crate::store::{Checkpoint, StateStore};

/// Observable position in the scroll lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScrollState {
    /// No page fetched yet
    Fresh,
    /// Cursor established, pages flowing
    Paging,
    /// Backend returned an empty page; the checkpoint has been removed
    Exhausted,
    /// `batch_limit` pages were fetched; the checkpoint is retained
    StoppedByLimit,
    /// A failure surfaced to the consumer; the checkpoint is retained
    Failed,
}

/// A restartable long search against one index.
///
/// Holds the backend, the immutable request, and the checkpoint location.
/// [`generate`](Self::generate) starts a brand-new scan;
/// [`resume`](Self::resume) continues from whatever cursor an earlier run
/// committed, in this process or another one.
pub struct LongSearch<'a, B: SearchBackend, S: StateStore> {
    backend: &'a B,
    request: SearchRequest,
    checkpoint: Checkpoint<'a, S>,
    progress: Option<ProgressBar>,
}

impl<'a, B: SearchBackend, S: StateStore> LongSearch<'a, B, S> {
    pub fn new(backend: &'a B, request: SearchRequest, checkpoint: Checkpoint<'a, S>) -> Self {
        Self {
            backend,
            request,
            checkpoint,
            progress: None,
        }
    }

    /// Attach a progress bar, advanced once per fetched page.
    pub fn with_progress(mut self, bar: ProgressBar) -> Self {
        self.progress = Some(bar);
        self
    }

    pub fn request(&self) -> &SearchRequest {
        &self.request
    }

    pub fn checkpoint(&self) -> &Checkpoint<'a, S> {
        &self.checkpoint
    }

    /// Start a brand-new scan from the first page.
    ///
    /// Calling this again re-opens the search from the top; it is not a
    /// resumption. Cursor advancement is strictly sequential, so the
    /// exclusive borrow keeps a second sequence from racing this one on
    /// the same checkpoint.
    pub fn generate(&mut self) -> Batches<'_, B, S> {
        Batches::new(self, Phase::Fresh)
    }

    /// Continue from the cursor persisted by an earlier run.
    ///
    /// Reads the checkpoint from the store at call time, not from memory,
    /// so a different process or instance can pick up the scroll. A missing
    /// checkpoint is the expected state after exhaustion and produces an
    /// empty sequence. Never re-issues the initial search.
    pub fn resume(&mut self) -> Result<Batches<'_, B, S>, ScrollError> {
        match self.checkpoint.load() {
            Ok(Some(cursor)) => Ok(Batches::new(self, Phase::Resume(cursor))),
            Ok(None) => {
                log::debug!(
                    "no checkpoint at {}, nothing to resume",
                    self.checkpoint.path().display()
                );
                Ok(Batches::new(self, Phase::NoCheckpoint))
            }
            Err(e) => Err(ScrollError::Checkpoint(e)),
        }
    }

    /// Drain a fresh scan into one vector.
    ///
    /// For result sets known to fit in memory; everything else should
    /// iterate [`generate`](Self::generate) or drain to part files.
    pub fn fetch_all(&mut self) -> Result<Vec<Document>, ScrollError> {
        let mut docs = Vec::new();
        for batch in self.generate() {
            docs.extend(batch?);
        }
        Ok(docs)
    }
}

enum Phase {
    Fresh,
    /// Cursor read back from the checkpoint, next page not yet fetched
    Resume(String),
    /// Last page delivered; its continuation cursor not yet committed
    Pending(String),
    /// `resume()` found nothing to do
    NoCheckpoint,
    Exhausted,
    StoppedByLimit,
    Failed,
}

/// Lazy batch sequence produced by [`LongSearch::generate`] or
/// [`LongSearch::resume`].
pub struct Batches<'a, B: SearchBackend, S: StateStore> {
    search: &'a LongSearch<'a, B, S>,
    phase: Phase,
    pages: usize,
}

impl<'a, B: SearchBackend, S: StateStore> Batches<'a, B, S> {
    fn new(search: &'a LongSearch<'a, B, S>, phase: Phase) -> Self {
        Self {
            search,
            phase,
            pages: 0,
        }
    }

    pub fn state(&self) -> ScrollState {
        match self.phase {
            Phase::Fresh | Phase::Resume(_) => ScrollState::Fresh,
            Phase::Pending(_) => ScrollState::Paging,
            Phase::NoCheckpoint | Phase::Exhausted => ScrollState::Exhausted,
            Phase::StoppedByLimit => ScrollState::StoppedByLimit,
            Phase::Failed => ScrollState::Failed,
        }
    }

    /// Pages fetched by this sequence so far.
    pub fn pages_fetched(&self) -> usize {
        self.pages
    }

    fn pager(&self) -> CursorPager<'a, B> {
        CursorPager::new(self.search.backend, &self.search.request)
    }

    fn limit_reached(&self) -> bool {
        self.search
            .request
            .batch_limit
            .is_some_and(|limit| self.pages >= limit)
    }

    /// Hand a fetched page to the consumer, or finish on an empty page.
    fn deliver(&mut self, page: Page) -> Option<Result<Batch, ScrollError>> {
        if page.hits.is_empty() {
            // natural end of the scroll: nothing left to resume
            if let Err(e) = self.search.checkpoint.clear() {
                self.phase = Phase::Failed;
                return Some(Err(ScrollError::Checkpoint(e)));
            }
            log::debug!("scroll exhausted after {} pages", self.pages);
            self.phase = Phase::Exhausted;
            return None;
        }
        if let Some(pb) = &self.search.progress {
            if self.pages == 0 && page.total > 0 {
                let batch = self.search.request.batch_size.max(1) as u64;
                upgrade_to_pages(pb, page.total.div_ceil(batch));
            }
            pb.inc(1);
        }
        self.pages += 1;
        self.phase = Phase::Pending(page.cursor);
        Some(Ok(page.hits))
    }

    fn fail(&mut self, e: impl Into<ScrollError>) -> Option<Result<Batch, ScrollError>> {
        self.phase = Phase::Failed;
        Some(Err(e.into()))
    }
}

impl<'a, B: SearchBackend, S: StateStore> Iterator for Batches<'a, B, S> {
    type Item = Result<Batch, ScrollError>;

    fn next(&mut self) -> Option<Self::Item> {
        match std::mem::replace(&mut self.phase, Phase::Failed) {
            Phase::Fresh => {
                if self.limit_reached() {
                    self.phase = Phase::StoppedByLimit;
                    return None;
                }
                match self.pager().open() {
                    Ok(page) => self.deliver(page),
                    Err(e) => self.fail(e),
                }
            }
            Phase::Resume(cursor) => {
                if self.limit_reached() {
                    self.phase = Phase::StoppedByLimit;
                    return None;
                }
                match self.pager().advance(&cursor) {
                    Ok(page) => self.deliver(page),
                    Err(e) => self.fail(e),
                }
            }
            Phase::Pending(cursor) => {
                // the previous batch is now safely with the consumer
                if let Err(e) = self.search.checkpoint.save(&cursor) {
                    return self.fail(ScrollError::Checkpoint(e));
                }
                if self.limit_reached() {
                    log::debug!("batch limit reached after {} pages", self.pages);
                    self.phase = Phase::StoppedByLimit;
                    return None;
                }
                match self.pager().advance(&cursor) {
                    Ok(page) => self.deliver(page),
                    Err(e) => self.fail(e),
                }
            }
            Phase::NoCheckpoint => {
                self.phase = Phase::NoCheckpoint;
                None
            }
            Phase::Exhausted => {
                self.phase = Phase::Exhausted;
                None
            }
            Phase::StoppedByLimit => {
                self.phase = Phase::StoppedByLimit;
                None
            }
            Phase::Failed => {
                self.phase = Phase::Failed;
                None
            }
        }
    }
}
