//! End-to-end scenarios for the long-search pipeline against a scripted
//! backend: full drains, interruption and resume, batch limits, and the
//! part-file sink.

use std::cell::Cell;
use std::path::PathBuf;

use tempfile::TempDir;

use trawl_core::backend::{Document, Page, SearchBackend, SearchRequest};
use trawl_core::error::{BackendError, ScrollError, SinkError};
use trawl_core::scroll::{LongSearch, ScrollState};
use trawl_core::sink::drain;
use trawl_core::store::{Checkpoint, FsStore};

/// Deterministic backend serving a fixed document set in page slices.
///
/// Cursor tokens are "p{k}", where "p{k}" fetches page k; the token
/// returned with page k is "p{k+1}". A slice past the end is the empty
/// page that signals exhaustion. `fail_page` injects one transient
/// failure for the named page, then clears itself.
struct SliceBackend {
    docs: Vec<Document>,
    page_size: usize,
    search_calls: Cell<usize>,
    scroll_calls: Cell<usize>,
    fail_page: Cell<Option<usize>>,
}

impl SliceBackend {
    fn new(total: usize, page_size: usize) -> Self {
        Self {
            docs: (0..total).map(doc).collect(),
            page_size,
            search_calls: Cell::new(0),
            scroll_calls: Cell::new(0),
            fail_page: Cell::new(None),
        }
    }

    fn fail_once_on_page(&self, page: usize) {
        self.fail_page.set(Some(page));
    }

    fn page(&self, k: usize) -> Result<Page, BackendError> {
        if self.fail_page.get() == Some(k) {
            self.fail_page.set(None);
            return Err(BackendError::Http {
                status: Some(503),
                message: "service unavailable".to_string(),
            });
        }
        let start = (k * self.page_size).min(self.docs.len());
        let end = (start + self.page_size).min(self.docs.len());
        Ok(Page {
            cursor: format!("p{}", k + 1),
            total: self.docs.len() as u64,
            hits: self.docs[start..end].to_vec(),
        })
    }
}

impl SearchBackend for SliceBackend {
    fn search(
        &self,
        _index: &str,
        _body: &serde_json::Value,
        _size: usize,
        _scroll: &str,
    ) -> Result<Page, BackendError> {
        self.search_calls.set(self.search_calls.get() + 1);
        self.page(0)
    }

    fn scroll(&self, cursor: &str, _scroll: &str) -> Result<Page, BackendError> {
        self.scroll_calls.set(self.scroll_calls.get() + 1);
        let k: usize = cursor
            .strip_prefix('p')
            .and_then(|s| s.parse().ok())
            .expect("scripted cursor token");
        self.page(k)
    }
}

fn doc(k: usize) -> Document {
    let mut m = Document::new();
    m.insert("_id".to_string(), serde_json::json!(k));
    m.insert("name".to_string(), serde_json::json!(format!("n-{k}")));
    m
}

fn request(page_size: usize, batch_limit: Option<usize>) -> SearchRequest {
    let mut req = SearchRequest::new("my-index", serde_json::json!({}));
    req.batch_size = page_size;
    req.batch_limit = batch_limit;
    req
}

fn checkpoint_path(dir: &TempDir) -> PathBuf {
    dir.path().join("my-index.cursor")
}

#[test]
fn generate_yields_full_document_set_in_page_batches() {
    let dir = TempDir::new().unwrap();
    let backend = SliceBackend::new(11, 4);
    let store = FsStore;
    let mut search = LongSearch::new(
        &backend,
        request(4, None),
        Checkpoint::new(&store, checkpoint_path(&dir)),
    );

    let batches: Vec<_> = search.generate().collect::<Result<_, _>>().unwrap();

    assert_eq!(batches.len(), 3);
    assert_eq!(
        batches.iter().map(Vec::len).collect::<Vec<_>>(),
        vec![4, 4, 3]
    );
    let flat: Vec<Document> = batches.into_iter().flatten().collect();
    assert_eq!(flat, backend.docs);
    assert_eq!(backend.search_calls.get(), 1);
}

#[test]
fn empty_result_set_yields_no_batches() {
    let dir = TempDir::new().unwrap();
    let backend = SliceBackend::new(0, 4);
    let store = FsStore;
    let mut search = LongSearch::new(
        &backend,
        request(4, None),
        Checkpoint::new(&store, checkpoint_path(&dir)),
    );

    let mut batches = search.generate();
    assert_eq!(batches.state(), ScrollState::Fresh);
    assert!(batches.next().is_none());
    assert_eq!(batches.state(), ScrollState::Exhausted);
    assert_eq!(batches.pages_fetched(), 0);
}

#[test]
fn exhaustion_removes_checkpoint_and_resume_yields_nothing() {
    let dir = TempDir::new().unwrap();
    let backend = SliceBackend::new(11, 4);
    let store = FsStore;
    let path = checkpoint_path(&dir);
    let mut search =
        LongSearch::new(&backend, request(4, None), Checkpoint::new(&store, &path));

    let count = search.generate().count();
    assert_eq!(count, 3);
    assert!(!path.exists());

    let mut resumed = search.resume().unwrap();
    assert_eq!(resumed.state(), ScrollState::Exhausted);
    assert!(resumed.next().is_none());
    // only the original scan touched the backend
    assert_eq!(backend.search_calls.get(), 1);
}

#[test]
fn resume_without_prior_run_yields_nothing() {
    let dir = TempDir::new().unwrap();
    let backend = SliceBackend::new(11, 4);
    let store = FsStore;
    let mut search = LongSearch::new(
        &backend,
        request(4, None),
        Checkpoint::new(&store, checkpoint_path(&dir)),
    );

    let mut resumed = search.resume().unwrap();
    assert!(resumed.next().is_none());
    assert_eq!(backend.search_calls.get(), 0);
    assert_eq!(backend.scroll_calls.get(), 0);
}

#[test]
fn checkpoint_commits_lag_one_pull_behind_delivery() {
    let dir = TempDir::new().unwrap();
    let backend = SliceBackend::new(20, 4);
    let store = FsStore;
    let path = checkpoint_path(&dir);
    let mut search =
        LongSearch::new(&backend, request(4, None), Checkpoint::new(&store, &path));

    let mut batches = search.generate();
    batches.next().unwrap().unwrap();
    // first batch delivered but not yet confirmed by a second pull
    assert!(!path.exists());

    batches.next().unwrap().unwrap();
    assert_eq!(std::fs::read_to_string(&path).unwrap(), "p1");

    batches.next().unwrap().unwrap();
    assert_eq!(std::fs::read_to_string(&path).unwrap(), "p2");
    assert_eq!(batches.state(), ScrollState::Paging);
}

#[test]
fn failure_preserves_checkpoint_and_resume_completes_the_scan() {
    let dir = TempDir::new().unwrap();
    let backend = SliceBackend::new(11, 4);
    let store = FsStore;
    let path = checkpoint_path(&dir);
    let mut search =
        LongSearch::new(&backend, request(4, None), Checkpoint::new(&store, &path));

    backend.fail_once_on_page(2);

    let mut delivered: Vec<Document> = Vec::new();
    let mut batches = search.generate();
    let mut saw_error = false;
    for batch in &mut batches {
        match batch {
            Ok(b) => delivered.extend(b),
            Err(ScrollError::Backend(_)) => saw_error = true,
            Err(e) => panic!("unexpected error: {e}"),
        }
    }
    assert!(saw_error);
    assert_eq!(batches.state(), ScrollState::Failed);
    assert_eq!(delivered.len(), 8);
    assert_eq!(std::fs::read_to_string(&path).unwrap(), "p2");

    // a new sequence picks up from the last committed cursor
    for batch in search.resume().unwrap() {
        delivered.extend(batch.unwrap());
    }
    assert_eq!(delivered, backend.docs);
    assert!(!path.exists());
    // resume never re-opened the search
    assert_eq!(backend.search_calls.get(), 1);
}

#[test]
fn abandoned_batch_is_redelivered_on_resume() {
    let dir = TempDir::new().unwrap();
    let backend = SliceBackend::new(12, 4);
    let store = FsStore;
    let path = checkpoint_path(&dir);
    let mut search =
        LongSearch::new(&backend, request(4, None), Checkpoint::new(&store, &path));

    // consumer walks away after two batches; the second is unconfirmed
    let taken: Vec<_> = search.generate().take(2).collect::<Result<_, _>>().unwrap();
    assert_eq!(taken.len(), 2);
    assert_eq!(std::fs::read_to_string(&path).unwrap(), "p1");

    let first_resumed = search.resume().unwrap().next().unwrap().unwrap();
    assert_eq!(first_resumed, backend.docs[4..8].to_vec());
}

#[test]
fn batch_limit_pauses_and_resume_continues() {
    let dir = TempDir::new().unwrap();
    let backend = SliceBackend::new(11, 4);
    let store = FsStore;
    let path = checkpoint_path(&dir);
    let mut search =
        LongSearch::new(&backend, request(4, Some(2)), Checkpoint::new(&store, &path));

    let mut batches = search.generate();
    let mut delivered: Vec<Document> = Vec::new();
    for batch in &mut batches {
        delivered.extend(batch.unwrap());
    }
    assert_eq!(batches.state(), ScrollState::StoppedByLimit);
    assert_eq!(batches.pages_fetched(), 2);
    assert_eq!(delivered.len(), 8);
    assert_eq!(std::fs::read_to_string(&path).unwrap(), "p2");

    // next call fetches at most another two pages; one remains
    for batch in search.resume().unwrap() {
        delivered.extend(batch.unwrap());
    }
    assert_eq!(delivered, backend.docs);
    assert!(!path.exists());
}

#[test]
fn batch_limit_zero_never_calls_the_backend() {
    let dir = TempDir::new().unwrap();
    let backend = SliceBackend::new(11, 4);
    let store = FsStore;
    let mut search = LongSearch::new(
        &backend,
        request(4, Some(0)),
        Checkpoint::new(&store, checkpoint_path(&dir)),
    );

    let mut batches = search.generate();
    assert!(batches.next().is_none());
    assert_eq!(batches.state(), ScrollState::StoppedByLimit);
    assert_eq!(backend.search_calls.get(), 0);
    assert_eq!(backend.scroll_calls.get(), 0);
}

#[test]
fn generate_twice_restarts_from_the_top() {
    let dir = TempDir::new().unwrap();
    let backend = SliceBackend::new(8, 4);
    let store = FsStore;
    let mut search = LongSearch::new(
        &backend,
        request(4, None),
        Checkpoint::new(&store, checkpoint_path(&dir)),
    );

    assert_eq!(search.generate().count(), 2);
    assert_eq!(search.generate().count(), 2);
    assert_eq!(backend.search_calls.get(), 2);
}

#[test]
fn fetch_all_collects_the_whole_result_set() {
    let dir = TempDir::new().unwrap();
    let backend = SliceBackend::new(11, 4);
    let store = FsStore;
    let mut search = LongSearch::new(
        &backend,
        request(4, None),
        Checkpoint::new(&store, checkpoint_path(&dir)),
    );

    let docs = search.fetch_all().unwrap();
    assert_eq!(docs, backend.docs);
}

#[test]
fn sink_writes_single_part_for_small_scroll() {
    // total=11, batch_size=4 -> batches [4,4,3]; flush_after=4 -> one file
    let dir = TempDir::new().unwrap();
    let backend = SliceBackend::new(11, 4);
    let store = FsStore;
    let mut search = LongSearch::new(
        &backend,
        request(4, None),
        Checkpoint::new(&store, checkpoint_path(&dir)),
    );

    let template = dir.path().join("part-{part}.jsonl");
    let paths = drain(search.generate(), &store, template.to_str().unwrap(), 4).unwrap();

    assert_eq!(paths.len(), 1);
    let content = std::fs::read_to_string(&paths[0]).unwrap();
    let written: Vec<Document> = content
        .lines()
        .map(|line| serde_json::from_str(line).unwrap())
        .collect();
    assert_eq!(written, backend.docs);
}

#[test]
fn sink_splits_parts_by_flush_threshold() {
    // 20 docs / page 4 -> 5 batches; k=2 -> 3 part files
    let dir = TempDir::new().unwrap();
    let backend = SliceBackend::new(20, 4);
    let store = FsStore;
    let mut search = LongSearch::new(
        &backend,
        request(4, None),
        Checkpoint::new(&store, checkpoint_path(&dir)),
    );

    let template = dir.path().join("part-{part}.jsonl");
    let paths = drain(search.generate(), &store, template.to_str().unwrap(), 2).unwrap();

    assert_eq!(paths.len(), 3);
    let mut written: Vec<Document> = Vec::new();
    for path in &paths {
        for line in std::fs::read_to_string(path).unwrap().lines() {
            written.push(serde_json::from_str(line).unwrap());
        }
    }
    assert_eq!(written, backend.docs);
}

#[test]
fn sink_config_is_checked_before_any_backend_call() {
    let dir = TempDir::new().unwrap();
    let backend = SliceBackend::new(11, 4);
    let store = FsStore;
    let mut search = LongSearch::new(
        &backend,
        request(4, None),
        Checkpoint::new(&store, checkpoint_path(&dir)),
    );

    let template = dir.path().join("no-placeholder.jsonl");
    let result = drain(search.generate(), &store, template.to_str().unwrap(), 4);
    assert!(matches!(result, Err(SinkError::Config(_))));
    assert_eq!(backend.search_calls.get(), 0);

    let template = dir.path().join("part-{part}.jsonl");
    let result = drain(search.generate(), &store, template.to_str().unwrap(), 0);
    assert!(matches!(result, Err(SinkError::Config(_))));
    assert_eq!(backend.search_calls.get(), 0);
}

#[test]
fn sink_then_resume_covers_every_document_after_a_failure() {
    let dir = TempDir::new().unwrap();
    let backend = SliceBackend::new(20, 4);
    let store = FsStore;
    let path = checkpoint_path(&dir);
    let mut search =
        LongSearch::new(&backend, request(4, None), Checkpoint::new(&store, &path));

    backend.fail_once_on_page(3);

    let template = dir.path().join("run1-{part}.jsonl");
    let result = drain(search.generate(), &store, template.to_str().unwrap(), 10);
    assert!(matches!(result, Err(SinkError::Scroll(_))));
    // delivered batches were flushed before the error surfaced
    let first_run = std::fs::read_to_string(dir.path().join("run1-0000.jsonl")).unwrap();
    assert_eq!(first_run.lines().count(), 12);

    let template = dir.path().join("run2-{part}.jsonl");
    let batches = search.resume().unwrap();
    let paths = drain(batches, &store, template.to_str().unwrap(), 10).unwrap();
    assert_eq!(paths.len(), 1);

    let mut written: Vec<Document> = first_run
        .lines()
        .map(|line| serde_json::from_str(line).unwrap())
        .collect();
    for line in std::fs::read_to_string(&paths[0]).unwrap().lines() {
        written.push(serde_json::from_str(line).unwrap());
    }
    assert_eq!(written, backend.docs);
}
