//! Part-file sink — drain a batch sequence to numbered JSON-lines files

use std::io;
use std::path::PathBuf;

use crate::backend::{Batch, Document};
use crate::error::{ConfigError, ScrollError, SinkError};
use crate::store::StateStore;

/// Placeholder in the file name template, substituted with the part index.
pub const PART_PLACEHOLDER: &str = "{part}";

/// Reject a bad sink configuration before anything touches the backend.
fn validate(template: &str, flush_after_k_batches: usize) -> Result<(), ConfigError> {
    if !template.contains(PART_PLACEHOLDER) {
        return Err(ConfigError::MissingPartPlaceholder(template.to_string()));
    }
    if flush_after_k_batches == 0 {
        return Err(ConfigError::InvalidFlushThreshold(flush_after_k_batches));
    }
    Ok(())
}

/// Path of part `idx`. Zero-padded so part files sort lexically.
fn part_path(template: &str, idx: usize) -> PathBuf {
    PathBuf::from(template.replace(PART_PLACEHOLDER, &format!("{idx:04}")))
}

/// Serialize `docs` as JSON-lines and write the next part file.
fn flush<S: StateStore>(
    store: &S,
    template: &str,
    idx: usize,
    docs: &[Document],
) -> Result<PathBuf, SinkError> {
    let path = part_path(template, idx);
    let mut content = String::new();
    for doc in docs {
        let line = serde_json::to_string(doc).map_err(io::Error::other)?;
        content.push_str(&line);
        content.push('\n');
    }
    store.write_text(&path, &content)?;
    log::debug!("wrote {} documents to {}", docs.len(), path.display());
    Ok(path)
}

/// Drain `batches` to `{part}`-templated JSON-lines files.
///
/// Accumulates documents across batches and flushes every
/// `flush_after_k_batches` batches, plus any non-empty remainder when the
/// sequence ends. Returns the paths written, in creation order. At most
/// `flush_after_k_batches * batch_size` documents are held in memory; the
/// sink exists so a huge scroll never has to be collected whole.
///
/// When the sequence itself fails mid-drain, the accumulated remainder is
/// flushed before the error propagates: batches already handed over have
/// committed checkpoints and will not be re-fetched by a resumed run.
pub fn drain<I, S>(
    batches: I,
    store: &S,
    file_name_template: &str,
    flush_after_k_batches: usize,
) -> Result<Vec<PathBuf>, SinkError>
where
    I: IntoIterator<Item = Result<Batch, ScrollError>>,
    S: StateStore,
{
    validate(file_name_template, flush_after_k_batches)?;

    let mut paths: Vec<PathBuf> = Vec::new();
    let mut docs: Vec<Document> = Vec::new();
    let mut pending = 0usize;

    for batch in batches {
        let batch = match batch {
            Ok(b) => b,
            Err(e) => {
                if !docs.is_empty() {
                    paths.push(flush(store, file_name_template, paths.len(), &docs)?);
                }
                return Err(SinkError::Scroll(e));
            }
        };
        docs.extend(batch);
        pending += 1;
        if pending >= flush_after_k_batches {
            paths.push(flush(store, file_name_template, paths.len(), &docs)?);
            docs.clear();
            pending = 0;
        }
    }
    if !docs.is_empty() {
        paths.push(flush(store, file_name_template, paths.len(), &docs)?);
    }
    Ok(paths)
}
