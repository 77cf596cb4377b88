//! Durable text storage for checkpoints and part files

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

/// Storage seam between the pipeline and the outside world.
///
/// The pipeline touches durable storage only through this trait: the scroll
/// checkpoint and the sink's part files. The path scheme is caller-supplied
/// and otherwise opaque. Passing the store in explicitly keeps two pipeline
/// instances in one process from colliding on hidden global paths.
pub trait StateStore {
    /// Read a whole file as UTF-8, `None` if it does not exist.
    fn read_text(&self, path: &Path) -> io::Result<Option<String>>;

    /// Overwrite a file with `content`. Readers must never observe a
    /// partially written file.
    fn write_text(&self, path: &Path, content: &str) -> io::Result<()>;

    /// Remove a file. Removing a missing file is not an error.
    fn delete(&self, path: &Path) -> io::Result<()>;
}

/// Local-filesystem store with atomic tmp→rename overwrite.
#[derive(Debug, Clone, Copy, Default)]
pub struct FsStore;

fn tmp_path(path: &Path) -> PathBuf {
    let mut os = path.as_os_str().to_os_string();
    os.push(".tmp");
    PathBuf::from(os)
}

impl StateStore for FsStore {
    fn read_text(&self, path: &Path) -> io::Result<Option<String>> {
        match fs::read_to_string(path) {
            Ok(content) => Ok(Some(content)),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e),
        }
    }

    fn write_text(&self, path: &Path, content: &str) -> io::Result<()> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }
        let tmp = tmp_path(path);
        fs::write(&tmp, content)?;
        fs::rename(&tmp, path)
    }

    fn delete(&self, path: &Path) -> io::Result<()> {
        match fs::remove_file(path) {
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
            other => other,
        }
    }
}

/// Durably persisted cursor token enabling resumption after interruption.
///
/// The file holds exactly one token as plain text. It is overwritten after
/// every committed page and removed when the scroll is exhausted.
#[derive(Debug)]
pub struct Checkpoint<'a, S: StateStore> {
    store: &'a S,
    path: PathBuf,
}

impl<'a, S: StateStore> Checkpoint<'a, S> {
    pub fn new(store: &'a S, path: impl Into<PathBuf>) -> Self {
        Self {
            store,
            path: path.into(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Last committed cursor token, `None` if no run left one behind.
    pub fn load(&self) -> io::Result<Option<String>> {
        self.store.read_text(&self.path)
    }

    pub fn save(&self, cursor: &str) -> io::Result<()> {
        self.store.write_text(&self.path, cursor)
    }

    pub fn clear(&self) -> io::Result<()> {
        self.store.delete(&self.path)
    }
}
