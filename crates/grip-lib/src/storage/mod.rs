//! Listing and downloading recordings.
//!
//! A store exposes one folder level at a time, the shape of the remote
//! listing API. `RecordWalk` drives a store with an explicit worklist
//! instead of recursion, yielding records as soon as their folder has been
//! listed, and `list_all` drains the walk into the path-sorted listing the
//! tree is built from.

mod cache;

pub use cache::{CachedStore, RetryPolicy, TtlCache};

use std::collections::VecDeque;
use std::fs;
use std::path::PathBuf;

use crate::error::{Error, Result};
use crate::record::FileRecord;

/// One entry of a folder listing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreEntry {
    Folder { id: String, name: String },
    File { id: String, name: String },
}

/// Remote (or remote-like) recording storage.
pub trait FileStore {
    /// Immediate children of one folder, files and subfolders alike.
    fn list_folder(&self, folder_id: &str) -> Result<Vec<StoreEntry>>;

    /// Raw bytes of one recording.
    fn download(&self, file_id: &str) -> Result<Vec<u8>>;
}

/// Worklist traversal of a store, yielding `.json` files lazily.
///
/// Folders are listed one at a time as the iterator is pulled, so a caller
/// that stops early never pays for the rest of the hierarchy. A listing
/// failure ends the walk after yielding the error.
pub struct RecordWalk<'a, S: ?Sized> {
    store: &'a S,
    stack: Vec<(String, String)>,
    ready: VecDeque<FileRecord>,
    failed: bool,
}

impl<'a, S: FileStore + ?Sized> RecordWalk<'a, S> {
    pub fn new(store: &'a S, root_id: &str) -> Self {
        RecordWalk {
            store,
            stack: vec![(root_id.to_string(), String::new())],
            ready: VecDeque::new(),
            failed: false,
        }
    }
}

impl<'a, S: FileStore + ?Sized> Iterator for RecordWalk<'a, S> {
    type Item = Result<FileRecord>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.failed {
            return None;
        }
        loop {
            if let Some(record) = self.ready.pop_front() {
                return Some(Ok(record));
            }
            let (folder_id, prefix) = self.stack.pop()?;
            let entries = match self.store.list_folder(&folder_id) {
                Ok(entries) => entries,
                Err(err) => {
                    self.failed = true;
                    return Some(Err(err));
                }
            };
            for entry in entries {
                match entry {
                    StoreEntry::Folder { id, name } => {
                        let child_prefix = join_path(&prefix, &name);
                        self.stack.push((id, child_prefix));
                    }
                    StoreEntry::File { id, name } => {
                        if name.ends_with(".json") {
                            let path = join_path(&prefix, &name);
                            self.ready.push_back(FileRecord { id, name, path });
                        }
                    }
                }
            }
        }
    }
}

fn join_path(prefix: &str, name: &str) -> String {
    if prefix.is_empty() {
        name.to_string()
    } else {
        format!("{prefix}/{name}")
    }
}

/// Complete recursive listing under `root_id`, sorted by path.
pub fn list_all<S: FileStore + ?Sized>(store: &S, root_id: &str) -> Result<Vec<FileRecord>> {
    let mut records = RecordWalk::new(store, root_id).collect::<Result<Vec<_>>>()?;
    records.sort_by(|a, b| a.path.cmp(&b.path));
    Ok(records)
}

/// `FileStore` over a local directory; ids are paths relative to the root.
///
/// Used by the shells for local browsing and by tests as a real store with
/// no network behind it.
pub struct LocalDirStore {
    root: PathBuf,
}

impl LocalDirStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        LocalDirStore { root: root.into() }
    }

    /// Listing id of the store root.
    pub fn root_id(&self) -> &'static str {
        ""
    }

    fn resolve(&self, id: &str) -> PathBuf {
        if id.is_empty() {
            self.root.clone()
        } else {
            self.root.join(id)
        }
    }
}

impl FileStore for LocalDirStore {
    fn list_folder(&self, folder_id: &str) -> Result<Vec<StoreEntry>> {
        let dir = self.resolve(folder_id);
        let reader = fs::read_dir(&dir)
            .map_err(|err| Error::remote(format!("{}: {err}", dir.display())))?;
        let mut entries = Vec::new();
        for entry in reader {
            let entry = entry.map_err(Error::remote)?;
            let name = entry.file_name().to_string_lossy().into_owned();
            let id = join_path(folder_id, &name);
            let kind = entry.file_type().map_err(Error::remote)?;
            if kind.is_dir() {
                entries.push(StoreEntry::Folder { id, name });
            } else if kind.is_file() {
                entries.push(StoreEntry::File { id, name });
            }
        }
        // read_dir order is platform-dependent; keep listings deterministic.
        entries.sort_by(|a, b| {
            let name = |e: &StoreEntry| match e {
                StoreEntry::Folder { name, .. } | StoreEntry::File { name, .. } => name.clone(),
            };
            name(a).cmp(&name(b))
        });
        Ok(entries)
    }

    fn download(&self, file_id: &str) -> Result<Vec<u8>> {
        fs::read(self.resolve(file_id)).map_err(|err| Error::remote(format!("{file_id}: {err}")))
    }
}
