use crate::entry::{EntryHandle, EntryKind};
use async_trait::async_trait;
use std::collections::{BTreeMap, BTreeSet};
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

/// One immediate child reported by a directory read.
#[derive(Debug, Clone)]
pub struct RawEntry {
    pub name: String,
    pub kind: EntryKind,
    pub handle: EntryHandle,
}

impl RawEntry {
    pub fn new(name: impl Into<String>, kind: EntryKind, handle: EntryHandle) -> Self {
        Self {
            name: name.into(),
            kind,
            handle,
        }
    }
}

/// Lists the immediate children of a directory handle.
///
/// Results may arrive in any order; the engine sorts them.
#[async_trait]
pub trait DirectoryReader: Send + Sync {
    async fn read_dir(&self, handle: &EntryHandle) -> io::Result<Vec<RawEntry>>;
}

/// Reads file contents at export time.
#[async_trait]
pub trait FileReader: Send + Sync {
    async fn file_size(&self, handle: &EntryHandle) -> io::Result<u64>;

    /// File contents as text. Invalid UTF-8 is replaced, not rejected.
    async fn read_text(&self, handle: &EntryHandle) -> io::Result<String>;
}

/// Local disk backend. Symlinks are followed; entries whose metadata cannot
/// be read are skipped, as are hidden paths and everything beneath them.
#[derive(Debug, Clone, Default)]
pub struct LocalFs {
    hidden: Vec<PathBuf>,
}

impl LocalFs {
    pub fn new() -> Self {
        Self::default()
    }

    /// Never lists `path` or anything beneath it.
    pub fn hiding(mut self, path: impl Into<PathBuf>) -> Self {
        self.hidden.push(path.into());
        self
    }

    fn is_hidden(&self, path: &Path) -> bool {
        self.hidden.iter().any(|hidden| path.starts_with(hidden))
    }
}

#[async_trait]
impl DirectoryReader for LocalFs {
    async fn read_dir(&self, handle: &EntryHandle) -> io::Result<Vec<RawEntry>> {
        let dir = handle.location();
        log::trace!("Reading directory {}", dir.display());
        let mut reader = tokio::fs::read_dir(dir).await?;
        let mut entries = Vec::new();
        while let Some(item) = reader.next_entry().await? {
            let path = item.path();
            if self.is_hidden(&path) {
                log::trace!("Hidden path {}", path.display());
                continue;
            }
            let metadata = match tokio::fs::metadata(&path).await {
                Ok(m) => m,
                Err(e) => {
                    log::warn!("Skipping {}: {}", path.display(), e);
                    continue;
                }
            };
            let kind = if metadata.is_dir() {
                EntryKind::Directory
            } else {
                EntryKind::File
            };
            let name = item.file_name().to_string_lossy().into_owned();
            entries.push(RawEntry::new(name, kind, EntryHandle::new(path)));
        }
        log::trace!("{} entries in {}", entries.len(), dir.display());
        Ok(entries)
    }
}

#[async_trait]
impl FileReader for LocalFs {
    async fn file_size(&self, handle: &EntryHandle) -> io::Result<u64> {
        Ok(tokio::fs::metadata(handle.location()).await?.len())
    }

    async fn read_text(&self, handle: &EntryHandle) -> io::Result<String> {
        let bytes = tokio::fs::read(handle.location()).await?;
        Ok(String::from_utf8_lossy(&bytes).into_owned())
    }
}

#[derive(Debug, Clone)]
enum MemoryNode {
    Dir,
    File(String),
}

/// In-memory backend keyed by slash-joined relative paths. The root handle
/// has an empty location.
///
/// Paths can be marked unreadable and reads are counted, which makes it the
/// backend of choice for tests and embedding.
#[derive(Debug, Default)]
pub struct MemoryFs {
    nodes: BTreeMap<String, MemoryNode>,
    unreadable: BTreeSet<String>,
    read_delay: Option<Duration>,
    dir_reads: AtomicUsize,
    file_reads: AtomicUsize,
    reads_by_path: Mutex<BTreeMap<String, usize>>,
}

impl MemoryFs {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn root_handle() -> EntryHandle {
        EntryHandle::new("")
    }

    pub fn handle(path: &str) -> EntryHandle {
        EntryHandle::new(path)
    }

    /// Adds a file, creating missing parent directories.
    pub fn with_file(mut self, path: &str, content: impl Into<String>) -> Self {
        self.add_parents(path);
        self.nodes
            .insert(path.to_string(), MemoryNode::File(content.into()));
        self
    }

    pub fn with_dir(mut self, path: &str) -> Self {
        self.add_parents(path);
        self.nodes.insert(path.to_string(), MemoryNode::Dir);
        self
    }

    /// Reads of this path (directory listing or file contents) fail with
    /// `PermissionDenied`.
    pub fn with_unreadable(mut self, path: &str) -> Self {
        self.unreadable.insert(path.to_string());
        self
    }

    /// Every read sleeps this long first.
    pub fn with_read_delay(mut self, delay: Duration) -> Self {
        self.read_delay = Some(delay);
        self
    }

    pub fn kind_of(&self, path: &str) -> Option<EntryKind> {
        if path.is_empty() {
            return Some(EntryKind::Directory);
        }
        self.nodes.get(path).map(|node| match node {
            MemoryNode::Dir => EntryKind::Directory,
            MemoryNode::File(_) => EntryKind::File,
        })
    }

    pub fn dir_reads(&self) -> usize {
        self.dir_reads.load(Ordering::SeqCst)
    }

    pub fn file_reads(&self) -> usize {
        self.file_reads.load(Ordering::SeqCst)
    }

    /// Number of directory reads issued for `path` ("" is the root).
    pub fn dir_reads_of(&self, path: &str) -> usize {
        let reads = self
            .reads_by_path
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        reads.get(path).copied().unwrap_or(0)
    }

    fn add_parents(&mut self, path: &str) {
        let mut parent = path;
        while let Some((head, _)) = parent.rsplit_once('/') {
            self.nodes
                .entry(head.to_string())
                .or_insert(MemoryNode::Dir);
            parent = head;
        }
    }

    async fn pause(&self) {
        if let Some(delay) = self.read_delay {
            tokio::time::sleep(delay).await;
        }
    }

    fn key(handle: &EntryHandle) -> String {
        path_key(handle.location())
    }

    fn file_content(&self, key: &str) -> io::Result<&str> {
        if self.unreadable.contains(key) {
            return Err(io::Error::new(
                io::ErrorKind::PermissionDenied,
                format!("{} is unreadable", key),
            ));
        }
        match self.nodes.get(key) {
            Some(MemoryNode::File(content)) => Ok(content),
            Some(MemoryNode::Dir) => Err(io::Error::other(format!("{} is a directory", key))),
            None => Err(io::Error::new(
                io::ErrorKind::NotFound,
                format!("{} not found", key),
            )),
        }
    }
}

fn path_key(location: &Path) -> String {
    location
        .components()
        .map(|c| c.as_os_str().to_string_lossy())
        .collect::<Vec<_>>()
        .join("/")
}

fn parent_key(path: &str) -> &str {
    path.rsplit_once('/').map(|(head, _)| head).unwrap_or("")
}

#[async_trait]
impl DirectoryReader for MemoryFs {
    async fn read_dir(&self, handle: &EntryHandle) -> io::Result<Vec<RawEntry>> {
        self.pause().await;
        let key = Self::key(handle);
        self.dir_reads.fetch_add(1, Ordering::SeqCst);
        *self
            .reads_by_path
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .entry(key.clone())
            .or_insert(0) += 1;

        if self.unreadable.contains(&key) {
            return Err(io::Error::new(
                io::ErrorKind::PermissionDenied,
                format!("{} is unreadable", key),
            ));
        }
        match self.kind_of(&key) {
            Some(EntryKind::Directory) => {}
            Some(EntryKind::File) => {
                return Err(io::Error::other(format!("{} is not a directory", key)));
            }
            None => {
                return Err(io::Error::new(
                    io::ErrorKind::NotFound,
                    format!("{} not found", key),
                ));
            }
        }

        Ok(self
            .nodes
            .iter()
            .filter(|(path, _)| parent_key(path) == key)
            .map(|(path, node)| {
                let name = path.rsplit('/').next().unwrap_or(path);
                let kind = match node {
                    MemoryNode::Dir => EntryKind::Directory,
                    MemoryNode::File(_) => EntryKind::File,
                };
                RawEntry::new(name, kind, EntryHandle::new(path.as_str()))
            })
            .collect())
    }
}

#[async_trait]
impl FileReader for MemoryFs {
    async fn file_size(&self, handle: &EntryHandle) -> io::Result<u64> {
        let key = Self::key(handle);
        Ok(self.file_content(&key)?.len() as u64)
    }

    async fn read_text(&self, handle: &EntryHandle) -> io::Result<String> {
        self.pause().await;
        self.file_reads.fetch_add(1, Ordering::SeqCst);
        let key = Self::key(handle);
        self.file_content(&key).map(str::to_string)
    }
}
