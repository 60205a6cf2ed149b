//! Per-URL download registry.
//!
//! Each URL moves through `idle → in-flight → {completed | failed | cancelled}`.
//! Asking for a URL that is already in flight joins the running transfer
//! (same id, no second request); asking after it finished starts a fresh one.
//! Cancelling removes the entry.

pub(crate) mod transfer;

use std::collections::HashMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::{Error, Result};

/// Observable state of one download.
#[derive(Debug, Clone)]
pub enum DownloadStatus {
    Pending,
    Progress { downloaded: u64, total: Option<u64> },
    Completed(PathBuf),
    Failed(Error),
    Cancelled,
}

impl DownloadStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            DownloadStatus::Completed(_) | DownloadStatus::Failed(_) | DownloadStatus::Cancelled
        )
    }

    fn outcome(&self) -> Option<Result<PathBuf>> {
        match self {
            DownloadStatus::Completed(path) => Some(Ok(path.clone())),
            DownloadStatus::Failed(e) => Some(Err(e.clone())),
            DownloadStatus::Cancelled => Some(Err(Error::Cancelled)),
            _ => None,
        }
    }
}

/// Whether the body is streamed to disk or read into memory first.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DownloadKind {
    Streamed,
    Buffered,
}

pub type ProgressFn = Arc<dyn Fn(u64, Option<u64>) + Send + Sync>;

/// Where a download lands.
#[derive(Clone)]
pub struct DownloadTarget {
    pub dir: PathBuf,
    /// Defaults to the last URL path segment.
    pub file_name: Option<String>,
    pub on_progress: Option<ProgressFn>,
}

impl DownloadTarget {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            file_name: None,
            on_progress: None,
        }
    }

    pub fn file_name(mut self, name: impl Into<String>) -> Self {
        self.file_name = Some(name.into());
        self
    }

    /// Called on the io pool after every chunk with `(downloaded, total)`.
    pub fn on_progress<F>(mut self, f: F) -> Self
    where
        F: Fn(u64, Option<u64>) + Send + Sync + 'static,
    {
        self.on_progress = Some(Arc::new(f));
        self
    }

    pub(crate) fn resolve(&self, url: &url::Url) -> PathBuf {
        let name = self
            .file_name
            .clone()
            .filter(|n| !n.is_empty())
            .or_else(|| {
                url.path_segments()
                    .and_then(|mut s| s.next_back())
                    .filter(|s| !s.is_empty())
                    .map(str::to_owned)
            })
            .unwrap_or_else(|| "download".to_string());
        self.dir.join(name)
    }
}

impl fmt::Debug for DownloadTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DownloadTarget")
            .field("dir", &self.dir)
            .field("file_name", &self.file_name)
            .field("on_progress", &self.on_progress.is_some())
            .finish()
    }
}

struct Entry {
    id: u64,
    token: CancellationToken,
    status: Arc<watch::Sender<DownloadStatus>>,
}

impl Entry {
    /// Still transferring. A tripped token counts as finished even before
    /// the task has published `Cancelled`.
    fn is_live(&self) -> bool {
        !self.token.is_cancelled() && !self.status.borrow().is_terminal()
    }
}

/// Result of registering a URL.
pub(crate) enum Registration {
    /// A new transfer must be started; the sender publishes its status.
    Fresh(DownloadHandle, Arc<watch::Sender<DownloadStatus>>),
    /// An in-flight transfer already covers this URL.
    Joined(DownloadHandle),
}

#[derive(Default)]
pub struct DownloadManager {
    entries: Mutex<HashMap<String, Entry>>,
    next_id: AtomicU64,
}

impl DownloadManager {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<String, Entry>> {
        self.entries.lock().unwrap_or_else(|p| p.into_inner())
    }

    pub(crate) fn begin(&self, url: &str) -> Registration {
        let mut entries = self.lock();
        if let Some(entry) = entries.get(url) {
            if entry.is_live() {
                debug!(url, id = entry.id, "joining in-flight download");
                return Registration::Joined(DownloadHandle {
                    url: url.to_string(),
                    id: entry.id,
                    token: entry.token.clone(),
                    status: entry.status.subscribe(),
                });
            }
        }

        let id = self.next_id.fetch_add(1, Ordering::Relaxed) + 1;
        let token = CancellationToken::new();
        let (tx, rx) = watch::channel(DownloadStatus::Pending);
        let tx = Arc::new(tx);
        entries.insert(
            url.to_string(),
            Entry {
                id,
                token: token.clone(),
                status: tx.clone(),
            },
        );
        debug!(url, id, "registered download");
        Registration::Fresh(
            DownloadHandle {
                url: url.to_string(),
                id,
                token,
                status: rx,
            },
            tx,
        )
    }

    /// Cancel the download registered for `url` and forget it.
    pub fn cancel(&self, url: &str) -> bool {
        match self.lock().remove(url) {
            Some(entry) => {
                entry.token.cancel();
                debug!(url, id = entry.id, "download cancelled");
                true
            }
            None => false,
        }
    }

    pub(crate) fn forget(&self, url: &str, id: u64) {
        let mut entries = self.lock();
        if entries.get(url).map(|e| e.id) == Some(id) {
            entries.remove(url);
        }
    }

    pub fn status(&self, url: &str) -> Option<DownloadStatus> {
        self.lock().get(url).map(|e| e.status.borrow().clone())
    }

    /// Registration id for `url`, if any.
    pub fn id_of(&self, url: &str) -> Option<u64> {
        self.lock().get(url).map(|e| e.id)
    }

    pub fn in_flight(&self) -> usize {
        self.lock()
            .values()
            .filter(|e| e.is_live())
            .count()
    }
}

/// Caller's view of a registered download.
#[derive(Clone)]
pub struct DownloadHandle {
    url: String,
    id: u64,
    token: CancellationToken,
    status: watch::Receiver<DownloadStatus>,
}

impl DownloadHandle {
    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn status(&self) -> DownloadStatus {
        self.status.borrow().clone()
    }

    /// Cancel the transfer for every handle sharing this registration.
    pub fn cancel(&self) {
        self.token.cancel();
    }

    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }

    pub(crate) fn token(&self) -> &CancellationToken {
        &self.token
    }

    /// Wait for the terminal status.
    pub async fn wait(mut self) -> Result<PathBuf> {
        loop {
            if let Some(outcome) = self.status.borrow_and_update().outcome() {
                return outcome;
            }
            if self.status.changed().await.is_err() {
                return self
                    .status
                    .borrow()
                    .outcome()
                    .unwrap_or_else(|| Err(Error::unknown("download task ended without a result")));
            }
        }
    }
}

impl fmt::Debug for DownloadHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DownloadHandle")
            .field("url", &self.url)
            .field("id", &self.id)
            .field("status", &*self.status.borrow())
            .finish()
    }
}

pub(crate) fn part_path(path: &Path, id: u64) -> PathBuf {
    let mut name = path.file_name().map(|n| n.to_os_string()).unwrap_or_default();
    name.push(format!(".{id}.part"));
    path.with_file_name(name)
}
