//! Cancelable directory watch on top of `notify`

use anyhow::{Context, Result};
use notify::{Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Coarse kind of a filesystem event
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeKind {
    Created,
    Modified,
    Deleted,
    Other,
}

impl From<&EventKind> for ChangeKind {
    fn from(kind: &EventKind) -> Self {
        match kind {
            EventKind::Create(_) => ChangeKind::Created,
            EventKind::Modify(_) => ChangeKind::Modified,
            EventKind::Remove(_) => ChangeKind::Deleted,
            _ => ChangeKind::Other,
        }
    }
}

/// Watches one directory (non-recursive) and hands every `(path, kind)` pair
/// to a callback. The callback runs on notify's thread.
pub struct DirectoryWatch {
    watcher: Option<RecommendedWatcher>,
    dir: PathBuf,
}

impl DirectoryWatch {
    pub fn start<F>(dir: &Path, mut on_change: F) -> Result<Self>
    where
        F: FnMut(&Path, ChangeKind) + Send + 'static,
    {
        let mut watcher = notify::recommended_watcher(move |res: notify::Result<Event>| match res {
            Ok(event) => {
                let kind = ChangeKind::from(&event.kind);
                for path in &event.paths {
                    on_change(path, kind);
                }
            }
            Err(e) => warn!("Directory watch error: {}", e),
        })
        .context("Failed to create directory watcher")?;

        watcher
            .watch(dir, RecursiveMode::NonRecursive)
            .with_context(|| format!("Failed to watch {:?}", dir))?;
        debug!("Watching directory: {:?}", dir);

        Ok(Self {
            watcher: Some(watcher),
            dir: dir.to_path_buf(),
        })
    }

    pub fn is_active(&self) -> bool {
        self.watcher.is_some()
    }

    /// Stop watching. Safe to call more than once.
    pub fn cancel(&mut self) {
        if let Some(mut watcher) = self.watcher.take() {
            if let Err(e) = watcher.unwatch(&self.dir) {
                debug!("unwatch {:?}: {}", self.dir, e);
            }
            debug!("Stopped watching {:?}", self.dir);
        }
    }
}

impl Drop for DirectoryWatch {
    fn drop(&mut self) {
        self.cancel();
    }
}
