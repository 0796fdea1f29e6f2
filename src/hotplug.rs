//! Mouse hotplug detection and settings-file watching
//!
//! Both are directory watches whose callbacks only post events; the engine
//! does the actual work on the control thread.

use crate::engine::Event;
use crate::watch::{ChangeKind, DirectoryWatch};
use anyhow::{Context, Result};
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use tokio::sync::mpsc::UnboundedSender;
use tracing::{debug, info};

/// Where the kernel creates `mouseN` nodes
pub const DEVICE_DIR: &str = "/dev/input";

const MOUSE_PREFIX: &str = "mouse";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HotplugEvent {
    pub path: PathBuf,
    pub kind: ChangeKind,
}

impl HotplugEvent {
    pub fn plugged(&self) -> bool {
        self.kind == ChangeKind::Created
    }
}

/// Keep only mouse node creation and removal
pub fn filter_event(path: &Path, kind: ChangeKind) -> Option<HotplugEvent> {
    if !matches!(kind, ChangeKind::Created | ChangeKind::Deleted) {
        return None;
    }
    let name = path.file_name()?.to_str()?;
    name.starts_with(MOUSE_PREFIX).then(|| HotplugEvent {
        path: path.to_path_buf(),
        kind,
    })
}

pub struct HotplugMonitor {
    watch: DirectoryWatch,
}

impl HotplugMonitor {
    pub fn start(dir: &Path, tx: UnboundedSender<Event>) -> Result<Self> {
        let watch = DirectoryWatch::start(dir, move |path, kind| {
            if let Some(event) = filter_event(path, kind) {
                debug!("Hotplug: {:?} {:?}", event.kind, event.path);
                let _ = tx.send(Event::Hotplug(event));
            }
        })?;
        info!("Watching {:?} for mouse hotplug", dir);
        Ok(Self { watch })
    }

    pub fn cancel(&mut self) {
        self.watch.cancel();
    }
}

/// Posts [`Event::SettingsFileChanged`] when the settings file is written by
/// someone else (an editor, the CLI, or ourselves; reloads are diffed)
pub struct SettingsWatch {
    watch: DirectoryWatch,
}

impl SettingsWatch {
    pub fn start(settings_path: &Path, tx: UnboundedSender<Event>) -> Result<Self> {
        let dir = settings_path
            .parent()
            .context("Settings path has no parent directory")?;
        std::fs::create_dir_all(dir)
            .with_context(|| format!("Failed to create config directory {:?}", dir))?;
        let file_name: OsString = settings_path
            .file_name()
            .context("Settings path has no file name")?
            .to_os_string();

        let watch = DirectoryWatch::start(dir, move |path, kind| {
            let ours = path.file_name() == Some(file_name.as_os_str());
            if ours && matches!(kind, ChangeKind::Created | ChangeKind::Modified) {
                let _ = tx.send(Event::SettingsFileChanged);
            }
        })?;
        Ok(Self { watch })
    }

    pub fn cancel(&mut self) {
        self.watch.cancel();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_filter_event() {
        let mouse = Path::new("/dev/input/mouse2");
        assert_eq!(
            filter_event(mouse, ChangeKind::Created),
            Some(HotplugEvent {
                path: mouse.to_path_buf(),
                kind: ChangeKind::Created
            })
        );
        assert!(filter_event(mouse, ChangeKind::Deleted).is_some());
        assert!(filter_event(mouse, ChangeKind::Modified).is_none());
        assert!(filter_event(Path::new("/dev/input/event7"), ChangeKind::Created).is_none());
        assert!(filter_event(Path::new("/dev/input/mice"), ChangeKind::Created).is_none());
    }

    #[test]
    fn test_plugged() {
        let event = filter_event(Path::new("/dev/input/mouse0"), ChangeKind::Deleted).unwrap();
        assert!(!event.plugged());
    }
}
