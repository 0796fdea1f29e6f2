//! Long-running mode: one control thread, one event channel.
//!
//! Every producer (hotplug and settings watches, the platform monitor, the
//! control-utility poller, the confirmation dialog, Ctrl+C) posts an
//! [`Event`]. The loop below hands them to the engine one at a time.

use crate::backend::synclient::POLL_INTERVAL;
use crate::command::{CommandRunner, SystemRunner};
use crate::engine::{Engine, Event};
use crate::hotplug::{HotplugMonitor, SettingsWatch, DEVICE_DIR};
use crate::notification::{DesktopNotifier, DialogPrompt};
use crate::platform::PlatformMonitor;
use crate::schedule::PeriodicTask;
use crate::settings::SettingsStore;
use anyhow::{Context, Result};
use std::path::{Path, PathBuf};
use std::rc::Rc;
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use tracing::{info, warn};

pub struct DaemonOptions {
    pub settings_path: PathBuf,
    pub device_dir: PathBuf,
}

impl DaemonOptions {
    pub fn new(settings_path: PathBuf) -> Self {
        Self {
            settings_path,
            device_dir: PathBuf::from(DEVICE_DIR),
        }
    }
}

/// Build the current-thread runtime and run until shutdown
pub fn run(options: DaemonOptions) -> Result<()> {
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .context("Failed to build tokio runtime")?;
    runtime.block_on(run_loop(options))
}

async fn run_loop(options: DaemonOptions) -> Result<()> {
    let (tx, rx) = mpsc::unbounded_channel();

    let shutdown_tx = tx.clone();
    ctrlc::set_handler(move || {
        let _ = shutdown_tx.send(Event::Shutdown);
    })
    .context("Failed to set Ctrl+C handler")?;

    let runner: Rc<dyn CommandRunner> = Rc::new(SystemRunner);
    let store = SettingsStore::open(options.settings_path.clone());
    let mut engine = Engine::new(
        runner,
        store,
        Box::new(DesktopNotifier::new(tokio::runtime::Handle::current())),
        Box::new(DialogPrompt::new(
            tokio::runtime::Handle::current(),
            tx.clone(),
        )),
    );
    engine.start();

    let mut watches = Watches::start(&options, engine.has_platform(), &tx);
    event_loop(&mut engine, &mut watches, rx, &tx).await;
    watches.cancel();

    info!("pointer-switch stopped");
    Ok(())
}

async fn event_loop(
    engine: &mut Engine,
    watches: &mut Watches,
    mut rx: UnboundedReceiver<Event>,
    tx: &UnboundedSender<Event>,
) {
    loop {
        watches.sync_poller(engine.watcher_wanted(), tx);
        let Some(event) = rx.recv().await else {
            break;
        };
        if !engine.handle(event) {
            break;
        }
    }
}

/// Everything that feeds the event channel
struct Watches {
    hotplug: Option<HotplugMonitor>,
    settings: Option<SettingsWatch>,
    platform: Option<PlatformMonitor>,
    poller: Option<PeriodicTask>,
}

impl Watches {
    fn start(options: &DaemonOptions, platform: bool, tx: &UnboundedSender<Event>) -> Self {
        let hotplug = optional(
            "hotplug monitor",
            HotplugMonitor::start(Path::new(&options.device_dir), tx.clone()),
        );
        let settings = optional(
            "settings file watch",
            SettingsWatch::start(&options.settings_path, tx.clone()),
        );
        let platform = if platform {
            optional("platform monitor", PlatformMonitor::spawn(tx.clone()))
        } else {
            None
        };
        Self {
            hotplug,
            settings,
            platform,
            poller: None,
        }
    }

    /// Start or stop the control-utility poller to match the active backend
    fn sync_poller(&mut self, wanted: bool, tx: &UnboundedSender<Event>) {
        match (wanted, self.poller.is_some()) {
            (true, false) => {
                info!("Polling synclient every {:?}", POLL_INTERVAL);
                let tx = tx.clone();
                self.poller = Some(PeriodicTask::start(POLL_INTERVAL, move || {
                    tx.send(Event::ControlUtilityTick).is_ok()
                }));
            }
            (false, true) => {
                info!("Stopping synclient poller");
                if let Some(mut poller) = self.poller.take() {
                    poller.cancel();
                }
            }
            _ => {}
        }
    }

    fn cancel(&mut self) {
        if let Some(poller) = &mut self.poller {
            poller.cancel();
        }
        if let Some(platform) = &mut self.platform {
            platform.cancel();
        }
        if let Some(settings) = &mut self.settings {
            settings.cancel();
        }
        if let Some(hotplug) = &mut self.hotplug {
            hotplug.cancel();
        }
    }
}

fn optional<T>(what: &str, started: Result<T>) -> Option<T> {
    match started {
        Ok(value) => Some(value),
        Err(e) => {
            warn!("Running without {}: {:#}", what, e);
            None
        }
    }
}
