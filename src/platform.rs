//! Desktop input setting for the touchpad
//!
//! GNOME keeps its own view of whether the touchpad is on in
//! `org.gnome.desktop.peripherals.touchpad send-events`. It is read and written
//! through `gsettings`, and `gsettings monitor` streams its changes.

use crate::command::CommandRunner;
use crate::engine::Event;
use crate::error::CommandError;
use anyhow::{Context, Result};
use std::process::Stdio;
use std::rc::Rc;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::mpsc::UnboundedSender;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

pub const SCHEMA: &str = "org.gnome.desktop.peripherals.touchpad";
pub const KEY: &str = "send-events";

/// Values of the `send-events` key
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SendEvents {
    Enabled,
    Disabled,
    DisabledOnExternalMouse,
}

impl SendEvents {
    /// Accepts both `enabled` and the quoted `'enabled'` form gsettings prints
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().trim_matches('\'').trim_matches('"') {
            "enabled" => Some(SendEvents::Enabled),
            "disabled" => Some(SendEvents::Disabled),
            "disabled-on-external-mouse" => Some(SendEvents::DisabledOnExternalMouse),
            _ => None,
        }
    }

    /// Only an explicit `disabled` counts as off
    pub fn is_enabled(self) -> bool {
        !matches!(self, SendEvents::Disabled)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            SendEvents::Enabled => "enabled",
            SendEvents::Disabled => "disabled",
            SendEvents::DisabledOnExternalMouse => "disabled-on-external-mouse",
        }
    }
}

/// Parse one `gsettings monitor` line (`send-events: 'disabled'`)
pub fn parse_monitor_line(line: &str) -> Option<bool> {
    let (key, value) = line.split_once(':')?;
    if key.trim() != KEY {
        return None;
    }
    SendEvents::parse(value).map(SendEvents::is_enabled)
}

/// Handle on the platform touchpad setting
#[derive(Clone)]
pub struct PlatformSetting {
    runner: Rc<dyn CommandRunner>,
}

impl PlatformSetting {
    pub fn new(runner: Rc<dyn CommandRunner>) -> Self {
        Self { runner }
    }

    pub fn read(&self) -> Result<SendEvents, CommandError> {
        let output = self.runner.run("gsettings", &["get", SCHEMA, KEY])?;
        SendEvents::parse(&output).ok_or_else(|| CommandError::UnexpectedOutput {
            program: "gsettings".to_string(),
            output: output.trim().to_string(),
        })
    }

    /// `None` when the setting can't be read (not a GNOME session)
    pub fn is_enabled(&self) -> Option<bool> {
        match self.read() {
            Ok(value) => Some(value.is_enabled()),
            Err(e) => {
                debug!("Platform touchpad setting unavailable: {}", e);
                None
            }
        }
    }

    pub fn write(&self, enabled: bool) -> Result<(), CommandError> {
        let value = if enabled {
            SendEvents::Enabled
        } else {
            SendEvents::Disabled
        };
        debug!("gsettings set {} {} {}", SCHEMA, KEY, value.as_str());
        self.runner
            .execute("gsettings", &["set", SCHEMA, KEY, value.as_str()])
    }

    pub fn available(&self) -> bool {
        self.read().is_ok()
    }
}

/// Streams platform setting changes into the event channel
pub struct PlatformMonitor {
    task: Option<JoinHandle<()>>,
}

impl PlatformMonitor {
    /// Start `gsettings monitor`. Must be called inside a tokio runtime.
    pub fn spawn(tx: UnboundedSender<Event>) -> Result<Self> {
        let mut child = tokio::process::Command::new("gsettings")
            .args(["monitor", SCHEMA, KEY])
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .kill_on_drop(true)
            .spawn()
            .context("Failed to start gsettings monitor")?;

        let stdout = child
            .stdout
            .take()
            .context("gsettings monitor has no stdout")?;

        info!("Monitoring {} {}", SCHEMA, KEY);

        let task = tokio::spawn(async move {
            // Keep the child alive for as long as the task runs
            let _child = child;
            let mut lines = BufReader::new(stdout).lines();
            loop {
                match lines.next_line().await {
                    Ok(Some(line)) => {
                        let Some(enabled) = parse_monitor_line(&line) else {
                            debug!("Ignoring gsettings monitor line: {:?}", line);
                            continue;
                        };
                        if tx.send(Event::PlatformChanged(enabled)).is_err() {
                            break;
                        }
                    }
                    Ok(None) => {
                        warn!("gsettings monitor exited");
                        break;
                    }
                    Err(e) => {
                        warn!("Failed to read gsettings monitor output: {}", e);
                        break;
                    }
                }
            }
        });

        Ok(Self { task: Some(task) })
    }

    /// Stop monitoring. Safe to call more than once.
    pub fn cancel(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
            debug!("Platform monitor cancelled");
        }
    }
}

impl Drop for PlatformMonitor {
    fn drop(&mut self) {
        self.cancel();
    }
}
