//! Touchpad switching through synclient
//!
//! synclient only knows one global `TouchpadOff` flag. Other tools (and
//! hotkeys wired to synclient) can flip it behind our back, so this backend
//! also carries a status snapshot that the 1 s poller compares against.

use super::SwitchDriver;
use crate::command::CommandRunner;
use crate::device::DeviceType;
use crate::error::CommandError;
use crate::settings::SwitchMethod;
use std::rc::Rc;
use std::time::Duration;
use tracing::{debug, info, warn};

/// How often the status line is re-read
pub const POLL_INTERVAL: Duration = Duration::from_secs(1);

const OPTION: &str = "TouchpadOff";
const NO_PROPERTIES: &str = "Couldn't find synaptics properties";

/// Extract the `TouchpadOff` value from `synclient -l` output
pub fn parse_touchpad_off(output: &str) -> Option<String> {
    output
        .lines()
        .find(|line| line.contains(OPTION))
        .and_then(|line| line.split_once('='))
        .map(|(_, value)| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

/// `TouchpadOff=0` is the only fully-on state (1 and 2 both turn input off)
fn touchpad_enabled(value: &str) -> bool {
    value == "0"
}

pub struct ControlUtilityDriver {
    runner: Rc<dyn CommandRunner>,
    usable: Option<bool>,
    /// Last observed `TouchpadOff` value
    snapshot: Option<String>,
}

impl ControlUtilityDriver {
    pub fn new(runner: Rc<dyn CommandRunner>) -> Self {
        Self {
            runner,
            usable: None,
            snapshot: None,
        }
    }

    fn status(&self) -> Result<String, CommandError> {
        let output = self.runner.run("synclient", &["-l"])?;
        parse_touchpad_off(&output).ok_or_else(|| CommandError::UnexpectedOutput {
            program: "synclient".to_string(),
            output: output.lines().next().unwrap_or_default().to_string(),
        })
    }

    /// Take a fresh status reading as the comparison baseline
    pub fn rebaseline(&mut self) {
        match self.status() {
            Ok(value) => self.snapshot = Some(value),
            Err(e) => {
                debug!("synclient status unavailable: {}", e);
                self.snapshot = None;
            }
        }
    }

    /// One watcher tick. Returns the new enabled state when the status
    /// differs from the previous reading; the very first reading only
    /// establishes the baseline.
    pub fn poll(&mut self) -> Option<bool> {
        let value = match self.status() {
            Ok(value) => value,
            Err(e) => {
                debug!("synclient poll failed: {}", e);
                return None;
            }
        };

        match self.snapshot.replace(value.clone()) {
            None => None,
            Some(previous) if previous == value => None,
            Some(previous) => {
                let enabled = touchpad_enabled(&value);
                info!(
                    "Touchpad switched outside of pointer-switch ({}={} -> {}): now {}",
                    OPTION,
                    previous,
                    value,
                    if enabled { "enabled" } else { "disabled" }
                );
                Some(enabled)
            }
        }
    }
}

impl SwitchDriver for ControlUtilityDriver {
    fn method(&self) -> SwitchMethod {
        SwitchMethod::ControlUtility
    }

    fn handles(&self, device_type: DeviceType) -> bool {
        device_type == DeviceType::Touchpad
    }

    fn probe(&mut self) -> bool {
        let usable = match self.runner.run("synclient", &["-l"]) {
            Ok(output) if output.contains(NO_PROPERTIES) => {
                info!("synclient installed but synaptics driver not in use");
                false
            }
            Ok(output) => output.contains(OPTION),
            Err(e) => {
                info!("synclient not usable: {}", e);
                false
            }
        };
        self.usable = Some(usable);
        usable
    }

    fn usable(&self) -> Option<bool> {
        self.usable
    }

    fn is_enabled(&self, device_type: DeviceType) -> bool {
        if !self.handles(device_type) {
            return false;
        }
        match self.status() {
            Ok(value) => touchpad_enabled(&value),
            Err(e) => {
                debug!("synclient status unavailable: {}", e);
                false
            }
        }
    }

    fn switch(&mut self, device_type: DeviceType, enabled: bool) -> bool {
        if !self.handles(device_type) {
            warn!("synclient cannot switch {}", device_type);
            return false;
        }

        let arg = format!("{}={}", OPTION, if enabled { 0 } else { 1 });
        match self.runner.spawn("synclient", &[arg.as_str()]) {
            Ok(()) => {
                // Our own change must not come back as an external one
                self.rebaseline();
                enabled
            }
            Err(e) => {
                warn!("Failed to run synclient: {}", e);
                self.is_enabled(device_type)
            }
        }
    }
}
