//! Per-device switching through xinput's `Device Enabled` property

use super::SwitchDriver;
use crate::classify::Classifier;
use crate::command::CommandRunner;
use crate::device::{DeviceSource, DeviceType, Enumerator, Inventory};
use crate::settings::SwitchMethod;
use std::rc::Rc;
use tracing::{debug, info, warn};

const PROPERTY: &str = "Device Enabled";

/// Read `Device Enabled (N):\t1` out of `xinput --list-props` output
pub fn parse_device_enabled(props: &str) -> Option<bool> {
    props
        .lines()
        .find(|line| line.to_lowercase().contains("device enabled"))
        .and_then(|line| line.rsplit_once(':'))
        .map(|(_, value)| value.trim() == "1")
}

pub struct PropertyToggleDriver {
    runner: Rc<dyn CommandRunner>,
    classifier: Classifier,
    usable: Option<bool>,
}

impl PropertyToggleDriver {
    pub fn new(runner: Rc<dyn CommandRunner>, classifier: Classifier) -> Self {
        Self {
            runner,
            classifier,
            usable: None,
        }
    }

    pub fn set_classifier(&mut self, classifier: Classifier) {
        self.classifier = classifier;
    }

    /// xinput ids of all devices of the type; `None` if xinput can't list
    pub fn ids(&self, device_type: DeviceType) -> Option<Vec<String>> {
        match Enumerator::new(self.runner.as_ref()).enumerate_xinput() {
            Ok(raw) => Some(
                Inventory::classify(DeviceSource::Xinput, raw, &self.classifier)
                    .ids_of(device_type),
            ),
            Err(e) => {
                debug!("xinput listing failed: {}", e);
                None
            }
        }
    }

    fn device_enabled(&self, id: &str) -> bool {
        match self.runner.run("xinput", &["--list-props", id]) {
            Ok(props) => parse_device_enabled(&props).unwrap_or(false),
            Err(e) => {
                debug!("xinput --list-props {} failed: {}", id, e);
                false
            }
        }
    }

    fn set_device_enabled(&self, id: &str, enabled: bool) {
        let value = if enabled { "1" } else { "0" };
        debug!("xinput set-prop {} \"{}\" {}", id, PROPERTY, value);
        if let Err(e) = self
            .runner
            .execute("xinput", &["set-prop", id, PROPERTY, value])
        {
            warn!("Failed to switch device {}: {}", id, e);
        }
    }
}

impl SwitchDriver for PropertyToggleDriver {
    fn method(&self) -> SwitchMethod {
        SwitchMethod::PropertyToggle
    }

    fn handles(&self, device_type: DeviceType) -> bool {
        device_type.is_managed()
    }

    fn probe(&mut self) -> bool {
        let usable = match self.runner.run("xinput", &["--list"]) {
            Ok(_) => true,
            Err(e) if e.is_unavailable() => {
                info!("xinput not usable: {}", e);
                false
            }
            Err(e) => {
                warn!("xinput is installed but not answering: {}", e);
                false
            }
        };
        self.usable = Some(usable);
        usable
    }

    fn usable(&self) -> Option<bool> {
        self.usable
    }

    fn present(&self, device_type: DeviceType) -> bool {
        self.ids(device_type).is_some_and(|ids| !ids.is_empty())
    }

    /// All devices of the type must agree; no devices reads as not enabled
    fn is_enabled(&self, device_type: DeviceType) -> bool {
        let Some(ids) = self.ids(device_type) else {
            return false;
        };
        !ids.is_empty() && ids.iter().all(|id| self.device_enabled(id))
    }

    fn switch(&mut self, device_type: DeviceType, enabled: bool) -> bool {
        let Some(ids) = self.ids(device_type) else {
            warn!("Cannot switch {}: xinput unavailable", device_type);
            return false;
        };
        for id in &ids {
            self.set_device_enabled(id, enabled);
        }
        let now = !ids.is_empty() && ids.iter().all(|id| self.device_enabled(id));
        debug!("{} device(s) of type {} now enabled: {}", ids.len(), device_type, now);
        now
    }
}
