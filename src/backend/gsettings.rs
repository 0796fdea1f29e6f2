//! Touchpad switching through the desktop input setting

use super::SwitchDriver;
use crate::command::CommandRunner;
use crate::device::DeviceType;
use crate::platform::PlatformSetting;
use crate::settings::SwitchMethod;
use std::rc::Rc;
use tracing::{info, warn};

/// Writes `send-events` and trusts it; there is no per-device iteration
pub struct PlatformSettingDriver {
    setting: PlatformSetting,
    usable: Option<bool>,
}

impl PlatformSettingDriver {
    pub fn new(runner: Rc<dyn CommandRunner>) -> Self {
        Self {
            setting: PlatformSetting::new(runner),
            usable: None,
        }
    }
}

impl SwitchDriver for PlatformSettingDriver {
    fn method(&self) -> SwitchMethod {
        SwitchMethod::PlatformSetting
    }

    fn handles(&self, device_type: DeviceType) -> bool {
        device_type == DeviceType::Touchpad
    }

    fn probe(&mut self) -> bool {
        let usable = self.setting.available();
        info!("Platform touchpad setting usable: {}", usable);
        self.usable = Some(usable);
        usable
    }

    fn usable(&self) -> Option<bool> {
        self.usable
    }

    fn is_enabled(&self, device_type: DeviceType) -> bool {
        self.handles(device_type) && self.setting.is_enabled().unwrap_or(false)
    }

    fn switch(&mut self, device_type: DeviceType, enabled: bool) -> bool {
        if !self.handles(device_type) {
            warn!("Platform setting cannot switch {}", device_type);
            return false;
        }
        match self.setting.write(enabled) {
            Ok(()) => enabled,
            Err(e) => {
                warn!("Failed to switch touchpad via platform setting: {}", e);
                self.is_enabled(device_type)
            }
        }
    }
}
