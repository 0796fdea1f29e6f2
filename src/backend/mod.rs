//! Switch backends
//!
//! Three interchangeable ways of turning devices on and off:
//! - `PlatformSetting`: the desktop's own touchpad setting (gsettings)
//! - `ControlUtility`: synclient `TouchpadOff`, with a status poller
//! - `PropertyToggle`: xinput `Device Enabled`, per device id
//!
//! All of them answer with the observed post-condition rather than "command
//! sent", and none of them fail loudly: a missing tool reads as "not enabled"
//! and leaves state alone.

pub mod gsettings;
pub mod synclient;
pub mod xinput;

use crate::classify::Classifier;
use crate::command::CommandRunner;
use crate::device::DeviceType;
use crate::settings::SwitchMethod;
use std::rc::Rc;

pub use gsettings::PlatformSettingDriver;
pub use synclient::ControlUtilityDriver;
pub use xinput::PropertyToggleDriver;

/// Common contract of the switch backends
pub trait SwitchDriver {
    fn method(&self) -> SwitchMethod;

    /// Whether this backend can switch devices of the given type at all
    fn handles(&self, device_type: DeviceType) -> bool;

    /// Check that the backend is usable on this system and cache the answer
    fn probe(&mut self) -> bool;

    /// Last probe result, `None` if never probed
    fn usable(&self) -> Option<bool>;

    /// Whether anything of this type exists to be switched
    fn present(&self, _device_type: DeviceType) -> bool {
        true
    }

    /// Live query; never answers from the last commanded state
    fn is_enabled(&self, device_type: DeviceType) -> bool;

    /// Switch every device of the type and report whether they are now enabled
    fn switch(&mut self, device_type: DeviceType, enabled: bool) -> bool;

    fn enable_all(&mut self, device_type: DeviceType) -> bool {
        self.switch(device_type, true)
    }

    fn disable_all(&mut self, device_type: DeviceType) -> bool {
        self.switch(device_type, false)
    }
}

/// The active backend, chosen at construction
pub enum Backend {
    PlatformSetting(PlatformSettingDriver),
    ControlUtility(ControlUtilityDriver),
    PropertyToggle(PropertyToggleDriver),
}

impl Backend {
    pub fn new(
        method: SwitchMethod,
        runner: Rc<dyn CommandRunner>,
        classifier: Classifier,
    ) -> Self {
        match method {
            SwitchMethod::PlatformSetting => {
                Backend::PlatformSetting(PlatformSettingDriver::new(runner))
            }
            SwitchMethod::ControlUtility => {
                Backend::ControlUtility(ControlUtilityDriver::new(runner))
            }
            SwitchMethod::PropertyToggle => {
                Backend::PropertyToggle(PropertyToggleDriver::new(runner, classifier))
            }
        }
    }

    /// Pass a rebuilt keyword table down to backends that enumerate devices
    pub fn set_classifier(&mut self, classifier: &Classifier) {
        if let Backend::PropertyToggle(driver) = self {
            driver.set_classifier(classifier.clone());
        }
    }

    pub fn as_control_utility_mut(&mut self) -> Option<&mut ControlUtilityDriver> {
        match self {
            Backend::ControlUtility(driver) => Some(driver),
            _ => None,
        }
    }

    fn driver(&self) -> &dyn SwitchDriver {
        match self {
            Backend::PlatformSetting(d) => d,
            Backend::ControlUtility(d) => d,
            Backend::PropertyToggle(d) => d,
        }
    }

    fn driver_mut(&mut self) -> &mut dyn SwitchDriver {
        match self {
            Backend::PlatformSetting(d) => d,
            Backend::ControlUtility(d) => d,
            Backend::PropertyToggle(d) => d,
        }
    }
}

impl SwitchDriver for Backend {
    fn method(&self) -> SwitchMethod {
        self.driver().method()
    }

    fn handles(&self, device_type: DeviceType) -> bool {
        self.driver().handles(device_type)
    }

    fn probe(&mut self) -> bool {
        self.driver_mut().probe()
    }

    fn usable(&self) -> Option<bool> {
        self.driver().usable()
    }

    fn present(&self, device_type: DeviceType) -> bool {
        self.driver().present(device_type)
    }

    fn is_enabled(&self, device_type: DeviceType) -> bool {
        self.driver().is_enabled(device_type)
    }

    fn switch(&mut self, device_type: DeviceType, enabled: bool) -> bool {
        self.driver_mut().switch(device_type, enabled)
    }
}
