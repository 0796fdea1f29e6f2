//! Synchronization engine
//!
//! Keeps three views of each device type in agreement: the persisted
//! setting, the platform touchpad setting and what the hardware actually
//! does. Everything happens on the control thread. Producers only post
//! [`Event`]s; [`Engine::handle`] processes one at a time and drains every
//! setting change it causes before returning.
//!
//! Loops are prevented by comparing before writing everywhere: the settings
//! store only queues a change when a value really changes, the platform
//! setting is only written when it differs, and drivers are only called when
//! the live state differs from the requested one.

use crate::autoswitch::{self, AutoSwitchTrigger, Decision};
use crate::backend::{Backend, PropertyToggleDriver, SwitchDriver};
use crate::classify::Classifier;
use crate::command::CommandRunner;
use crate::device::{DeviceType, Inventory};
use crate::hotplug::HotplugEvent;
use crate::notification::{ConfirmationPrompt, Notifier};
use crate::platform::PlatformSetting;
use crate::settings::{SettingChange, SettingsStore, SwitchMethod};
use std::rc::Rc;
use tracing::{debug, info, warn};

/// Everything the control thread reacts to
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    /// The settings file was written (possibly by someone else)
    SettingsFileChanged,
    /// Platform touchpad setting observed as enabled/disabled
    PlatformChanged(bool),
    /// Time to poll the control utility
    ControlUtilityTick,
    Hotplug(HotplugEvent),
    /// Answer to a confirmation prompt
    Confirmation { device_type: DeviceType, accepted: bool },
    Shutdown,
}

pub struct Engine {
    runner: Rc<dyn CommandRunner>,
    settings: SettingsStore,
    classifier: Classifier,
    /// Backend for the touchpad, as chosen by the switch method
    active: Backend,
    /// Every other type goes through xinput
    xinput: PropertyToggleDriver,
    platform: Option<PlatformSetting>,
    notifier: Box<dyn Notifier>,
    prompt: Box<dyn ConfirmationPrompt>,
    pending: Option<DeviceType>,
}

impl Engine {
    pub fn new(
        runner: Rc<dyn CommandRunner>,
        settings: SettingsStore,
        notifier: Box<dyn Notifier>,
        prompt: Box<dyn ConfirmationPrompt>,
    ) -> Self {
        let classifier = Classifier::from_settings(settings.get());
        let active = Backend::new(settings.switch_method(), runner.clone(), classifier.clone());
        let xinput = PropertyToggleDriver::new(runner.clone(), classifier.clone());
        Self {
            runner,
            settings,
            classifier,
            active,
            xinput,
            platform: None,
            notifier,
            prompt,
            pending: None,
        }
    }

    /// Probe the tools, pick the backend and bring the hardware in line with
    /// the persisted settings
    pub fn start(&mut self) {
        info!("Starting synchronization engine");

        self.xinput.probe();

        let platform = PlatformSetting::new(self.runner.clone());
        self.platform = if platform.available() {
            Some(platform)
        } else {
            info!("Platform touchpad setting not available, not mirroring");
            None
        };

        self.select_backend(self.settings.switch_method());
        self.reapply_all();
        self.mirror_platform();

        if self.any_autoswitch() {
            self.run_autoswitch(AutoSwitchTrigger::Startup);
        }
        self.drain();
    }

    /// Process one event. Returns `false` once the engine should stop.
    pub fn handle(&mut self, event: Event) -> bool {
        debug!("Event: {:?}", event);
        match event {
            Event::SettingsFileChanged => match self.settings.reload() {
                Ok(0) => {}
                Ok(n) => info!("Settings file changed ({} value(s))", n),
                Err(e) => warn!("Ignoring settings file change: {:#}", e),
            },
            Event::PlatformChanged(enabled) => self.on_platform(enabled),
            Event::ControlUtilityTick => self.on_tick(),
            Event::Hotplug(event) => self.on_hotplug(&event),
            Event::Confirmation {
                device_type,
                accepted,
            } => self.on_confirmation(device_type, accepted),
            Event::Shutdown => {
                info!("Shutting down synchronization engine");
                return false;
            }
        }
        self.drain();
        true
    }

    /// User request to switch a device type on or off
    pub fn request(&mut self, device_type: DeviceType, enabled: bool) -> bool {
        let changed = self.settings.set_enabled(device_type, enabled);
        self.drain();
        changed
    }

    /// Disable without asking, as if the user had already confirmed
    pub fn force_disable(&mut self, device_type: DeviceType) -> bool {
        self.pending = Some(device_type);
        self.on_confirmation(device_type, true);
        self.drain();
        !self.settings.enabled(device_type)
    }

    pub fn set_switch_method(&mut self, method: SwitchMethod) -> bool {
        self.update(|store| store.set_switch_method(method))
    }

    /// Apply an arbitrary settings edit and process what it changed
    pub fn update<F>(&mut self, edit: F) -> bool
    where
        F: FnOnce(&mut SettingsStore) -> bool,
    {
        let changed = edit(&mut self.settings);
        self.drain();
        changed
    }

    pub fn settings(&self) -> &SettingsStore {
        &self.settings
    }

    /// The backend actually in use (may differ from the setting after a fallback)
    pub fn active_method(&self) -> SwitchMethod {
        self.active.method()
    }

    pub fn pending_confirmation(&self) -> Option<DeviceType> {
        self.pending
    }

    /// Whether the control-utility poller should be running
    pub fn watcher_wanted(&self) -> bool {
        self.active.method() == SwitchMethod::ControlUtility && self.active.usable() == Some(true)
    }

    pub fn has_platform(&self) -> bool {
        self.platform.is_some()
    }

    fn driver(&self, device_type: DeviceType) -> &dyn SwitchDriver {
        if self.active.handles(device_type) {
            &self.active
        } else {
            &self.xinput
        }
    }

    fn driver_mut(&mut self, device_type: DeviceType) -> &mut dyn SwitchDriver {
        if self.active.handles(device_type) {
            &mut self.active
        } else {
            &mut self.xinput
        }
    }

    fn drain(&mut self) {
        while let Some(change) = self.settings.next_change() {
            self.on_setting_change(change);
        }
    }

    fn on_setting_change(&mut self, change: SettingChange) {
        match change {
            SettingChange::Enabled(device_type, enabled) => self.apply(device_type, enabled, true),
            SettingChange::SwitchMethod { old, new } => self.on_method_change(old, new),
            SettingChange::AutoSwitch(device_type, true) => {
                info!("Auto-switch enabled for {}", device_type);
                self.run_autoswitch(AutoSwitchTrigger::SettingChanged);
            }
            SettingChange::AutoSwitch(device_type, false) => {
                info!("Auto-switch disabled for {}", device_type);
            }
            SettingChange::Classification => {
                self.classifier = Classifier::from_settings(self.settings.get());
                self.active.set_classifier(&self.classifier);
                self.xinput.set_classifier(self.classifier.clone());
                debug!("Device keyword table rebuilt");
                // Exclusions change whether a mouse counts as present
                if self.any_autoswitch() {
                    self.run_autoswitch(AutoSwitchTrigger::SettingChanged);
                }
            }
            SettingChange::ShowNotifications(show) => {
                debug!("Notifications {}", if show { "on" } else { "off" });
            }
            SettingChange::Debug(enabled) => {
                info!("Debug logging set to {}; takes effect on restart", enabled);
            }
            SettingChange::DebugToFile(enabled) => {
                info!("Logging to file set to {}; takes effect on restart", enabled);
            }
        }
    }

    /// Make the devices of a type match `enabled`. With `gated`, disabling
    /// the last usable pointing device asks for confirmation first.
    fn apply(&mut self, device_type: DeviceType, enabled: bool, gated: bool) {
        let driver = self.driver(device_type);
        if driver.usable() == Some(false) {
            debug!("{} backend unusable, leaving {} alone", driver.method(), device_type);
            return;
        }
        if !driver.present(device_type) {
            debug!("No {} attached, nothing to switch", device_type);
            return;
        }
        if driver.is_enabled(device_type) == enabled {
            self.mirror_platform_for(device_type);
            return;
        }

        if gated && !enabled && self.would_strand(device_type) {
            self.hold(device_type);
            return;
        }

        info!(
            "{} {} via {}",
            if enabled { "Enabling" } else { "Disabling" },
            device_type,
            self.driver(device_type).method()
        );
        let observed = self.driver_mut(device_type).switch(device_type, enabled);
        if observed != enabled {
            warn!(
                "{} still {} after switching; keeping observed state",
                device_type,
                if observed { "enabled" } else { "disabled" }
            );
            self.settings.set_enabled(device_type, observed);
        }
        self.mirror_platform_for(device_type);
    }

    fn reapply_all(&mut self) {
        for device_type in DeviceType::MANAGED {
            // Existing intent, not a new request: no confirmation
            self.apply(device_type, self.settings.enabled(device_type), false);
        }
    }

    /// Disabling `device_type` would leave no other enabled pointing device.
    /// An unknown inventory counts as stranding.
    fn would_strand(&self, device_type: DeviceType) -> bool {
        let Some(inventory) = Inventory::scan(self.runner.as_ref(), &self.classifier) else {
            debug!("Device list unknown, asking before disabling {}", device_type);
            return true;
        };
        if inventory.mouse_present() || !inventory.has(device_type) {
            return false;
        }
        !DeviceType::MANAGED.into_iter().any(|other| {
            other != device_type && self.settings.enabled(other) && inventory.has(other)
        })
    }

    fn hold(&mut self, device_type: DeviceType) {
        info!("{} is the last enabled pointing device, asking first", device_type);
        // Revert the setting while we wait; the devices were never touched
        self.settings.set_enabled(device_type, true);
        if self.pending != Some(device_type) {
            self.pending = Some(device_type);
            self.prompt.request(device_type);
        }
    }

    fn on_confirmation(&mut self, device_type: DeviceType, accepted: bool) {
        if self.pending != Some(device_type) {
            debug!("Stale confirmation for {}", device_type);
            return;
        }
        self.pending = None;

        if !accepted {
            info!("Keeping {} enabled", device_type);
            return;
        }

        let driver = self.driver(device_type);
        if driver.usable() == Some(false) || !driver.present(device_type) {
            debug!("Nothing to disable for {}", device_type);
            return;
        }
        let observed = self.driver_mut(device_type).switch(device_type, false);
        if observed {
            warn!("{} still enabled after confirmed disable", device_type);
        }
        self.settings.set_enabled(device_type, observed);
        self.mirror_platform_for(device_type);
    }

    /// `reported` may be the echo of an older write of ours. Only the value
    /// the key holds now is acted on.
    fn on_platform(&mut self, reported: bool) {
        let enabled = match self.platform.as_ref().and_then(|p| p.is_enabled()) {
            Some(live) if live != reported => {
                debug!("Dropping stale platform change ({} != {})", reported, live);
                return;
            }
            Some(live) => live,
            None => reported,
        };
        if self.settings.enabled(DeviceType::Touchpad) == enabled {
            return;
        }
        info!(
            "Platform touchpad setting changed to {}",
            if enabled { "enabled" } else { "disabled" }
        );
        self.settings.set_enabled(DeviceType::Touchpad, enabled);
    }

    fn on_tick(&mut self) {
        let Some(driver) = self.active.as_control_utility_mut() else {
            return;
        };
        if let Some(enabled) = driver.poll() {
            if self.settings.enabled(DeviceType::Touchpad) != enabled {
                self.settings.set_enabled(DeviceType::Touchpad, enabled);
            }
        }
    }

    fn on_hotplug(&mut self, event: &HotplugEvent) {
        info!(
            "Mouse {}: {:?}",
            if event.plugged() { "plugged in" } else { "unplugged" },
            event.path
        );
        if event.plugged() {
            // A new device starts in whatever state the driver gave it
            self.reapply_all();
        }
        if !self.any_autoswitch() {
            return;
        }
        let trigger = if event.plugged() {
            AutoSwitchTrigger::MousePlugged
        } else {
            AutoSwitchTrigger::MouseUnplugged
        };
        self.run_autoswitch(trigger);
    }

    fn on_method_change(&mut self, old: SwitchMethod, new: SwitchMethod) {
        info!("Switch method changed from {} to {}", old, new);

        // Hand the touchpad over enabled so the old mechanism can't keep it off
        if self.active.usable() != Some(false) && self.active.present(DeviceType::Touchpad) {
            self.active.enable_all(DeviceType::Touchpad);
        }

        self.select_backend(new);
        self.reapply_all();
        self.mirror_platform();
    }

    /// Build and probe the backend for `method`, falling back when the tool
    /// behind it is missing. The setting itself is left untouched.
    fn select_backend(&mut self, method: SwitchMethod) {
        let mut backend = Backend::new(method, self.runner.clone(), self.classifier.clone());
        if !backend.probe() {
            for fallback in [SwitchMethod::PlatformSetting, SwitchMethod::PropertyToggle] {
                if fallback == method {
                    continue;
                }
                let mut candidate =
                    Backend::new(fallback, self.runner.clone(), self.classifier.clone());
                if candidate.probe() {
                    warn!("{} unavailable, falling back to {}", method, fallback);
                    backend = candidate;
                    break;
                }
            }
        }
        if backend.usable() == Some(false) {
            warn!("No usable backend for the touchpad");
        }
        if let Some(driver) = backend.as_control_utility_mut() {
            driver.rebaseline();
        }
        info!("Active switch method: {}", backend.method());
        self.active = backend;
    }

    fn mirror_platform_for(&self, device_type: DeviceType) {
        if device_type == DeviceType::Touchpad {
            self.mirror_platform();
        }
    }

    /// Write the touchpad setting to the platform if it differs
    fn mirror_platform(&self) {
        let Some(platform) = &self.platform else {
            return;
        };
        let want = self.settings.enabled(DeviceType::Touchpad);
        match platform.is_enabled() {
            Some(current) if current == want => {}
            Some(_) => {
                debug!("Mirroring touchpad {} to platform setting", want);
                if let Err(e) = platform.write(want) {
                    warn!("Failed to update platform touchpad setting: {}", e);
                }
            }
            None => debug!("Platform touchpad setting unreadable"),
        }
    }

    fn any_autoswitch(&self) -> bool {
        DeviceType::MANAGED
            .into_iter()
            .any(|t| self.settings.autoswitch(t))
    }

    fn run_autoswitch(&mut self, trigger: AutoSwitchTrigger) {
        let Some(inventory) = Inventory::scan(self.runner.as_ref(), &self.classifier) else {
            warn!("Auto-switch ({}) skipped: device list unavailable", trigger);
            return;
        };
        let mouse_present = inventory.mouse_present();
        debug!(
            "Auto-switch ({}): {} mouse(s) present",
            trigger,
            inventory.mouse_count()
        );

        let decisions = autoswitch::decide(mouse_present, self.settings.get());
        let mut applied: Vec<Decision> = decisions
            .into_iter()
            .filter(|d| self.settings.set_enabled(d.device_type, d.enabled))
            .collect();
        self.drain();

        // Report only what actually stuck
        applied.retain(|d| self.settings.enabled(d.device_type) == d.enabled);
        if applied.is_empty() {
            return;
        }
        info!("Auto-switch ({}): {:?}", trigger, applied);
        if self.settings.get().show_notifications {
            if let Some((summary, body)) = autoswitch::summarize(mouse_present, &applied) {
                self.notifier.notify(&summary, &body);
            }
        }
    }
}
