//! User-facing settings
//!
//! Persisted as TOML in the user's config directory. [`SettingsStore`] is the
//! change-notifying wrapper the engine works through: every setter compares
//! before writing and only a real change queues a [`SettingChange`], which is
//! what keeps setting/platform propagation from looping.

use crate::device::DeviceType;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, VecDeque};
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use tracing::{debug, info, warn};

pub const APP_NAME: &str = "pointer-switch";

/// Backend responsible for switching the touchpad
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SwitchMethod {
    /// Desktop input setting (gsettings `send-events`)
    #[default]
    #[serde(alias = "gconf", alias = "gsettings")]
    PlatformSetting,
    /// synclient `TouchpadOff`
    #[serde(alias = "synclient")]
    ControlUtility,
    /// xinput `Device Enabled` per device
    #[serde(alias = "xinput")]
    PropertyToggle,
}

impl SwitchMethod {
    pub const ALL: [SwitchMethod; 3] = [
        SwitchMethod::PlatformSetting,
        SwitchMethod::ControlUtility,
        SwitchMethod::PropertyToggle,
    ];

    pub fn key(self) -> &'static str {
        match self {
            SwitchMethod::PlatformSetting => "platform-setting",
            SwitchMethod::ControlUtility => "control-utility",
            SwitchMethod::PropertyToggle => "property-toggle",
        }
    }
}

impl fmt::Display for SwitchMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}

impl FromStr for SwitchMethod {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "platform-setting" | "gsettings" | "gconf" => Ok(SwitchMethod::PlatformSetting),
            "control-utility" | "synclient" => Ok(SwitchMethod::ControlUtility),
            "property-toggle" | "xinput" => Ok(SwitchMethod::PropertyToggle),
            other => Err(format!(
                "unknown switch method '{}' \
                 (expected platform-setting, control-utility or property-toggle)",
                other
            )),
        }
    }
}

/// One boolean per switchable device type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceFlags {
    #[serde(default)]
    pub touchpad: bool,
    #[serde(default)]
    pub trackpoint: bool,
    #[serde(default)]
    pub touchscreen: bool,
    #[serde(default)]
    pub fingertouch: bool,
    #[serde(default)]
    pub pen: bool,
}

impl DeviceFlags {
    pub const fn all(value: bool) -> Self {
        Self {
            touchpad: value,
            trackpoint: value,
            touchscreen: value,
            fingertouch: value,
            pen: value,
        }
    }

    /// Always `false` for types that are not switchable
    pub fn get(&self, device_type: DeviceType) -> bool {
        match device_type {
            DeviceType::Touchpad => self.touchpad,
            DeviceType::Trackpoint => self.trackpoint,
            DeviceType::Touchscreen => self.touchscreen,
            DeviceType::Fingertouch => self.fingertouch,
            DeviceType::Pen => self.pen,
            DeviceType::Mouse | DeviceType::Other => false,
        }
    }

    fn slot(&mut self, device_type: DeviceType) -> Option<&mut bool> {
        match device_type {
            DeviceType::Touchpad => Some(&mut self.touchpad),
            DeviceType::Trackpoint => Some(&mut self.trackpoint),
            DeviceType::Touchscreen => Some(&mut self.touchscreen),
            DeviceType::Fingertouch => Some(&mut self.fingertouch),
            DeviceType::Pen => Some(&mut self.pen),
            DeviceType::Mouse | DeviceType::Other => None,
        }
    }
}

fn enabled_by_default() -> DeviceFlags {
    DeviceFlags::all(true)
}

fn disabled_by_default() -> DeviceFlags {
    DeviceFlags::all(false)
}

/// Extra classification keywords per type, on top of the built-in lists
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceKeywords {
    #[serde(default)]
    pub touchpad: Vec<String>,
    #[serde(default)]
    pub trackpoint: Vec<String>,
    #[serde(default)]
    pub touchscreen: Vec<String>,
    #[serde(default)]
    pub fingertouch: Vec<String>,
    #[serde(default)]
    pub pen: Vec<String>,
}

impl DeviceKeywords {
    pub fn get(&self, device_type: DeviceType) -> &[String] {
        match device_type {
            DeviceType::Touchpad => &self.touchpad,
            DeviceType::Trackpoint => &self.trackpoint,
            DeviceType::Touchscreen => &self.touchscreen,
            DeviceType::Fingertouch => &self.fingertouch,
            DeviceType::Pen => &self.pen,
            DeviceType::Mouse | DeviceType::Other => &[],
        }
    }
}

/// Persisted settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Settings {
    #[serde(default)]
    pub switch_method: SwitchMethod,

    /// Notify when auto-switch changes something
    #[serde(default = "default_true")]
    pub show_notifications: bool,

    /// Verbose logging
    #[serde(default)]
    pub debug: bool,

    /// Also append log output to `debug.log` in the data directory
    #[serde(default)]
    pub debug_to_file: bool,

    /// Device name to treat as a touchpad ("" or "-" when unset)
    #[serde(default)]
    pub possible_touchpad: String,

    /// Device names ignored when looking for a mouse
    #[serde(default)]
    pub excluded_mouses: BTreeSet<String>,

    #[serde(default = "enabled_by_default")]
    pub enabled: DeviceFlags,

    #[serde(default = "disabled_by_default")]
    pub autoswitch: DeviceFlags,

    #[serde(default)]
    pub keywords: DeviceKeywords,
}

fn default_true() -> bool {
    true
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            switch_method: SwitchMethod::default(),
            show_notifications: true,
            debug: false,
            debug_to_file: false,
            possible_touchpad: String::new(),
            excluded_mouses: BTreeSet::new(),
            enabled: DeviceFlags::all(true),
            autoswitch: DeviceFlags::all(false),
            keywords: DeviceKeywords::default(),
        }
    }
}

impl Settings {
    /// Get the settings file path
    pub fn default_path() -> Result<PathBuf> {
        let config_dir = dirs::config_dir()
            .context("Could not find config directory")?
            .join(APP_NAME);
        Ok(config_dir.join("settings.toml"))
    }

    /// Load settings from file; a missing file yields defaults
    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            info!("No settings file at {:?}, using defaults", path);
            return Ok(Self::default());
        }

        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read settings file {:?}", path))?;
        let settings: Settings = toml::from_str(&content)
            .with_context(|| format!("Failed to parse settings file {:?}", path))?;
        debug!("Loaded settings from {:?}", path);
        Ok(settings)
    }

    /// Save settings to file
    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create config directory {:?}", parent))?;
        }
        let content = toml::to_string_pretty(self).context("Failed to serialize settings")?;
        // Write-then-rename so the file watcher never sees a half-written file
        let tmp = path.with_extension("toml.tmp");
        fs::write(&tmp, content).with_context(|| format!("Failed to write {:?}", tmp))?;
        fs::rename(&tmp, path).with_context(|| format!("Failed to replace {:?}", path))?;
        debug!("Saved settings to {:?}", path);
        Ok(())
    }

    pub fn possible_touchpad(&self) -> Option<&str> {
        match self.possible_touchpad.trim() {
            "" | "-" => None,
            name => Some(name),
        }
    }
}

/// Notification emitted when a stored value actually changes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SettingChange {
    Enabled(DeviceType, bool),
    SwitchMethod { old: SwitchMethod, new: SwitchMethod },
    AutoSwitch(DeviceType, bool),
    /// Keyword table inputs changed (exclusions, possible touchpad, keywords)
    Classification,
    ShowNotifications(bool),
    Debug(bool),
    DebugToFile(bool),
}

/// Compute the notifications for going from `old` to `new`
pub fn diff(old: &Settings, new: &Settings) -> Vec<SettingChange> {
    let mut changes = Vec::new();

    if old.switch_method != new.switch_method {
        changes.push(SettingChange::SwitchMethod {
            old: old.switch_method,
            new: new.switch_method,
        });
    }
    for device_type in DeviceType::MANAGED {
        let enabled = new.enabled.get(device_type);
        if old.enabled.get(device_type) != enabled {
            changes.push(SettingChange::Enabled(device_type, enabled));
        }
        let auto = new.autoswitch.get(device_type);
        if old.autoswitch.get(device_type) != auto {
            changes.push(SettingChange::AutoSwitch(device_type, auto));
        }
    }
    if old.excluded_mouses != new.excluded_mouses
        || old.possible_touchpad != new.possible_touchpad
        || old.keywords != new.keywords
    {
        changes.push(SettingChange::Classification);
    }
    if old.show_notifications != new.show_notifications {
        changes.push(SettingChange::ShowNotifications(new.show_notifications));
    }
    if old.debug != new.debug {
        changes.push(SettingChange::Debug(new.debug));
    }
    if old.debug_to_file != new.debug_to_file {
        changes.push(SettingChange::DebugToFile(new.debug_to_file));
    }

    changes
}

/// Settings plus change notification and write-through persistence
#[derive(Debug)]
pub struct SettingsStore {
    settings: Settings,
    path: Option<PathBuf>,
    changes: VecDeque<SettingChange>,
    notifications: usize,
}

impl SettingsStore {
    /// Open the store backed by `path`. An unreadable file falls back to defaults.
    pub fn open(path: PathBuf) -> Self {
        let settings = match Settings::load_from(&path) {
            Ok(settings) => settings,
            Err(e) => {
                warn!("{:#}; using default settings", e);
                Settings::default()
            }
        };
        Self {
            settings,
            path: Some(path),
            changes: VecDeque::new(),
            notifications: 0,
        }
    }

    /// Store that never touches the filesystem
    pub fn in_memory(settings: Settings) -> Self {
        Self {
            settings,
            path: None,
            changes: VecDeque::new(),
            notifications: 0,
        }
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    pub fn get(&self) -> &Settings {
        &self.settings
    }

    pub fn enabled(&self, device_type: DeviceType) -> bool {
        self.settings.enabled.get(device_type)
    }

    pub fn autoswitch(&self, device_type: DeviceType) -> bool {
        self.settings.autoswitch.get(device_type)
    }

    pub fn switch_method(&self) -> SwitchMethod {
        self.settings.switch_method
    }

    /// Returns `true` if the value changed
    pub fn set_enabled(&mut self, device_type: DeviceType, value: bool) -> bool {
        let changed = match self.settings.enabled.slot(device_type) {
            Some(slot) if *slot != value => {
                *slot = value;
                true
            }
            _ => false,
        };
        if changed {
            self.commit(SettingChange::Enabled(device_type, value));
        }
        changed
    }

    pub fn set_autoswitch(&mut self, device_type: DeviceType, value: bool) -> bool {
        let changed = match self.settings.autoswitch.slot(device_type) {
            Some(slot) if *slot != value => {
                *slot = value;
                true
            }
            _ => false,
        };
        if changed {
            self.commit(SettingChange::AutoSwitch(device_type, value));
        }
        changed
    }

    pub fn set_switch_method(&mut self, method: SwitchMethod) -> bool {
        let old = self.settings.switch_method;
        if old == method {
            return false;
        }
        self.settings.switch_method = method;
        self.commit(SettingChange::SwitchMethod { old, new: method });
        true
    }

    pub fn set_excluded(&mut self, name: &str, excluded: bool) -> bool {
        let name = name.trim();
        let changed = if excluded {
            self.settings.excluded_mouses.insert(name.to_string())
        } else {
            self.settings.excluded_mouses.remove(name)
        };
        if changed {
            self.commit(SettingChange::Classification);
        }
        changed
    }

    pub fn set_possible_touchpad(&mut self, name: &str) -> bool {
        let name = name.trim();
        if self.settings.possible_touchpad == name {
            return false;
        }
        self.settings.possible_touchpad = name.to_string();
        self.commit(SettingChange::Classification);
        true
    }

    pub fn set_show_notifications(&mut self, value: bool) -> bool {
        if self.settings.show_notifications == value {
            return false;
        }
        self.settings.show_notifications = value;
        self.commit(SettingChange::ShowNotifications(value));
        true
    }

    pub fn set_debug(&mut self, value: bool) -> bool {
        if self.settings.debug == value {
            return false;
        }
        self.settings.debug = value;
        self.commit(SettingChange::Debug(value));
        true
    }

    pub fn set_debug_to_file(&mut self, value: bool) -> bool {
        if self.settings.debug_to_file == value {
            return false;
        }
        self.settings.debug_to_file = value;
        self.commit(SettingChange::DebugToFile(value));
        true
    }

    /// Swap in settings that were edited elsewhere. Queues one notification
    /// per differing key; nothing is written back.
    pub fn replace(&mut self, settings: Settings) -> usize {
        let changes = diff(&self.settings, &settings);
        self.settings = settings;
        let count = changes.len();
        self.notifications += count;
        self.changes.extend(changes);
        count
    }

    /// Re-read the backing file after an external edit
    pub fn reload(&mut self) -> Result<usize> {
        let Some(path) = self.path.clone() else {
            return Ok(0);
        };
        // Deleted or truncated mid-edit; wait for the next write
        match fs::metadata(&path) {
            Ok(meta) if meta.len() > 0 => {}
            _ => {
                debug!("Settings file {:?} missing or empty, keeping current values", path);
                return Ok(0);
            }
        }
        let settings = Settings::load_from(&path)?;
        Ok(self.replace(settings))
    }

    /// Pop the oldest pending change notification
    pub fn next_change(&mut self) -> Option<SettingChange> {
        self.changes.pop_front()
    }

    /// Total notifications emitted since the store was created
    pub fn notification_count(&self) -> usize {
        self.notifications
    }

    fn commit(&mut self, change: SettingChange) {
        debug!("Setting changed: {:?}", change);
        self.notifications += 1;
        self.changes.push_back(change);
        self.persist();
    }

    fn persist(&self) {
        if let Some(path) = &self.path {
            if let Err(e) = self.settings.save_to(path) {
                warn!("Failed to save settings: {:#}", e);
            }
        }
    }
}
