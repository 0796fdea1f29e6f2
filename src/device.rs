//! Pointing device detection
//!
//! Enumerates attached pointer devices through `xinput --list`, falling back to
//! `/proc/bus/input/devices` when xinput is not available (e.g. on a pure
//! Wayland session), and turns the result into classified snapshots.

use crate::classify::Classifier;
use crate::command::CommandRunner;
use crate::error::CommandError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use tracing::{debug, warn};

/// Kernel device listing used when xinput is unavailable
pub const PROC_DEVICES: &str = "/proc/bus/input/devices";

/// Device kind, as decided by the classifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeviceType {
    Touchpad,
    Trackpoint,
    Touchscreen,
    Fingertouch,
    Pen,
    Mouse,
    Other,
}

impl DeviceType {
    /// Types that can be switched on and off as a group
    pub const MANAGED: [DeviceType; 5] = [
        DeviceType::Touchpad,
        DeviceType::Trackpoint,
        DeviceType::Touchscreen,
        DeviceType::Fingertouch,
        DeviceType::Pen,
    ];

    pub fn is_managed(self) -> bool {
        Self::MANAGED.contains(&self)
    }

    /// Settings key fragment ("touchpad", "pen", ...)
    pub fn key(self) -> &'static str {
        match self {
            DeviceType::Touchpad => "touchpad",
            DeviceType::Trackpoint => "trackpoint",
            DeviceType::Touchscreen => "touchscreen",
            DeviceType::Fingertouch => "fingertouch",
            DeviceType::Pen => "pen",
            DeviceType::Mouse => "mouse",
            DeviceType::Other => "other",
        }
    }

    /// Human-readable name for notifications and reports
    pub fn label(self) -> &'static str {
        match self {
            DeviceType::Touchpad => "Touchpad",
            DeviceType::Trackpoint => "Trackpoint",
            DeviceType::Touchscreen => "Touchscreen",
            DeviceType::Fingertouch => "Fingertouch",
            DeviceType::Pen => "Pen",
            DeviceType::Mouse => "Mouse",
            DeviceType::Other => "Other",
        }
    }
}

impl fmt::Display for DeviceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}

impl FromStr for DeviceType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "touchpad" => Ok(DeviceType::Touchpad),
            "trackpoint" => Ok(DeviceType::Trackpoint),
            "touchscreen" => Ok(DeviceType::Touchscreen),
            "fingertouch" => Ok(DeviceType::Fingertouch),
            "pen" => Ok(DeviceType::Pen),
            "mouse" => Ok(DeviceType::Mouse),
            "other" => Ok(DeviceType::Other),
            other => Err(format!(
                "unknown device type '{}' \
                 (expected touchpad, trackpoint, touchscreen, fingertouch or pen)",
                other
            )),
        }
    }
}

/// One device line as reported by the listing tool, before classification
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawDevice {
    /// xinput id, or the /proc mouse handler name
    pub id: String,
    pub name: String,
}

/// A classified device. Rebuilt on every scan.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PointingDevice {
    pub id: String,
    pub name: String,
    pub device_type: DeviceType,
}

/// True for synthetic pointers that are not real hardware: the X master and
/// XTEST devices, and the XWayland proxies a Wayland session exposes to X
/// clients (`xwayland-pointer:13` and friends)
pub fn is_placeholder(name: &str) -> bool {
    let name = name.to_ascii_lowercase();
    name.contains("virtual core") || name.starts_with("xwayland-")
}

/// Where the device list comes from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeviceSource {
    Xinput,
    ProcDevices,
}

/// Lists pointer devices with the first source that answers
pub struct Enumerator<'a> {
    runner: &'a dyn CommandRunner,
}

impl<'a> Enumerator<'a> {
    pub fn new(runner: &'a dyn CommandRunner) -> Self {
        Self { runner }
    }

    /// List pointer devices; `Err` means "unknown", not "no devices"
    pub fn enumerate(&self) -> Result<(DeviceSource, Vec<RawDevice>), CommandError> {
        match self.enumerate_xinput() {
            Ok(devices) => Ok((DeviceSource::Xinput, devices)),
            Err(xinput_err) => {
                debug!("xinput listing unavailable ({}), trying {}", xinput_err, PROC_DEVICES);
                match self.runner.read_file(PROC_DEVICES) {
                    Ok(content) => Ok((DeviceSource::ProcDevices, parse_proc_devices(&content))),
                    Err(e) => {
                        warn!("Could not enumerate pointing devices: {}; {}", xinput_err, e);
                        Err(xinput_err)
                    }
                }
            }
        }
    }

    /// `xinput --list` only; needed by the property toggle backend which
    /// must address devices by xinput id
    pub fn enumerate_xinput(&self) -> Result<Vec<RawDevice>, CommandError> {
        let output = self.runner.run("xinput", &["--list"])?;
        Ok(parse_xinput_list(&output))
    }
}

/// Parse `xinput --list` output.
///
/// Device lines look like
/// `⎜   ↳ SynPS/2 Synaptics TouchPad   id=11   [slave  pointer  (2)]`.
/// Lines that mention `pointer` but carry no usable id are skipped.
pub fn parse_xinput_list(output: &str) -> Vec<RawDevice> {
    let mut devices = Vec::new();

    for line in output.lines() {
        if !line.contains("pointer") {
            continue;
        }

        let Some(id) = extract_id(line) else {
            debug!("Skipping malformed xinput line: {:?}", line);
            continue;
        };

        let name = extract_name(line);
        if name.is_empty() || is_placeholder(&name) {
            continue;
        }

        devices.push(RawDevice { id, name });
    }

    devices
}

fn extract_id(line: &str) -> Option<String> {
    let start = line.find("id=")? + 3;
    let digits: String = line[start..]
        .chars()
        .take_while(|c| c.is_ascii_digit())
        .collect();
    if digits.is_empty() { None } else { Some(digits) }
}

fn extract_name(line: &str) -> String {
    let mut text = String::with_capacity(line.len());
    let mut depth = 0usize;
    for c in line.chars() {
        match c {
            '[' => depth += 1,
            ']' => depth = depth.saturating_sub(1),
            _ if depth == 0 => text.push(c),
            _ => {}
        }
    }

    text.split_whitespace()
        .filter(|word| !word.starts_with("id="))
        .map(|word| word.trim_matches(|c| matches!(c, '⎡' | '⎜' | '⎣' | '↳' | '∼')))
        .filter(|word| !word.is_empty())
        .collect::<Vec<_>>()
        .join(" ")
}

/// Parse `/proc/bus/input/devices`, keeping blocks with a `mouseN` handler
pub fn parse_proc_devices(content: &str) -> Vec<RawDevice> {
    let mut devices = Vec::new();

    for block in content.split("\n\n") {
        let mut name = None;
        let mut handler = None;

        for line in block.lines() {
            if let Some(rest) = line.strip_prefix("N: Name=") {
                name = Some(rest.trim().trim_matches('"').to_string());
            } else if let Some(rest) = line.strip_prefix("H: Handlers=") {
                handler = rest
                    .split_whitespace()
                    .find(|h| h.starts_with("mouse"))
                    .map(str::to_string);
            }
        }

        match (handler, name) {
            (Some(id), Some(name)) if !name.is_empty() && !is_placeholder(&name) => {
                devices.push(RawDevice { id, name });
            }
            (Some(id), _) => debug!("Skipping mouse handler {} without a name", id),
            _ => {}
        }
    }

    devices
}

/// Classified snapshot of the attached pointer devices
#[derive(Debug, Clone)]
pub struct Inventory {
    pub source: DeviceSource,
    pub devices: Vec<PointingDevice>,
}

impl Inventory {
    /// Enumerate and classify. `None` when the device list is unknown.
    pub fn scan(runner: &dyn CommandRunner, classifier: &Classifier) -> Option<Self> {
        let (source, raw) = Enumerator::new(runner).enumerate().ok()?;
        Some(Self::classify(source, raw, classifier))
    }

    pub fn classify(source: DeviceSource, raw: Vec<RawDevice>, classifier: &Classifier) -> Self {
        let devices = raw
            .into_iter()
            .map(|dev| PointingDevice {
                device_type: classifier.classify(&dev.name),
                id: dev.id,
                name: dev.name,
            })
            .collect();
        Self { source, devices }
    }

    pub fn of_type(&self, device_type: DeviceType) -> impl Iterator<Item = &PointingDevice> {
        self.devices
            .iter()
            .filter(move |d| d.device_type == device_type)
    }

    pub fn ids_of(&self, device_type: DeviceType) -> Vec<String> {
        self.of_type(device_type).map(|d| d.id.clone()).collect()
    }

    pub fn has(&self, device_type: DeviceType) -> bool {
        self.of_type(device_type).next().is_some()
    }

    /// Plain mice that are not on the exclusion list
    pub fn mouse_count(&self) -> usize {
        self.of_type(DeviceType::Mouse).count()
    }

    pub fn mouse_present(&self) -> bool {
        self.mouse_count() > 0
    }
}
