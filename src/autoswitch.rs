//! Auto-switch policy: turn built-in pointing devices off while a mouse is
//! attached and back on once it is gone.

use crate::device::DeviceType;
use crate::settings::Settings;
use std::fmt;

/// What caused an auto-switch run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AutoSwitchTrigger {
    Startup,
    MousePlugged,
    MouseUnplugged,
    /// An autoswitch flag was just turned on
    SettingChanged,
}

impl fmt::Display for AutoSwitchTrigger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            AutoSwitchTrigger::Startup => "startup",
            AutoSwitchTrigger::MousePlugged => "mouse plugged",
            AutoSwitchTrigger::MouseUnplugged => "mouse unplugged",
            AutoSwitchTrigger::SettingChanged => "setting changed",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Decision {
    pub device_type: DeviceType,
    pub enabled: bool,
}

/// Writes needed to bring every auto-switched type in line with mouse
/// presence. Types already in the target state produce nothing.
pub fn decide(mouse_present: bool, settings: &Settings) -> Vec<Decision> {
    DeviceType::MANAGED
        .into_iter()
        .filter(|&t| settings.autoswitch.get(t))
        .filter(|&t| settings.enabled.get(t) == mouse_present)
        .map(|device_type| Decision {
            device_type,
            enabled: !mouse_present,
        })
        .collect()
}

/// Notification text for the decisions that took effect
pub fn summarize(mouse_present: bool, applied: &[Decision]) -> Option<(String, String)> {
    if applied.is_empty() {
        return None;
    }
    let summary = if mouse_present {
        "Mouse plugged in"
    } else {
        "Mouse unplugged"
    };
    let body = applied
        .iter()
        .map(|d| {
            format!(
                "{} {}",
                d.device_type.label(),
                if d.enabled { "enabled" } else { "disabled" }
            )
        })
        .collect::<Vec<_>>()
        .join("\n");
    Some((summary.to_string(), body))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn settings(autoswitch: &[DeviceType], disabled: &[DeviceType]) -> Settings {
        let mut settings = Settings::default();
        settings.autoswitch.touchpad = autoswitch.contains(&DeviceType::Touchpad);
        settings.autoswitch.trackpoint = autoswitch.contains(&DeviceType::Trackpoint);
        settings.autoswitch.pen = autoswitch.contains(&DeviceType::Pen);
        settings.enabled.touchpad = !disabled.contains(&DeviceType::Touchpad);
        settings.enabled.trackpoint = !disabled.contains(&DeviceType::Trackpoint);
        settings
    }

    #[test]
    fn test_mouse_present_disables_flagged_types() {
        let s = settings(&[DeviceType::Touchpad, DeviceType::Trackpoint], &[]);
        assert_eq!(
            decide(true, &s),
            vec![
                Decision {
                    device_type: DeviceType::Touchpad,
                    enabled: false
                },
                Decision {
                    device_type: DeviceType::Trackpoint,
                    enabled: false
                },
            ]
        );
    }

    #[test]
    fn test_no_mouse_enables_disabled_types() {
        let s = settings(&[DeviceType::Touchpad], &[DeviceType::Touchpad, DeviceType::Trackpoint]);
        // Trackpoint isn't auto-switched, so it stays off
        assert_eq!(
            decide(false, &s),
            vec![Decision {
                device_type: DeviceType::Touchpad,
                enabled: true
            }]
        );
    }

    #[test]
    fn test_already_in_target_state() {
        let s = settings(&[DeviceType::Touchpad], &[DeviceType::Touchpad]);
        assert!(decide(true, &s).is_empty());
        assert!(decide(false, &settings(&[], &[DeviceType::Touchpad])).is_empty());
    }

    #[test]
    fn test_summarize() {
        assert_eq!(summarize(true, &[]), None);
        let (summary, body) = summarize(
            false,
            &[Decision {
                device_type: DeviceType::Touchpad,
                enabled: true,
            }],
        )
        .unwrap();
        assert_eq!(summary, "Mouse unplugged");
        assert_eq!(body, "Touchpad enabled");
    }
}
