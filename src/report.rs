//! `devices` diagnostic report

use crate::backend::{ControlUtilityDriver, SwitchDriver};
use crate::classify::Classifier;
use crate::command::CommandRunner;
use crate::device::{DeviceSource, DeviceType, Inventory, PROC_DEVICES, PointingDevice};
use crate::logging;
use crate::platform::PlatformSetting;
use crate::settings::{Settings, SwitchMethod};
use std::fmt;
use std::path::PathBuf;
use std::rc::Rc;

const LOG_TAIL_LINES: usize = 20;

/// Snapshot of what the host looks like to pointer-switch
#[derive(Debug, Clone)]
pub struct Report {
    pub inventory: Option<Inventory>,
    pub xinput_installed: bool,
    pub synclient_in_use: bool,
    pub platform_enabled: Option<bool>,
    pub switch_method: SwitchMethod,
    pub enabled: Vec<(DeviceType, bool)>,
    pub autoswitch: Vec<DeviceType>,
    pub excluded: Vec<String>,
    pub possible_touchpad: Option<String>,
    /// Set when `debug_to_file` is on
    pub log_file: Option<PathBuf>,
    pub log_tail: Option<String>,
}

impl Report {
    pub fn gather(runner: Rc<dyn CommandRunner>, settings: &Settings) -> Self {
        let classifier = Classifier::from_settings(settings);
        let inventory = Inventory::scan(runner.as_ref(), &classifier);
        let xinput_installed = runner.run("xinput", &["--list"]).is_ok();
        let synclient_in_use = ControlUtilityDriver::new(runner.clone()).probe();
        let platform_enabled = PlatformSetting::new(runner).is_enabled();
        let log_file = if settings.debug_to_file {
            logging::log_file_path().ok()
        } else {
            None
        };
        let log_tail = log_file
            .as_deref()
            .and_then(|path| logging::tail(path, LOG_TAIL_LINES));

        Self {
            inventory,
            xinput_installed,
            synclient_in_use,
            platform_enabled,
            switch_method: settings.switch_method,
            enabled: DeviceType::MANAGED
                .into_iter()
                .map(|t| (t, settings.enabled.get(t)))
                .collect(),
            autoswitch: DeviceType::MANAGED
                .into_iter()
                .filter(|&t| settings.autoswitch.get(t))
                .collect(),
            excluded: settings.excluded_mouses.iter().cloned().collect(),
            possible_touchpad: settings.possible_touchpad().map(str::to_string),
            log_file,
            log_tail,
        }
    }

    fn devices(&self, device_type: DeviceType) -> Vec<&PointingDevice> {
        self.inventory
            .iter()
            .flat_map(|inv| inv.of_type(device_type))
            .collect()
    }
}

fn yes_no(value: bool) -> &'static str {
    if value { "yes" } else { "no" }
}

impl fmt::Display for Report {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.inventory {
            None => writeln!(f, "Devices: unknown (xinput and {} unavailable)", PROC_DEVICES)?,
            Some(inv) => {
                let source = match inv.source {
                    DeviceSource::Xinput => "xinput",
                    DeviceSource::ProcDevices => PROC_DEVICES,
                };
                writeln!(f, "Devices (from {}):", source)?;
                let listed = DeviceType::MANAGED
                    .into_iter()
                    .chain([DeviceType::Mouse, DeviceType::Other]);
                for t in listed {
                    for dev in self.devices(t) {
                        writeln!(f, "  {:<12} {:>4}  {}", t.label(), dev.id, dev.name)?;
                    }
                }
                if !inv.has(DeviceType::Touchpad) {
                    writeln!(f, "No touchpad detected.")?;
                    if inv.mouse_present() {
                        writeln!(
                            f,
                            "If one of the mice above is your touchpad, \
                             mark it with `possible-touchpad <name>`."
                        )?;
                    }
                }
            }
        }

        writeln!(f)?;
        writeln!(f, "xinput installed:   {}", yes_no(self.xinput_installed))?;
        writeln!(f, "synclient in use:   {}", yes_no(self.synclient_in_use))?;
        match self.platform_enabled {
            Some(enabled) => writeln!(
                f,
                "Platform touchpad:  {}",
                if enabled { "enabled" } else { "disabled" }
            )?,
            None => writeln!(f, "Platform touchpad:  unavailable")?,
        }
        writeln!(f, "Switch method:      {}", self.switch_method)?;

        writeln!(f)?;
        for (t, enabled) in &self.enabled {
            let auto = if self.autoswitch.contains(t) { " (auto-switch)" } else { "" };
            writeln!(
                f,
                "{:<12} {}{}",
                t.label(),
                if *enabled { "enabled" } else { "disabled" },
                auto
            )?;
        }
        if let Some(name) = &self.possible_touchpad {
            writeln!(f, "Possible touchpad:  {}", name)?;
        }
        if !self.excluded.is_empty() {
            writeln!(f, "Excluded mice:      {}", self.excluded.join(", "))?;
        }

        if let Some(path) = &self.log_file {
            writeln!(f)?;
            writeln!(f, "Log file:           {}", path.display())?;
            if let Some(tail) = &self.log_tail {
                writeln!(f, "{}", tail)?;
            }
        }
        Ok(())
    }
}
