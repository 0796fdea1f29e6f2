//! In-memory stand-in for the host's input tools
//!
//! Answers xinput, synclient and gsettings invocations from a small shared
//! state so the engine and backends can be exercised without an X server.
//! Toggle commands mutate that state the way the real tools would.

use crate::command::CommandRunner;
use crate::device::{DeviceType, PROC_DEVICES};
use crate::error::CommandError;
use crate::notification::{ConfirmationPrompt, Notifier};
use std::cell::RefCell;
use std::rc::Rc;

/// One fake xinput device
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FakeDevice {
    pub id: u32,
    pub name: String,
    pub enabled: bool,
    /// Ignores set-prop (driver reverts every change)
    pub stuck: bool,
}

/// Observable state of the fake host
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FakeState {
    pub xinput: bool,
    pub devices: Vec<FakeDevice>,
    /// `Some(touchpad_off)` when synclient is installed
    pub synclient: Option<bool>,
    /// `Some(value)` when the gsettings key exists
    pub send_events: Option<String>,
    pub proc_devices: Option<String>,
}

#[derive(Debug, Default)]
struct Inner {
    state: FakeState,
    commands: Vec<String>,
}

/// Shared handle; clones see the same state
#[derive(Debug, Clone, Default)]
pub struct FakeSystem {
    inner: Rc<RefCell<Inner>>,
}

impl FakeSystem {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn runner(&self) -> Rc<dyn CommandRunner> {
        Rc::new(self.clone())
    }

    /// Make xinput answer even with no devices attached
    pub fn with_xinput(self) -> Self {
        self.inner.borrow_mut().state.xinput = true;
        self
    }

    pub fn with_device(self, id: u32, name: &str, enabled: bool) -> Self {
        self.add_device(id, name, enabled);
        self
    }

    pub fn with_stuck_device(self, id: u32) -> Self {
        self.update_device(id, |d| d.stuck = true);
        self
    }

    pub fn with_synclient(self, touchpad_off: bool) -> Self {
        self.inner.borrow_mut().state.synclient = Some(touchpad_off);
        self
    }

    pub fn with_send_events(self, value: &str) -> Self {
        self.inner.borrow_mut().state.send_events = Some(value.to_string());
        self
    }

    pub fn with_proc_devices(self, content: &str) -> Self {
        self.inner.borrow_mut().state.proc_devices = Some(content.to_string());
        self
    }

    pub fn add_device(&self, id: u32, name: &str, enabled: bool) {
        let mut inner = self.inner.borrow_mut();
        inner.state.xinput = true;
        inner.state.devices.push(FakeDevice {
            id,
            name: name.to_string(),
            enabled,
            stuck: false,
        });
    }

    pub fn remove_device(&self, id: u32) {
        self.inner.borrow_mut().state.devices.retain(|d| d.id != id);
    }

    pub fn device_enabled(&self, id: u32) -> Option<bool> {
        self.inner
            .borrow()
            .state
            .devices
            .iter()
            .find(|d| d.id == id)
            .map(|d| d.enabled)
    }

    pub fn set_device_enabled(&self, id: u32, enabled: bool) {
        self.update_device(id, |d| d.enabled = enabled);
    }

    pub fn touchpad_off(&self) -> Option<bool> {
        self.inner.borrow().state.synclient
    }

    pub fn set_touchpad_off(&self, off: bool) {
        self.inner.borrow_mut().state.synclient = Some(off);
    }

    pub fn send_events(&self) -> Option<String> {
        self.inner.borrow().state.send_events.clone()
    }

    pub fn set_send_events(&self, value: &str) {
        self.inner.borrow_mut().state.send_events = Some(value.to_string());
    }

    pub fn snapshot(&self) -> FakeState {
        self.inner.borrow().state.clone()
    }

    /// Every command line run so far, e.g. `xinput set-prop 11 Device Enabled 0`
    pub fn commands(&self) -> Vec<String> {
        self.inner.borrow().commands.clone()
    }

    pub fn commands_matching(&self, prefix: &str) -> Vec<String> {
        self.commands()
            .into_iter()
            .filter(|c| c.starts_with(prefix))
            .collect()
    }

    pub fn clear_commands(&self) {
        self.inner.borrow_mut().commands.clear();
    }

    fn update_device(&self, id: u32, f: impl FnOnce(&mut FakeDevice)) {
        let mut inner = self.inner.borrow_mut();
        if let Some(dev) = inner.state.devices.iter_mut().find(|d| d.id == id) {
            f(dev);
        }
    }

    fn record(&self, program: &str, args: &[&str]) {
        let mut line = program.to_string();
        for arg in args {
            line.push(' ');
            line.push_str(arg);
        }
        self.inner.borrow_mut().commands.push(line);
    }

    fn xinput(&self, args: &[&str]) -> Result<String, CommandError> {
        let inner = self.inner.borrow();
        if !inner.state.xinput {
            return Err(CommandError::NotFound("xinput".into()));
        }
        match args {
            ["--list"] => {
                let mut out = String::from("⎡ Virtual core pointer                    \tid=2\t[master pointer  (3)]\n");
                out.push_str("⎜   ↳ Virtual core XTEST pointer              \tid=4\t[slave  pointer  (2)]\n");
                for dev in &inner.state.devices {
                    out.push_str(&format!(
                        "⎜   ↳ {:<40}\tid={}\t[slave  pointer  (2)]\n",
                        dev.name, dev.id
                    ));
                }
                out.push_str("⎣ Virtual core keyboard                   \tid=3\t[master keyboard (2)]\n");
                Ok(out)
            }
            ["--list-props", id] => {
                let dev = inner
                    .state
                    .devices
                    .iter()
                    .find(|d| d.id.to_string() == *id)
                    .ok_or_else(|| failed("xinput"))?;
                Ok(format!(
                    "Device '{}':\n\tDevice Enabled (142):\t{}\n",
                    dev.name,
                    if dev.enabled { 1 } else { 0 }
                ))
            }
            _ => Err(failed("xinput")),
        }
    }

    fn set_prop(&self, args: &[&str]) -> Result<(), CommandError> {
        let mut inner = self.inner.borrow_mut();
        if !inner.state.xinput {
            return Err(CommandError::NotFound("xinput".into()));
        }
        let ["set-prop", id, "Device Enabled", value] = args else {
            return Err(failed("xinput"));
        };
        let dev = inner
            .state
            .devices
            .iter_mut()
            .find(|d| d.id.to_string() == *id)
            .ok_or_else(|| failed("xinput"))?;
        if !dev.stuck {
            dev.enabled = *value == "1";
        }
        Ok(())
    }

    fn synclient(&self, args: &[&str]) -> Result<String, CommandError> {
        let inner = self.inner.borrow();
        let off = inner
            .state
            .synclient
            .ok_or_else(|| CommandError::NotFound("synclient".into()))?;
        match args {
            ["-l"] => Ok(format!(
                "Parameter settings:\n    LeftEdge                = 1752\n    TouchpadOff             = {}\n",
                if off { 1 } else { 0 }
            )),
            _ => Err(failed("synclient")),
        }
    }

    fn gsettings_get(&self, args: &[&str]) -> Result<String, CommandError> {
        let inner = self.inner.borrow();
        match (args, &inner.state.send_events) {
            (["get", _, _], Some(value)) => Ok(format!("'{}'\n", value)),
            _ => Err(failed("gsettings")),
        }
    }

    fn gsettings_set(&self, args: &[&str]) -> Result<(), CommandError> {
        let mut inner = self.inner.borrow_mut();
        match (args, inner.state.send_events.is_some()) {
            (["set", _, _, value], true) => {
                inner.state.send_events = Some(value.to_string());
                Ok(())
            }
            _ => Err(failed("gsettings")),
        }
    }
}

fn failed(program: &str) -> CommandError {
    CommandError::Failed {
        program: program.to_string(),
        status: "exit status: 1".to_string(),
    }
}

impl CommandRunner for FakeSystem {
    fn run(&self, program: &str, args: &[&str]) -> Result<String, CommandError> {
        self.record(program, args);
        match program {
            "xinput" => self.xinput(args),
            "synclient" => self.synclient(args),
            "gsettings" => self.gsettings_get(args),
            _ => Err(CommandError::NotFound(program.to_string())),
        }
    }

    fn execute(&self, program: &str, args: &[&str]) -> Result<(), CommandError> {
        self.record(program, args);
        match program {
            "xinput" => self.set_prop(args),
            "gsettings" => self.gsettings_set(args),
            _ => Err(CommandError::NotFound(program.to_string())),
        }
    }

    fn spawn(&self, program: &str, args: &[&str]) -> Result<(), CommandError> {
        self.record(program, args);
        match (program, args) {
            ("synclient", [arg]) => {
                let mut inner = self.inner.borrow_mut();
                if inner.state.synclient.is_none() {
                    return Err(CommandError::NotFound("synclient".into()));
                }
                match arg.split_once('=') {
                    Some(("TouchpadOff", value)) => {
                        inner.state.synclient = Some(value != "0");
                        Ok(())
                    }
                    _ => Ok(()),
                }
            }
            _ => Err(CommandError::NotFound(program.to_string())),
        }
    }

    fn read_file(&self, path: &str) -> Result<String, CommandError> {
        let inner = self.inner.borrow();
        match (&inner.state.proc_devices, path == PROC_DEVICES) {
            (Some(content), true) => Ok(content.clone()),
            _ => Err(CommandError::NotFound(path.to_string())),
        }
    }
}

/// Notifier that keeps what it was asked to show
#[derive(Debug, Clone, Default)]
pub struct RecordingNotifier {
    sent: Rc<RefCell<Vec<(String, String)>>>,
}

impl RecordingNotifier {
    pub fn sent(&self) -> Vec<(String, String)> {
        self.sent.borrow().clone()
    }
}

impl Notifier for RecordingNotifier {
    fn notify(&self, summary: &str, body: &str) {
        self.sent
            .borrow_mut()
            .push((summary.to_string(), body.to_string()));
    }
}

/// Prompt that records requests; answers are fed back as engine events
#[derive(Debug, Clone, Default)]
pub struct RecordingPrompt {
    requests: Rc<RefCell<Vec<DeviceType>>>,
}

impl RecordingPrompt {
    pub fn requests(&self) -> Vec<DeviceType> {
        self.requests.borrow().clone()
    }
}

impl ConfirmationPrompt for RecordingPrompt {
    fn request(&self, device_type: DeviceType) {
        self.requests.borrow_mut().push(device_type);
    }
}
