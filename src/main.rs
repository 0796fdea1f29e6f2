//! pointer-switch - pointing device switcher
//!
//! Runs as a session daemon by default; the other subcommands edit the
//! settings and apply them once.

use anyhow::{Result, bail};
use clap::{Parser, Subcommand, ValueEnum};
use pointer_switch::command::{CommandRunner, SystemRunner};
use pointer_switch::daemon::{self, DaemonOptions};
use pointer_switch::device::DeviceType;
use pointer_switch::engine::Engine;
use pointer_switch::logging;
use pointer_switch::notification::{DecliningPrompt, LogNotifier};
use pointer_switch::report::Report;
use pointer_switch::settings::{Settings, SettingsStore, SwitchMethod};
use std::path::PathBuf;
use std::rc::Rc;
use tracing::{info, warn};

#[derive(Parser, Debug)]
#[command(name = "pointer-switch")]
#[command(version, about = "Switch touchpads and other pointing devices on and off")]
struct Cli {
    /// Debug logging (also enabled by `debug = true` in the settings)
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Settings file to use instead of the default
    #[arg(long, global = true, value_name = "FILE")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run the daemon (default)
    Run,
    /// Show detected devices and tool availability
    Devices,
    #[command(flatten)]
    Edit(Edit),
}

/// Settings edits, applied once through a short-lived engine
#[derive(Subcommand, Debug)]
enum Edit {
    /// Enable a device type
    Enable { device: DeviceType },
    /// Disable a device type
    Disable {
        device: DeviceType,
        /// Don't refuse when no other pointing device would stay enabled
        #[arg(long)]
        force: bool,
    },
    /// Show or change the touchpad switch method
    Method { method: Option<SwitchMethod> },
    /// Switch a device type off while a mouse is plugged in
    Autoswitch { device: DeviceType, state: Toggle },
    /// Toggle notifications about automatic switching
    Notifications { state: Toggle },
    /// Don't count a device as a mouse
    Exclude { name: String },
    /// Count a previously excluded device as a mouse again
    Include { name: String },
    /// Toggle debug logging (takes effect on the next start)
    Debug { state: Toggle },
    /// Toggle appending the log to debug.log in the data directory
    LogFile { state: Toggle },
    /// Treat a device as the touchpad (switches the method to property-toggle).
    /// Without a name the override is cleared.
    PossibleTouchpad { name: Option<String> },
}

#[derive(ValueEnum, Clone, Copy, Debug)]
enum Toggle {
    On,
    Off,
}

impl Toggle {
    fn as_bool(self) -> bool {
        matches!(self, Toggle::On)
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let settings_path = match cli.config.clone() {
        Some(path) => path,
        None => Settings::default_path()?,
    };
    let (debug, to_file) = Settings::load_from(&settings_path)
        .map(|s| (s.debug, s.debug_to_file))
        .unwrap_or((false, false));
    logging::init(cli.verbose || debug, to_file);

    match cli.command.unwrap_or(Command::Run) {
        Command::Run => {
            info!("pointer-switch starting (settings: {:?})", settings_path);
            daemon::run(DaemonOptions::new(settings_path))
        }
        Command::Devices => {
            let runner: Rc<dyn CommandRunner> = Rc::new(SystemRunner);
            let settings = SettingsStore::open(settings_path);
            print!("{}", Report::gather(runner, settings.get()));
            Ok(())
        }
        Command::Edit(edit) => run_once(settings_path, edit),
    }
}

fn run_once(settings_path: PathBuf, edit: Edit) -> Result<()> {
    let mut engine = Engine::new(
        Rc::new(SystemRunner),
        SettingsStore::open(settings_path),
        Box::new(LogNotifier),
        Box::new(DecliningPrompt::new(None)),
    );
    engine.start();

    match edit {
        Edit::Enable { device } => {
            ensure_managed(device)?;
            engine.request(device, true);
            report_state(&engine, device);
        }
        Edit::Disable { device, force } => {
            ensure_managed(device)?;
            if force {
                engine.force_disable(device);
            } else {
                engine.request(device, false);
                if engine.pending_confirmation() == Some(device) {
                    bail!(
                        "{} is the last enabled pointing device; use --force to disable it anyway",
                        device
                    );
                }
            }
            report_state(&engine, device);
        }
        Edit::Method { method: None } => {
            println!("{}", engine.settings().switch_method());
            if engine.active_method() != engine.settings().switch_method() {
                println!("(unavailable, using {})", engine.active_method());
            }
        }
        Edit::Method {
            method: Some(method),
        } => {
            engine.set_switch_method(method);
            if engine.active_method() != method {
                warn!("{} is not usable here, using {}", method, engine.active_method());
            }
        }
        Edit::Autoswitch { device, state } => {
            ensure_managed(device)?;
            engine.update(|store| store.set_autoswitch(device, state.as_bool()));
        }
        Edit::Notifications { state } => {
            engine.update(|store| store.set_show_notifications(state.as_bool()));
        }
        Edit::Exclude { name } => {
            engine.update(|store| store.set_excluded(&name, true));
        }
        Edit::Include { name } => {
            if !engine.update(|store| store.set_excluded(&name, false)) {
                warn!("{:?} was not excluded", name);
            }
        }
        Edit::Debug { state } => {
            engine.update(|store| store.set_debug(state.as_bool()));
        }
        Edit::LogFile { state } => {
            engine.update(|store| store.set_debug_to_file(state.as_bool()));
        }
        Edit::PossibleTouchpad { name } => {
            let name = name.unwrap_or_default().trim().to_string();
            engine.update(|store| store.set_possible_touchpad(&name));
            // Only xinput can switch a device that isn't recognized as a touchpad
            if !name.is_empty() && name != "-" {
                engine.set_switch_method(SwitchMethod::PropertyToggle);
            }
        }
    }
    Ok(())
}

fn ensure_managed(device: DeviceType) -> Result<()> {
    if !device.is_managed() {
        bail!("{} devices can't be switched", device);
    }
    Ok(())
}

fn report_state(engine: &Engine, device: DeviceType) {
    println!(
        "{}: {}",
        device.label(),
        if engine.settings().enabled(device) {
            "enabled"
        } else {
            "disabled"
        }
    );
}
