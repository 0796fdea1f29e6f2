//! Integration tests for pointer-switch
//!
//! These drive the synchronization engine end to end against the in-memory
//! `FakeSystem`, so no X server, synclient or GNOME session is needed.

use pointer_switch::device::{DeviceType, Inventory};
use pointer_switch::classify::Classifier;
use pointer_switch::engine::{Engine, Event};
use pointer_switch::fake::{FakeSystem, RecordingNotifier, RecordingPrompt};
use pointer_switch::hotplug::{HotplugEvent, HotplugMonitor, SettingsWatch};
use pointer_switch::settings::{Settings, SettingsStore, SwitchMethod};
use pointer_switch::watch::ChangeKind;
use std::path::PathBuf;
use std::time::{Duration, Instant};
use tokio::sync::mpsc;

const TOUCHPAD: u32 = 11;
const TRACKPOINT: u32 = 12;
const MOUSE: u32 = 13;

const TOUCHPAD_NAME: &str = "SynPS/2 Synaptics TouchPad";
const TRACKPOINT_NAME: &str = "TPPS/2 IBM TrackPoint";
const MOUSE_NAME: &str = "Logitech USB Optical Mouse";

struct Harness {
    system: FakeSystem,
    engine: Engine,
    notifier: RecordingNotifier,
    prompt: RecordingPrompt,
}

fn harness(system: FakeSystem, settings: Settings) -> Harness {
    harness_with_store(system, SettingsStore::in_memory(settings))
}

fn harness_with_store(system: FakeSystem, store: SettingsStore) -> Harness {
    let notifier = RecordingNotifier::default();
    let prompt = RecordingPrompt::default();
    let mut engine = Engine::new(
        system.runner(),
        store,
        Box::new(notifier.clone()),
        Box::new(prompt.clone()),
    );
    engine.start();
    Harness {
        system,
        engine,
        notifier,
        prompt,
    }
}

fn with_method(method: SwitchMethod) -> Settings {
    Settings {
        switch_method: method,
        ..Settings::default()
    }
}

fn hotplug(kind: ChangeKind) -> Event {
    Event::Hotplug(HotplugEvent {
        path: PathBuf::from("/dev/input/mouse1"),
        kind,
    })
}

/// Platform echoes of our own writes must not produce further writes
#[test]
fn test_platform_echo_does_not_loop() {
    let system = FakeSystem::new()
        .with_device(TOUCHPAD, TOUCHPAD_NAME, true)
        .with_device(MOUSE, MOUSE_NAME, true)
        .with_send_events("enabled");
    let mut h = harness(system, with_method(SwitchMethod::PlatformSetting));
    assert!(h.engine.has_platform());
    h.system.clear_commands();

    // Equal write: nothing at all
    let before = h.engine.settings().notification_count();
    h.engine.handle(Event::PlatformChanged(true));
    assert_eq!(h.engine.settings().notification_count(), before);
    assert!(h.system.commands_matching("gsettings set").is_empty());

    // One real change, one platform write
    h.engine.request(DeviceType::Touchpad, false);
    assert_eq!(h.engine.settings().notification_count(), before + 1);
    assert_eq!(h.system.send_events().as_deref(), Some("disabled"));
    assert_eq!(h.system.commands_matching("gsettings set").len(), 1);

    // gsettings monitor reports our own write back
    h.engine.handle(Event::PlatformChanged(false));
    assert_eq!(h.engine.settings().notification_count(), before + 1);
    assert_eq!(h.system.commands_matching("gsettings set").len(), 1);
}

/// What `gsettings monitor` would report for every write made so far
fn platform_writes(system: &FakeSystem) -> Vec<Event> {
    system
        .commands_matching("gsettings set")
        .iter()
        .map(|cmd| Event::PlatformChanged(!cmd.ends_with(" disabled")))
        .collect()
}

#[test]
fn test_late_echoes_of_quick_toggles_settle() {
    let system = FakeSystem::new()
        .with_device(TOUCHPAD, TOUCHPAD_NAME, true)
        .with_device(MOUSE, MOUSE_NAME, true)
        .with_send_events("enabled");
    let mut h = harness(system, with_method(SwitchMethod::PropertyToggle));
    h.system.clear_commands();

    // Off and on again before the monitor has reported anything
    h.engine.request(DeviceType::Touchpad, false);
    h.engine.request(DeviceType::Touchpad, true);
    let echoes = platform_writes(&h.system);
    assert_eq!(echoes.len(), 2);

    for echo in echoes {
        h.engine.handle(echo);
    }

    assert_eq!(h.system.commands_matching("gsettings set").len(), 2);
    assert_eq!(h.system.commands_matching("xinput set-prop").len(), 2);
    assert!(h.engine.settings().enabled(DeviceType::Touchpad));
    assert_eq!(h.system.device_enabled(TOUCHPAD), Some(true));
    assert_eq!(h.system.send_events().as_deref(), Some("enabled"));
}

#[test]
fn test_external_platform_change_reaches_the_devices() {
    let system = FakeSystem::new()
        .with_device(TOUCHPAD, TOUCHPAD_NAME, true)
        .with_device(MOUSE, MOUSE_NAME, true)
        .with_send_events("enabled");
    let mut h = harness(system, with_method(SwitchMethod::PropertyToggle));

    h.system.set_send_events("disabled");
    h.engine.handle(Event::PlatformChanged(false));

    assert!(!h.engine.settings().enabled(DeviceType::Touchpad));
    assert_eq!(h.system.device_enabled(TOUCHPAD), Some(false));
    assert_eq!(h.system.device_enabled(MOUSE), Some(true));
}

#[test]
fn test_xinput_switch_is_mirrored_to_platform() {
    let system = FakeSystem::new()
        .with_device(TOUCHPAD, TOUCHPAD_NAME, true)
        .with_device(MOUSE, MOUSE_NAME, true)
        .with_send_events("enabled");
    let mut h = harness(system, with_method(SwitchMethod::PropertyToggle));

    h.engine.request(DeviceType::Touchpad, false);
    assert_eq!(h.system.device_enabled(TOUCHPAD), Some(false));
    assert_eq!(h.system.send_events().as_deref(), Some("disabled"));
}

#[test]
fn test_last_device_requires_confirmation() {
    let system = FakeSystem::new().with_device(TOUCHPAD, TOUCHPAD_NAME, true);
    let mut h = harness(system, with_method(SwitchMethod::PropertyToggle));

    h.engine.request(DeviceType::Touchpad, false);
    assert_eq!(h.prompt.requests(), vec![DeviceType::Touchpad]);
    assert_eq!(h.engine.pending_confirmation(), Some(DeviceType::Touchpad));
    // UI reverted, device untouched
    assert!(h.engine.settings().enabled(DeviceType::Touchpad));
    assert_eq!(h.system.device_enabled(TOUCHPAD), Some(true));

    h.engine.handle(Event::Confirmation {
        device_type: DeviceType::Touchpad,
        accepted: false,
    });
    assert_eq!(h.engine.pending_confirmation(), None);
    assert_eq!(h.system.device_enabled(TOUCHPAD), Some(true));
    assert!(h.engine.settings().enabled(DeviceType::Touchpad));

    // Ask again, this time say yes
    h.engine.request(DeviceType::Touchpad, false);
    assert_eq!(h.prompt.requests().len(), 2);
    h.engine.handle(Event::Confirmation {
        device_type: DeviceType::Touchpad,
        accepted: true,
    });
    assert_eq!(h.system.device_enabled(TOUCHPAD), Some(false));
    assert!(!h.engine.settings().enabled(DeviceType::Touchpad));
    assert_eq!(h.engine.pending_confirmation(), None);
}

#[test]
fn test_other_enabled_device_skips_confirmation() {
    let system = FakeSystem::new()
        .with_device(TOUCHPAD, TOUCHPAD_NAME, true)
        .with_device(TRACKPOINT, TRACKPOINT_NAME, true);
    let mut h = harness(system, with_method(SwitchMethod::PropertyToggle));

    h.engine.request(DeviceType::Touchpad, false);
    assert!(h.prompt.requests().is_empty());
    assert_eq!(h.system.device_enabled(TOUCHPAD), Some(false));

    // Now the trackpoint is the last one
    h.engine.request(DeviceType::Trackpoint, false);
    assert_eq!(h.prompt.requests(), vec![DeviceType::Trackpoint]);
    assert_eq!(h.system.device_enabled(TRACKPOINT), Some(true));
}

#[test]
fn test_unknown_inventory_requires_confirmation() {
    // No xinput, no /proc listing: only the platform setting works
    let system = FakeSystem::new().with_send_events("enabled");
    let mut h = harness(system, with_method(SwitchMethod::PlatformSetting));

    h.engine.request(DeviceType::Touchpad, false);
    assert_eq!(h.prompt.requests(), vec![DeviceType::Touchpad]);
    assert_eq!(h.system.send_events().as_deref(), Some("enabled"));
}

#[test]
fn test_method_switch_hands_touchpad_over() {
    let system = FakeSystem::new()
        .with_device(TOUCHPAD, TOUCHPAD_NAME, true)
        .with_synclient(false);
    let mut settings = with_method(SwitchMethod::PropertyToggle);
    settings.enabled.touchpad = false;
    let mut h = harness(system, settings);
    assert_eq!(h.system.device_enabled(TOUCHPAD), Some(false));
    assert!(!h.engine.watcher_wanted());

    assert!(h.engine.set_switch_method(SwitchMethod::ControlUtility));

    // Old mechanism let go of the touchpad, new one holds it off
    assert_eq!(h.system.device_enabled(TOUCHPAD), Some(true));
    assert_eq!(h.system.touchpad_off(), Some(true));
    assert_eq!(h.engine.active_method(), SwitchMethod::ControlUtility);
    assert!(!h.engine.settings().enabled(DeviceType::Touchpad));
    assert!(h.engine.watcher_wanted());
    assert!(h.prompt.requests().is_empty());
}

#[test]
fn test_watcher_reports_external_toggle_once() {
    let system = FakeSystem::new()
        .with_device(TOUCHPAD, TOUCHPAD_NAME, true)
        .with_synclient(false);
    let mut h = harness(system, with_method(SwitchMethod::ControlUtility));
    assert!(h.engine.watcher_wanted());
    h.system.clear_commands();

    let before = h.engine.settings().notification_count();
    h.engine.handle(Event::ControlUtilityTick);
    assert_eq!(h.engine.settings().notification_count(), before);

    // Someone runs `synclient TouchpadOff=1`
    h.system.set_touchpad_off(true);
    h.engine.handle(Event::ControlUtilityTick);
    h.engine.handle(Event::ControlUtilityTick);
    h.engine.handle(Event::ControlUtilityTick);

    assert!(!h.engine.settings().enabled(DeviceType::Touchpad));
    assert_eq!(h.engine.settings().notification_count(), before + 1);
    // Observed, not re-applied
    assert!(h.system.commands_matching("synclient TouchpadOff").is_empty());
    assert!(h.prompt.requests().is_empty());
}

#[test]
fn test_engine_toggle_is_not_seen_as_external() {
    let system = FakeSystem::new()
        .with_device(TOUCHPAD, TOUCHPAD_NAME, true)
        .with_device(MOUSE, MOUSE_NAME, true)
        .with_synclient(false);
    let mut h = harness(system, with_method(SwitchMethod::ControlUtility));

    h.engine.request(DeviceType::Touchpad, false);
    assert_eq!(h.system.touchpad_off(), Some(true));
    let after_request = h.engine.settings().notification_count();

    h.engine.handle(Event::ControlUtilityTick);
    assert_eq!(h.engine.settings().notification_count(), after_request);
    assert!(!h.engine.settings().enabled(DeviceType::Touchpad));
}

#[test]
fn test_unplugging_last_mouse_enables_touchpad() {
    let system = FakeSystem::new()
        .with_device(TOUCHPAD, TOUCHPAD_NAME, true)
        .with_device(MOUSE, MOUSE_NAME, true);
    let mut settings = with_method(SwitchMethod::PropertyToggle);
    settings.autoswitch.touchpad = true;
    let mut h = harness(system, settings);

    // Mouse was attached at startup
    assert_eq!(h.system.device_enabled(TOUCHPAD), Some(false));
    assert!(!h.engine.settings().enabled(DeviceType::Touchpad));

    h.system.remove_device(MOUSE);
    h.engine.handle(hotplug(ChangeKind::Deleted));

    assert_eq!(h.system.device_enabled(TOUCHPAD), Some(true));
    assert!(h.engine.settings().enabled(DeviceType::Touchpad));
    let sent = h.notifier.sent();
    assert_eq!(
        sent.last(),
        Some(&("Mouse unplugged".to_string(), "Touchpad enabled".to_string()))
    );

    h.system.add_device(MOUSE, MOUSE_NAME, true);
    h.engine.handle(hotplug(ChangeKind::Created));
    assert_eq!(h.system.device_enabled(TOUCHPAD), Some(false));
    assert_eq!(h.notifier.sent().last().map(|(s, _)| s.as_str()), Some("Mouse plugged in"));
}

#[test]
fn test_autoswitch_respects_notification_setting() {
    let system = FakeSystem::new()
        .with_device(TOUCHPAD, TOUCHPAD_NAME, true)
        .with_device(MOUSE, MOUSE_NAME, true);
    let mut settings = with_method(SwitchMethod::PropertyToggle);
    settings.autoswitch.touchpad = true;
    settings.show_notifications = false;
    let h = harness(system, settings);

    assert_eq!(h.system.device_enabled(TOUCHPAD), Some(false));
    assert!(h.notifier.sent().is_empty());
}

#[test]
fn test_hotplug_without_autoswitch_changes_nothing() {
    let system = FakeSystem::new().with_device(TOUCHPAD, TOUCHPAD_NAME, true);
    let mut h = harness(system, with_method(SwitchMethod::PropertyToggle));
    h.system.add_device(MOUSE, MOUSE_NAME, true);
    h.engine.handle(hotplug(ChangeKind::Created));
    assert_eq!(h.system.device_enabled(TOUCHPAD), Some(true));
}

#[test]
fn test_plugged_touchpad_follows_setting() {
    let system = FakeSystem::new()
        .with_device(TOUCHPAD, TOUCHPAD_NAME, true)
        .with_device(MOUSE, MOUSE_NAME, true);
    let mut settings = with_method(SwitchMethod::PropertyToggle);
    settings.enabled.touchpad = false;
    let mut h = harness(system, settings);
    assert_eq!(h.system.device_enabled(TOUCHPAD), Some(false));

    h.system.add_device(20, "Apple Magic Trackpad", true);
    h.engine.handle(hotplug(ChangeKind::Created));

    assert_eq!(h.system.device_enabled(20), Some(false));
    assert!(!h.engine.settings().enabled(DeviceType::Touchpad));
    assert!(h.prompt.requests().is_empty());
}

#[test]
fn test_xwayland_pointers_are_not_mice() {
    let system = FakeSystem::new()
        .with_device(13, "xwayland-pointer:13", true)
        .with_device(14, "xwayland-relative-pointer:13", true)
        .with_send_events("enabled");
    let mut settings = Settings::default();
    settings.autoswitch.touchpad = true;
    let h = harness(system, settings);

    assert!(h.engine.settings().enabled(DeviceType::Touchpad));
    assert_eq!(h.system.send_events().as_deref(), Some("enabled"));
    assert!(h.notifier.sent().is_empty());
}

#[test]
fn test_method_switch_from_platform_setting_keeps_intent() {
    let system = FakeSystem::new()
        .with_device(TOUCHPAD, TOUCHPAD_NAME, true)
        .with_device(TRACKPOINT, TRACKPOINT_NAME, true)
        .with_send_events("disabled");
    let mut settings = with_method(SwitchMethod::PlatformSetting);
    settings.enabled.touchpad = false;
    settings.enabled.trackpoint = false;
    let mut h = harness(system, settings);
    assert_eq!(h.system.device_enabled(TRACKPOINT), Some(false));
    h.system.clear_commands();

    assert!(h.engine.set_switch_method(SwitchMethod::PropertyToggle));

    // The platform key was handed over enabled, then mirrored back off
    assert_eq!(h.system.commands_matching("gsettings set").len(), 2);
    assert_eq!(h.system.send_events().as_deref(), Some("disabled"));
    assert_eq!(h.system.device_enabled(TOUCHPAD), Some(false));
    assert_eq!(h.system.device_enabled(TRACKPOINT), Some(false));
    assert!(!h.engine.settings().enabled(DeviceType::Touchpad));
    assert!(!h.engine.settings().enabled(DeviceType::Trackpoint));

    // Both writes come back from the monitor afterwards
    for echo in platform_writes(&h.system) {
        h.engine.handle(echo);
    }
    assert_eq!(h.system.commands_matching("gsettings set").len(), 2);
    assert!(!h.engine.settings().enabled(DeviceType::Touchpad));
    assert_eq!(h.system.device_enabled(TOUCHPAD), Some(false));
    assert!(h.prompt.requests().is_empty());
}

#[test]
fn test_method_switch_to_control_utility_keeps_other_types() {
    let system = FakeSystem::new()
        .with_device(TOUCHPAD, TOUCHPAD_NAME, true)
        .with_device(TRACKPOINT, TRACKPOINT_NAME, true)
        .with_synclient(false)
        .with_send_events("enabled");
    let mut settings = with_method(SwitchMethod::PlatformSetting);
    settings.enabled.trackpoint = false;
    let mut h = harness(system, settings);
    assert_eq!(h.system.device_enabled(TRACKPOINT), Some(false));

    assert!(h.engine.set_switch_method(SwitchMethod::ControlUtility));

    assert_eq!(h.engine.active_method(), SwitchMethod::ControlUtility);
    assert_eq!(h.system.touchpad_off(), Some(false));
    assert_eq!(h.system.device_enabled(TOUCHPAD), Some(true));
    assert_eq!(h.system.send_events().as_deref(), Some("enabled"));
    assert_eq!(h.system.device_enabled(TRACKPOINT), Some(false));
    assert!(!h.engine.settings().enabled(DeviceType::Trackpoint));
    assert!(h.engine.settings().enabled(DeviceType::Touchpad));
}

#[test]
fn test_excluding_the_mouse_reenables_touchpad() {
    let system = FakeSystem::new()
        .with_device(TOUCHPAD, TOUCHPAD_NAME, true)
        .with_device(MOUSE, "IR Remote Receiver", true);
    let mut settings = with_method(SwitchMethod::PropertyToggle);
    settings.autoswitch.touchpad = true;
    let mut h = harness(system, settings);
    assert_eq!(h.system.device_enabled(TOUCHPAD), Some(false));

    assert!(h
        .engine
        .update(|store| store.set_excluded("ir remote receiver", true)));
    assert_eq!(h.system.device_enabled(TOUCHPAD), Some(true));
}

#[test]
fn test_possible_touchpad_is_switched_as_touchpad() {
    let system = FakeSystem::new()
        .with_device(14, "PS/2 Generic Mouse", true)
        .with_device(TRACKPOINT, TRACKPOINT_NAME, true);
    let mut h = harness(system, with_method(SwitchMethod::PropertyToggle));

    h.engine
        .update(|store| store.set_possible_touchpad("PS/2 Generic Mouse"));
    h.engine.request(DeviceType::Touchpad, false);
    assert_eq!(h.system.device_enabled(14), Some(false));
}

#[test]
fn test_enumeration_scenario() {
    let system = FakeSystem::new()
        .with_device(8, "TouchpadXYZ", true)
        .with_device(9, "USB Optical Mouse", true);
    let classifier = Classifier::from_settings(&Settings::default());
    let runner = system.runner();
    let inventory = Inventory::scan(runner.as_ref(), &classifier).unwrap();

    assert_eq!(inventory.ids_of(DeviceType::Touchpad), vec!["8".to_string()]);
    assert_eq!(inventory.ids_of(DeviceType::Mouse), vec!["9".to_string()]);
    assert!(inventory.mouse_present());
}

#[test]
fn test_proc_fallback_when_xinput_missing() {
    let proc_devices = "\
I: Bus=0011 Vendor=0002 Product=0007 Version=01b1
N: Name=\"SynPS/2 Synaptics TouchPad\"
H: Handlers=mouse0 event5

I: Bus=0003 Vendor=046d Product=c077 Version=0111
N: Name=\"Logitech USB Optical Mouse\"
H: Handlers=mouse1 event7
";
    let system = FakeSystem::new().with_proc_devices(proc_devices);
    let classifier = Classifier::from_settings(&Settings::default());
    let runner = system.runner();
    let inventory = Inventory::scan(runner.as_ref(), &classifier).unwrap();

    assert_eq!(inventory.ids_of(DeviceType::Touchpad), vec!["mouse0".to_string()]);
    assert_eq!(inventory.mouse_count(), 1);
}

#[test]
fn test_external_settings_edit_is_applied() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("settings.toml");
    with_method(SwitchMethod::PropertyToggle).save_to(&path).unwrap();

    let system = FakeSystem::new()
        .with_device(TOUCHPAD, TOUCHPAD_NAME, true)
        .with_device(TRACKPOINT, TRACKPOINT_NAME, true);
    let mut h = harness_with_store(system, SettingsStore::open(path.clone()));

    let mut edited = Settings::load_from(&path).unwrap();
    edited.enabled.trackpoint = false;
    edited.save_to(&path).unwrap();
    h.engine.handle(Event::SettingsFileChanged);

    assert_eq!(h.system.device_enabled(TRACKPOINT), Some(false));
    assert!(!h.engine.settings().enabled(DeviceType::Trackpoint));

    // Our own write-through shows up as a file change too; it is a no-op
    let before = h.engine.settings().notification_count();
    h.engine.handle(Event::SettingsFileChanged);
    assert_eq!(h.engine.settings().notification_count(), before);
}

fn wait_for<F>(rx: &mut mpsc::UnboundedReceiver<Event>, mut matches: F) -> bool
where
    F: FnMut(&Event) -> bool,
{
    let deadline = Instant::now() + Duration::from_secs(5);
    while Instant::now() < deadline {
        match rx.try_recv() {
            Ok(event) if matches(&event) => return true,
            Ok(_) => {}
            Err(_) => std::thread::sleep(Duration::from_millis(20)),
        }
    }
    false
}

#[test]
fn test_hotplug_monitor_posts_mouse_nodes_only() {
    let dir = tempfile::tempdir().unwrap();
    let (tx, mut rx) = mpsc::unbounded_channel();
    let mut monitor = HotplugMonitor::start(dir.path(), tx).unwrap();

    std::fs::write(dir.path().join("event9"), b"").unwrap();
    std::fs::write(dir.path().join("mouse4"), b"").unwrap();

    assert!(wait_for(&mut rx, |event| matches!(
        event,
        Event::Hotplug(HotplugEvent { path, kind: ChangeKind::Created }) if path.ends_with("mouse4")
    )));
    monitor.cancel();
}

#[test]
fn test_settings_watch_posts_file_changes() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("settings.toml");
    let (tx, mut rx) = mpsc::unbounded_channel();
    let mut watch = SettingsWatch::start(&path, tx).unwrap();

    Settings::default().save_to(&path).unwrap();
    assert!(wait_for(&mut rx, |event| *event == Event::SettingsFileChanged));
    watch.cancel();
}
