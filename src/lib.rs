//! pointer-switch - keeps touchpads, trackpoints and other pointing devices
//! switched the way the user wants them on X11/GNOME desktops.

pub mod autoswitch;
pub mod backend;
pub mod classify;
pub mod command;
pub mod daemon;
pub mod device;
pub mod engine;
pub mod error;
#[cfg(any(test, feature = "test-support"))]
pub mod fake;
pub mod hotplug;
pub mod logging;
pub mod notification;
pub mod platform;
pub mod report;
pub mod schedule;
pub mod settings;
pub mod watch;
