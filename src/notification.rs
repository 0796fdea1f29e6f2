//! User-facing collaborators: desktop notifications and the
//! "disable the last pointing device?" confirmation.
//!
//! The engine only sees the two traits. Production implementations talk to
//! the session bus (freedesktop Notifications) and to `zenity`.

use crate::device::DeviceType;
use crate::engine::Event;
use crate::settings::APP_NAME;
use std::collections::HashMap;
use std::process::Stdio;
use tokio::process::Command;
use tokio::sync::mpsc::UnboundedSender;
use tracing::{debug, info, warn};
use zbus::{proxy, Connection};

const ICON: &str = "input-touchpad";
const EXPIRE_TIMEOUT_MS: i32 = 3000;

/// Shows short informational banners
pub trait Notifier {
    fn notify(&self, summary: &str, body: &str);
}

/// Asks the user to confirm disabling a device type. The answer must come
/// back later as [`Event::Confirmation`].
pub trait ConfirmationPrompt {
    fn request(&self, device_type: DeviceType);
}

/// D-Bus interface for freedesktop Notifications.
#[proxy(
    interface = "org.freedesktop.Notifications",
    default_service = "org.freedesktop.Notifications",
    default_path = "/org/freedesktop/Notifications"
)]
trait Notifications {
    fn notify(
        &self,
        app_name: &str,
        replaces_id: u32,
        app_icon: &str,
        summary: &str,
        body: &str,
        actions: Vec<&str>,
        hints: HashMap<&str, zbus::zvariant::Value<'_>>,
        expire_timeout: i32,
    ) -> zbus::Result<u32>;
}

/// Send one notification over the session bus
pub async fn send_notification(summary: &str, body: &str) -> Result<u32, zbus::Error> {
    let connection = Connection::session().await?;
    let proxy = NotificationsProxy::new(&connection).await?;
    proxy
        .notify(
            APP_NAME,
            0,
            ICON,
            summary,
            body,
            vec![],
            HashMap::new(),
            EXPIRE_TIMEOUT_MS,
        )
        .await
}

/// Posts notifications from a background task on the daemon's runtime
pub struct DesktopNotifier {
    handle: tokio::runtime::Handle,
}

impl DesktopNotifier {
    pub fn new(handle: tokio::runtime::Handle) -> Self {
        Self { handle }
    }
}

impl Notifier for DesktopNotifier {
    fn notify(&self, summary: &str, body: &str) {
        let summary = summary.to_string();
        let body = body.to_string();
        self.handle.spawn(async move {
            match send_notification(&summary, &body).await {
                Ok(id) => debug!("Notification {} shown: {}", id, summary),
                Err(e) => warn!("Failed to send notification: {}", e),
            }
        });
    }
}

/// Notifier for non-interactive use (CLI one-shots)
pub struct LogNotifier;

impl Notifier for LogNotifier {
    fn notify(&self, summary: &str, body: &str) {
        info!("{}: {}", summary, body);
    }
}

/// Question text shown when the last pointing device is about to go
pub fn confirmation_text(device_type: DeviceType) -> String {
    format!(
        "No other pointing device is enabled. Disable the {} anyway?",
        device_type.label().to_lowercase()
    )
}

/// Runs `zenity --question` as a child of the daemon's runtime and reports
/// the answer
pub struct DialogPrompt {
    handle: tokio::runtime::Handle,
    tx: UnboundedSender<Event>,
    program: &'static str,
}

impl DialogPrompt {
    pub fn new(handle: tokio::runtime::Handle, tx: UnboundedSender<Event>) -> Self {
        Self {
            handle,
            tx,
            program: "zenity",
        }
    }
}

impl ConfirmationPrompt for DialogPrompt {
    fn request(&self, device_type: DeviceType) {
        let tx = self.tx.clone();
        let program = self.program;
        let text = confirmation_text(device_type);
        self.handle.spawn(async move {
            let accepted = match Command::new(program)
                .args(["--question", "--title", APP_NAME, "--text", text.as_str()])
                .stdin(Stdio::null())
                .stdout(Stdio::null())
                .stderr(Stdio::null())
                .status()
                .await
            {
                Ok(status) => status.success(),
                Err(e) => {
                    // No way to ask, so keep the device on
                    warn!("Failed to show confirmation dialog: {}", e);
                    false
                }
            };
            debug!("Confirmation for {}: {}", device_type, accepted);
            let _ = tx.send(Event::Confirmation {
                device_type,
                accepted,
            });
        });
    }
}

/// Prompt for non-interactive use: always declines
pub struct DecliningPrompt {
    tx: Option<UnboundedSender<Event>>,
}

impl DecliningPrompt {
    pub fn new(tx: Option<UnboundedSender<Event>>) -> Self {
        Self { tx }
    }
}

impl ConfirmationPrompt for DecliningPrompt {
    fn request(&self, device_type: DeviceType) {
        info!(
            "Refusing to disable {} without confirmation (no other pointing device enabled)",
            device_type
        );
        if let Some(tx) = &self.tx {
            let _ = tx.send(Event::Confirmation {
                device_type,
                accepted: false,
            });
        }
    }
}
