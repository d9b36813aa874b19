//! Operator alerts
//!
//! The engine only ever hands a sink a message string and moves on; whether
//! the alert was seen is not its concern.

use tokio::process::Command;
use tracing::{debug, warn};

/// Fire-and-forget delivery of one alert.
pub trait NotificationSink: Send + Sync {
    fn notify(&self, message: &str);
}

/// Alerts through whatever the desktop offers.
///
/// macOS speaks the message with `say`, Linux posts it with `notify-send`,
/// anything else rings the terminal bell.
#[derive(Debug, Default, Clone, Copy)]
pub struct DesktopNotifier;

impl DesktopNotifier {
    fn command(message: &str) -> Option<Command> {
        if cfg!(target_os = "macos") {
            let mut cmd = Command::new("say");
            cmd.arg(message);
            Some(cmd)
        } else if cfg!(target_os = "linux") {
            let mut cmd = Command::new("notify-send");
            cmd.arg("Forms Watcher").arg(message);
            Some(cmd)
        } else {
            None
        }
    }
}

impl NotificationSink for DesktopNotifier {
    fn notify(&self, message: &str) {
        let Some(mut cmd) = Self::command(message) else {
            println!("\x07  *** {message} ***");
            return;
        };

        // The child keeps running after the handle is dropped
        match cmd.spawn() {
            Ok(_child) => debug!(message, "notification sent"),
            Err(e) => {
                warn!(error = %e, "notifier unavailable, falling back to terminal bell");
                println!("\x07  *** {message} ***");
            }
        }
    }
}
