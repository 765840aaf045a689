//! Transient user-facing messages: logged, and shown as a desktop
//! notification (notify-rust over D-Bus) that dismisses itself.

use notify_rust::{Notification, Timeout};
use tracing::{debug, error, info, warn};

use crate::config::FeedbackConfig;

const APP_NAME: &str = "Gutenberg Reader";
const ICON: &str = "accessories-text-editor";

pub struct Notifier {
    enabled: bool,
    timeout_ms: u32,
}

impl Notifier {
    pub fn new(config: &FeedbackConfig) -> Self {
        Self {
            enabled: config.notifications,
            timeout_ms: config.timeout_ms,
        }
    }

    /// Informational message, e.g. a finished reading session.
    pub fn info(&self, message: &str) {
        info!("{message}");
        self.show(APP_NAME, message);
    }

    /// A recoverable failure the user should see.
    pub fn error(&self, message: &str) {
        error!("{message}");
        self.show(&format!("{APP_NAME}: error"), message);
    }

    fn show(&self, summary: &str, body: &str) {
        if !self.enabled {
            return;
        }

        debug!("Notification: {summary}");

        if let Err(e) = Notification::new()
            .appname(APP_NAME)
            .summary(summary)
            .body(body)
            .icon(ICON)
            .timeout(Timeout::Milliseconds(self.timeout_ms))
            .show()
        {
            warn!("Failed to show notification: {e}");
        }
    }
}
