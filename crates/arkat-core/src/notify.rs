//! Short-lived, non-blocking user notifications

use tracing::warn;

/// Surface that shows failure messages to the user
pub trait Notifier: Send + Sync {
    fn notify(&self, message: &str);
}

/// Notifier that emits messages to the log under the `arkat::notify` target
#[derive(Debug, Clone, Copy, Default)]
pub struct LogNotifier;

impl Notifier for LogNotifier {
    fn notify(&self, message: &str) {
        warn!(target: "arkat::notify", "{}", message);
    }
}
