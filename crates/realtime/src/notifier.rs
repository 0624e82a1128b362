//! User-facing notice surface.

/// Severity of a user-facing notice.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoticeLevel {
    Info,
    Error,
}

/// Fire-and-forget sink for messages shown to the user (toasts, banners).
pub trait Notifier: Send + Sync {
    fn notify(&self, level: NoticeLevel, message: &str);
}

/// Notifier that writes notices to the tracing log. Used by the CLI
/// binary, which has no UI surface.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingNotifier;

impl Notifier for TracingNotifier {
    fn notify(&self, level: NoticeLevel, message: &str) {
        match level {
            NoticeLevel::Info => tracing::info!(notice = %message, "User notice"),
            NoticeLevel::Error => tracing::error!(notice = %message, "User notice"),
        }
    }
}
