//! User-facing side-effect contracts: ambient notifications and the login
//! redirect.
//!
//! Both collaborators are fire-and-forget from the gateway's point of view:
//! nothing is awaited and no return value is inspected. Hosts wire in whatever
//! rendering they have (a toast system, a TUI status line, a log sink).

// self
use crate::_prelude::*;

/// Severity attached to an ambient notification.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Severity {
	/// Neutral informational message.
	Info,
	/// Positive confirmation.
	Success,
	/// Something degraded but recoverable.
	Warning,
	/// Operation failed.
	Error,
}
impl Severity {
	/// Returns a stable label suitable for span or metric fields.
	pub const fn as_str(self) -> &'static str {
		match self {
			Self::Info => "info",
			Self::Success => "success",
			Self::Warning => "warning",
			Self::Error => "error",
		}
	}
}
impl Display for Severity {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(self.as_str())
	}
}

/// Fire-and-forget surface for user-visible messages.
pub trait Notifier
where
	Self: Send + Sync,
{
	/// Surfaces a message to the user; best-effort, never awaited.
	fn notify(&self, message: &str, severity: Severity);
}

/// Side-effecting redirect to the sign-in view.
pub trait Navigator
where
	Self: Send + Sync,
{
	/// Replaces the current view with the sign-in view.
	fn go_to_login(&self);
}

/// Notifier that discards every message.
#[derive(Clone, Copy, Debug, Default)]
pub struct NoopNotifier;
impl Notifier for NoopNotifier {
	fn notify(&self, _: &str, _: Severity) {}
}

/// Navigator that ignores redirects; useful for headless tooling.
#[derive(Clone, Copy, Debug, Default)]
pub struct NoopNavigator;
impl Navigator for NoopNavigator {
	fn go_to_login(&self) {}
}
