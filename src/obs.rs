//! Observability helpers shared by the error page, telemetry dispatch, and the security chain.
//!
//! # Feature Flags
//!
//! - Spans are always emitted through `tracing`, named `oauth2_portal.request` with the
//!   `component` and `stage` fields.
//! - Enable `metrics` to increment the `oauth2_portal_*_total` counters, labeled by outcome.

mod metrics;
mod tracing;

pub use self::{metrics::*, tracing::*};

// self
use crate::_prelude::*;

/// Portal components observed by spans and counters.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Component {
	/// Error page rendering.
	ErrorPage,
	/// Fire-and-forget exception reporting.
	Telemetry,
	/// Request authorization against the installed policy.
	Authorization,
	/// OIDC login round-trip.
	Login,
}
impl Component {
	/// Returns a stable label suitable for span or metric fields.
	pub const fn as_str(self) -> &'static str {
		match self {
			Component::ErrorPage => "error_page",
			Component::Telemetry => "telemetry",
			Component::Authorization => "authorization",
			Component::Login => "login",
		}
	}
}
impl Display for Component {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(self.as_str())
	}
}

/// Outcome labels recorded for each login attempt.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum LoginOutcome {
	/// The browser was sent to the provider.
	Started,
	/// The principal was resolved and stored in the session.
	Succeeded,
	/// The callback could not be completed.
	Failed,
}
impl LoginOutcome {
	/// Returns a stable label suitable for span or metric fields.
	pub const fn as_str(self) -> &'static str {
		match self {
			LoginOutcome::Started => "started",
			LoginOutcome::Succeeded => "succeeded",
			LoginOutcome::Failed => "failed",
		}
	}
}
impl Display for LoginOutcome {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(self.as_str())
	}
}
