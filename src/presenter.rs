//! Error presentation: turns a failed request's status and cause into the `error` view model.

// crates.io
use axum::http::StatusCode;
// self
use crate::{
	_prelude::*,
	fault::ErrorContext,
	obs::{self, Component, PortalSpan},
	telemetry::{DispatchHandle, TelemetryDispatcher},
	wiring::Collaborator,
};

/// Name of the template the view model is rendered with.
pub const ERROR_VIEW: &str = "error";
/// Message used when a status has no standard reason phrase and no cause explains it.
pub const UNKNOWN_ERROR_MESSAGE: &str = "Unknown Error";

/// Model consumed by the `error` template.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ViewModel {
	/// Message displayed to the user.
	pub message: String,
	/// HTTP status of the failed request.
	pub status: u16,
}

/// Result of [`ErrorPresenter::present`]: the view plus the in-flight telemetry report, if any.
#[derive(Debug)]
pub struct Presentation {
	/// View model to render.
	pub view: ViewModel,
	/// Report started for the cause; `None` when there was no cause or no sink.
	pub report: Option<DispatchHandle>,
}

/// Builds error view models and forwards causes to the configured telemetry sink.
#[derive(Clone, Debug, Default)]
pub struct ErrorPresenter {
	telemetry: Collaborator<TelemetryDispatcher>,
}
impl ErrorPresenter {
	/// Creates a presenter; the telemetry collaborator is fixed for its lifetime.
	pub fn new(telemetry: Collaborator<TelemetryDispatcher>) -> Self {
		Self { telemetry }
	}

	/// Whether causes are reported anywhere.
	pub fn reports_exceptions(&self) -> bool {
		self.telemetry.is_configured()
	}

	/// Builds the view model for a failed request.
	pub fn handle(&self, ctx: ErrorContext) -> ViewModel {
		self.present(ctx).view
	}

	/// Builds the view model and exposes the telemetry report started for the cause.
	pub fn present(&self, ctx: ErrorContext) -> Presentation {
		let _guard = PortalSpan::new(Component::ErrorPage, "present").entered();
		let ErrorContext { status, cause } = ctx;
		let (message, report) = match cause {
			Some(cause) => {
				let message = cause.description().to_owned();
				let report = self.telemetry.configured().map(|dispatcher| dispatcher.dispatch(cause));

				(message, report)
			},
			None => (reason_phrase(status).to_owned(), None),
		};

		obs::record_error_page(status);

		Presentation { view: ViewModel { message, status }, report }
	}
}

/// Standard reason phrase for `status`, or [`UNKNOWN_ERROR_MESSAGE`] when none exists.
pub fn reason_phrase(status: u16) -> &'static str {
	match StatusCode::from_u16(status).ok().and_then(|code| code.canonical_reason()) {
		Some(phrase) => phrase,
		None => {
			tracing::warn!(status, "status code has no reason phrase, using the generic message");

			UNKNOWN_ERROR_MESSAGE
		},
	}
}
