// self
use crate::{obs::LoginOutcome, policy::Decision, telemetry::DispatchOutcome};

/// Counts a rendered error page by status class.
pub fn record_error_page(status: u16) {
	#[cfg(feature = "metrics")]
	{
		metrics::counter!("oauth2_portal_error_page_total", "status_class" => status_class(status))
			.increment(1);
	}

	#[cfg(not(feature = "metrics"))]
	{
		let _ = status;
	}
}

/// Counts a settled telemetry dispatch by outcome.
pub fn record_telemetry_dispatch(outcome: DispatchOutcome) {
	#[cfg(feature = "metrics")]
	{
		metrics::counter!("oauth2_portal_telemetry_dispatch_total", "outcome" => outcome.as_str())
			.increment(1);
	}

	#[cfg(not(feature = "metrics"))]
	{
		let _ = outcome;
	}
}

/// Counts an authorization decision.
pub fn record_authorization(decision: Decision) {
	#[cfg(feature = "metrics")]
	{
		metrics::counter!("oauth2_portal_authorization_total", "decision" => decision.as_str())
			.increment(1);
	}

	#[cfg(not(feature = "metrics"))]
	{
		let _ = decision;
	}
}

/// Counts a login step.
pub fn record_login(outcome: LoginOutcome) {
	#[cfg(feature = "metrics")]
	{
		metrics::counter!("oauth2_portal_login_total", "outcome" => outcome.as_str()).increment(1);
	}

	#[cfg(not(feature = "metrics"))]
	{
		let _ = outcome;
	}
}

/// Buckets a status code into `1xx`..`5xx`, or `other` for codes outside the standard range.
pub fn status_class(status: u16) -> &'static str {
	match status {
		100..=199 => "1xx",
		200..=299 => "2xx",
		300..=399 => "3xx",
		400..=499 => "4xx",
		500..=599 => "5xx",
		_ => "other",
	}
}
