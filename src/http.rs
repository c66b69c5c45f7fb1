//! Outbound HTTP client shared by the token exchange, the user-info fetcher, and telemetry.

// std
use std::time::Duration as StdDuration;
// self
use crate::{_prelude::*, error::ConfigError};

/// Per-request timeout applied to every outbound call.
pub const DEFAULT_REQUEST_TIMEOUT: StdDuration = StdDuration::from_secs(10);

/// Builds the reqwest client used for provider and telemetry calls.
///
/// Redirects are never followed: token and user-info endpoints must answer directly, and a
/// redirect there is treated as a failed response instead of being chased to another host.
pub fn build_client() -> Result<ReqwestClient, ConfigError> {
	ReqwestClient::builder()
		.redirect(reqwest::redirect::Policy::none())
		.timeout(DEFAULT_REQUEST_TIMEOUT)
		.user_agent(concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION")))
		.build()
		.map_err(ConfigError::http_client_build)
}
