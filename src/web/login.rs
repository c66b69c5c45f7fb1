//! Login, callback, and logout routes installed while OIDC login is enabled.

// crates.io
use axum::{
	extract::{Path, Query, State},
	http::{
		HeaderMap, HeaderValue, StatusCode,
		header::{LOCATION, SET_COOKIE},
	},
	response::{IntoResponse, Response},
};
use cookie::Cookie;
// self
use crate::{
	_prelude::*,
	fault::Fault,
	oidc::{CallbackParams, LoginFlow},
	session::{Session, SessionStore},
	web::{PortalState, error_page::PortalError},
};

/// Query accepted by the login endpoint.
#[derive(Clone, Debug, Default, Deserialize)]
pub struct StartQuery {
	/// Local path to return to after the login.
	#[serde(rename = "continue")]
	pub return_to: Option<String>,
}

/// `GET /oauth2/authorization/{registration}`: redirects the browser to the provider.
pub async fn start(
	State(state): State<PortalState>,
	Path(registration): Path<String>,
	Query(query): Query<StartQuery>,
	headers: HeaderMap,
) -> Response {
	let Some(flow) = flow_for(&state, &registration) else {
		return StatusCode::NOT_FOUND.into_response();
	};
	let pending = flow.start(query.return_to.as_deref());
	let mut response = found(pending.authorize_url.as_str());
	let existing = SessionStore::session_id(&headers).filter(|id| {
		let pending = pending.clone();

		state.sessions().update(id, move |session| session.pending = Some(pending)).is_some()
	});

	if existing.is_none() {
		let mut session = Session::new(OffsetDateTime::now_utc());

		session.pending = Some(pending);

		let id = state.sessions().insert(session);

		set_cookie(&mut response, state.sessions().cookie(&id, flow.registration().secure_cookies()));
	}

	response
}

/// `GET /login/oauth2/code/{registration}`: completes the login and returns to the saved path.
pub async fn callback(
	State(state): State<PortalState>,
	Path(registration): Path<String>,
	Query(params): Query<CallbackParams>,
	headers: HeaderMap,
) -> Result<Response, PortalError> {
	let Some(flow) = flow_for(&state, &registration) else {
		return Ok(StatusCode::NOT_FOUND.into_response());
	};
	let session_id = SessionStore::session_id(&headers).ok_or_else(no_login_in_progress)?;
	let pending = state
		.sessions()
		.update(&session_id, |session| session.pending.take())
		.flatten()
		.ok_or_else(no_login_in_progress)?;
	let user = flow.complete(&pending, params).await.map_err(login_failure)?;

	state.sessions().update(&session_id, move |session| session.principal = Some(user));

	let mut response = found(&pending.return_to);

	if let Some(rotated) = state.sessions().rotate(&session_id) {
		set_cookie(&mut response, state.sessions().cookie(&rotated, flow.registration().secure_cookies()));
	}

	Ok(response)
}

/// `GET|POST /logout`: forgets the session and returns to `/`.
pub async fn logout(State(state): State<PortalState>, headers: HeaderMap) -> Response {
	if let Some(id) = SessionStore::session_id(&headers) {
		state.sessions().remove(&id);
	}

	let secure = state.chain().login().is_some_and(|flow| flow.registration().secure_cookies());
	let mut response = found("/");

	set_cookie(&mut response, SessionStore::removal_cookie(secure));

	response
}

fn flow_for<'a>(state: &'a PortalState, registration: &str) -> Option<&'a Arc<LoginFlow>> {
	state.chain().login().filter(|flow| &**flow.registration().id() == registration)
}

fn found(location: &str) -> Response {
	(StatusCode::FOUND, [(LOCATION, location.to_owned())]).into_response()
}

fn set_cookie(response: &mut Response, cookie: Cookie<'static>) {
	match HeaderValue::from_str(&cookie.to_string()) {
		Ok(value) => {
			response.headers_mut().append(SET_COOKIE, value);
		},
		Err(e) => tracing::error!(error = %e, "session cookie is not a valid header value"),
	}
}

fn no_login_in_progress() -> PortalError {
	PortalError::new(
		StatusCode::BAD_REQUEST,
		Fault::new("LoginError").with_description("No login is in progress for this browser."),
	)
}

fn login_failure(e: Error) -> PortalError {
	let status = match &e {
		Error::InvalidGrant { .. } | Error::Unauthenticated => StatusCode::UNAUTHORIZED,
		Error::InvalidUserInfo { .. } | Error::Transient(_) | Error::Transport(_) =>
			StatusCode::BAD_GATEWAY,
		Error::Config(_) | Error::SecurityChain(_) => StatusCode::INTERNAL_SERVER_ERROR,
	};

	PortalError::from(e).with_status(status)
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	#[test]
	fn login_failures_map_to_statuses() {
		assert_eq!(
			login_failure(Error::InvalidGrant { reason: "bad code".into() }).status(),
			StatusCode::UNAUTHORIZED
		);
		assert_eq!(
			login_failure(Error::InvalidUserInfo { reason: "no sub".into() }).status(),
			StatusCode::BAD_GATEWAY
		);
		assert_eq!(login_failure(Error::Unauthenticated).fault().description(), "Authentication is required.");
	}
}
