//! Middleware enforcing the installed authorization policy.

// crates.io
use axum::{
	extract::{Request, State},
	http::{
		HeaderMap, StatusCode,
		header::{ACCEPT, LOCATION},
	},
	middleware::Next,
	response::{IntoResponse, Response},
};
use url::form_urlencoded;
// self
use crate::{
	_prelude::*,
	obs::{self, Component, PortalSpan},
	oidc::OidcUser,
	policy::Decision,
	session::SessionStore,
	web::PortalState,
};

/// Principal of the current request, inserted for every permitted request.
#[derive(Clone, Debug, Default)]
pub struct CurrentUser(pub Option<OidcUser>);

/// Evaluates the request path against the policy.
///
/// Permitted requests continue with a [`CurrentUser`] extension. Challenged browser requests
/// are redirected to the login endpoint; challenged API requests get a bare 401 and denied
/// requests a bare 403, both rendered by the error page further out.
pub async fn authorize(State(state): State<PortalState>, mut request: Request, next: Next) -> Response {
	let (decision, user) = {
		let _guard = PortalSpan::new(Component::Authorization, "evaluate").entered();
		let user = SessionStore::session_id(request.headers())
			.and_then(|id| state.sessions().get(&id))
			.and_then(|session| session.principal);
		let decision = state.chain().policy().evaluate(request.uri().path(), user.is_some());

		obs::record_authorization(decision);
		tracing::debug!(path = request.uri().path(), decision = decision.as_str(), "request authorized");

		(decision, user)
	};

	match decision {
		Decision::Permit => {
			request.extensions_mut().insert(CurrentUser(user));

			next.run(request).await
		},
		Decision::Challenge => challenge(&state, &request),
		Decision::Deny => StatusCode::FORBIDDEN.into_response(),
	}
}

fn challenge(state: &PortalState, request: &Request) -> Response {
	let Some(flow) = state.chain().login() else {
		return StatusCode::UNAUTHORIZED.into_response();
	};

	if wants_json(request.headers()) {
		return StatusCode::UNAUTHORIZED.into_response();
	}

	let target = request.uri().path_and_query().map(|value| value.as_str()).unwrap_or("/");
	let location = format!(
		"{}?continue={}",
		flow.registration().login_path(),
		form_urlencoded::byte_serialize(target.as_bytes()).collect::<String>()
	);

	(StatusCode::FOUND, [(LOCATION, location)]).into_response()
}

fn wants_json(headers: &HeaderMap) -> bool {
	headers
		.get_all(ACCEPT)
		.iter()
		.filter_map(|value| value.to_str().ok())
		.flat_map(|value| value.split(','))
		.any(|media| media.trim().starts_with("application/json"))
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	#[test]
	fn json_clients_are_detected_from_accept() {
		let mut headers = HeaderMap::new();

		assert!(!wants_json(&headers));

		headers.insert(ACCEPT, "text/html, application/json;q=0.9".parse().expect("Header should parse."));

		assert!(wants_json(&headers));
	}
}
