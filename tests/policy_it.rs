// crates.io
use axum::{
	Router,
	body::{Body, to_bytes},
	http::{
		Request, StatusCode,
		header::{ACCEPT, LOCATION},
	},
	response::Response,
	routing::get,
};
use tower::ServiceExt;
// self
use oauth2_portal::{
	_preludet::*,
	policy::{AuthorizationPolicy, Decision, USER_PATH},
	presenter::ErrorPresenter,
	web,
};

fn routes() -> Router {
	Router::new()
		.route("/", get(|| async { "home" }))
		.route("/reports/monthly", get(|| async { "report" }))
}

async fn send(app: &Router, request: Request<Body>) -> Response {
	app.clone().oneshot(request).await.expect("Router should be infallible.")
}

fn get_request(uri: &str) -> Request<Body> {
	Request::builder().uri(uri).body(Body::empty()).expect("Request should build.")
}

async fn body_text(response: Response) -> String {
	let bytes = to_bytes(response.into_body(), usize::MAX).await.expect("Body should be readable.");

	String::from_utf8(bytes.to_vec()).expect("Body should be UTF-8.")
}

#[tokio::test]
async fn open_policy_permits_the_user_path_anonymously() {
	let state = open_state(ErrorPresenter::default());

	assert_eq!(state.chain().policy(), &AuthorizationPolicy::open());

	let app = web::router(state, routes());
	let response = send(&app, get_request(USER_PATH)).await;

	assert_eq!(response.status(), StatusCode::OK);

	let json: serde_json::Value =
		serde_json::from_str(&body_text(response).await).expect("Body should be JSON.");

	assert_eq!(json, serde_json::json!({ "authenticated": false }));

	for path in ["/", "/reports/monthly"] {
		assert_eq!(send(&app, get_request(path)).await.status(), StatusCode::OK);
	}
}

#[tokio::test]
async fn open_policy_installs_no_login_routes() {
	let app = web::router(open_state(ErrorPresenter::default()), routes());

	for path in ["/oauth2/authorization/oidc", "/login/oauth2/code/oidc", "/logout"] {
		assert_eq!(send(&app, get_request(path)).await.status(), StatusCode::NOT_FOUND);
	}
}

#[tokio::test]
async fn oidc_policy_redirects_browsers_to_the_login_endpoint() {
	let state = oidc_state(ErrorPresenter::default(), test_registration("https://idp.example.com", None));

	assert_eq!(state.chain().policy().evaluate(USER_PATH, false), Decision::Challenge);

	let app = web::router(state, routes());
	let response = send(&app, get_request("/user?tab=claims")).await;

	assert_eq!(response.status(), StatusCode::FOUND);
	assert_eq!(
		response.headers().get(LOCATION).and_then(|value| value.to_str().ok()),
		Some("/oauth2/authorization/oidc?continue=%2Fuser%3Ftab%3Dclaims")
	);
}

#[tokio::test]
async fn oidc_policy_answers_api_clients_with_a_rendered_401() {
	let app = web::router(
		oidc_state(ErrorPresenter::default(), test_registration("https://idp.example.com", None)),
		routes(),
	);
	let request = Request::builder()
		.uri(USER_PATH)
		.header(ACCEPT, "application/json")
		.body(Body::empty())
		.expect("Request should build.");
	let response = send(&app, request).await;

	assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
	assert!(body_text(response).await.contains("Unauthorized"));
}

#[tokio::test]
async fn oidc_policy_keeps_every_other_path_open() {
	let app = web::router(
		oidc_state(ErrorPresenter::default(), test_registration("https://idp.example.com", None)),
		routes(),
	);

	for path in ["/", "/reports/monthly", "/user/settings", "/error?status=404"] {
		let status = send(&app, get_request(path)).await.status();

		assert_ne!(status, StatusCode::FOUND, "{path} must not be challenged");
		assert_ne!(status, StatusCode::UNAUTHORIZED, "{path} must not be challenged");
	}

	// Dot segments cannot sneak past the `/user` rule.
	assert_eq!(send(&app, get_request("/reports/../user")).await.status(), StatusCode::FOUND);
}
