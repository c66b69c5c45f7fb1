// std
use std::{io, time::Duration as StdDuration};
// crates.io
use axum::{
	Router,
	body::{Body, to_bytes},
	http::{Request, StatusCode, header::CACHE_CONTROL},
	response::Response,
	routing::get,
};
use tower::ServiceExt;
// self
use oauth2_portal::{
	_preludet::*,
	presenter::ErrorPresenter,
	telemetry::{MemorySink, TelemetryDispatcher},
	web::{self, PortalError},
	wiring::Collaborator,
};

fn app(presenter: ErrorPresenter) -> Router {
	let routes = Router::new()
		.route("/", get(|| async { "home" }))
		.route(
			"/upload",
			get(|| async { Err::<&str, PortalError>(io::Error::other("disk full").into()) }),
		)
		.route("/panic", get(|| async { panic!("handler exploded");
			#[allow(unreachable_code)]
			()
		}))
		.route("/teapot", get(|| async { (StatusCode::IM_A_TEAPOT, "short and stout") }))
		.route("/gone", get(|| async { StatusCode::GONE }));

	web::router(open_state(presenter), routes)
}

fn reporting_presenter(sink: &Arc<MemorySink>) -> ErrorPresenter {
	ErrorPresenter::new(Collaborator::Configured(TelemetryDispatcher::new(sink.clone())))
}

async fn get_path(app: &Router, uri: &str) -> Response {
	app.clone()
		.oneshot(Request::builder().uri(uri).body(Body::empty()).expect("Request should build."))
		.await
		.expect("Router should be infallible.")
}

async fn body_text(response: Response) -> String {
	let bytes = to_bytes(response.into_body(), usize::MAX).await.expect("Body should be readable.");

	String::from_utf8(bytes.to_vec()).expect("Body should be UTF-8.")
}

#[tokio::test]
async fn unknown_paths_render_not_found_without_reporting() {
	let sink = Arc::new(MemorySink::default());
	let app = app(reporting_presenter(&sink));
	let response = get_path(&app, "/does-not-exist").await;

	assert_eq!(response.status(), StatusCode::NOT_FOUND);
	assert_eq!(response.headers().get(CACHE_CONTROL).map(|v| v.as_bytes()), Some(&b"no-store"[..]));

	let html = body_text(response).await;

	assert!(html.contains("404"));
	assert!(html.contains("Not Found"));
	assert!(!sink.wait_for(1, StdDuration::from_millis(50)).await);
}

#[tokio::test]
async fn handler_errors_render_their_description_and_are_reported_once() {
	let sink = Arc::new(MemorySink::default());
	let app = app(reporting_presenter(&sink));
	let response = get_path(&app, "/upload").await;

	assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
	assert!(body_text(response).await.contains("disk full"));
	assert!(sink.wait_for(1, StdDuration::from_secs(2)).await);
	// A second report would arrive shortly after the first.
	assert!(!sink.wait_for(2, StdDuration::from_millis(200)).await);

	let recorded = sink.recorded();

	assert_eq!(recorded.len(), 1);
	assert_eq!(recorded[0].description(), "disk full");
}

#[tokio::test]
async fn panics_become_reported_internal_errors() {
	let sink = Arc::new(MemorySink::default());
	let app = app(reporting_presenter(&sink));
	let response = get_path(&app, "/panic").await;

	assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
	assert!(body_text(response).await.contains("handler exploded"));
	assert!(sink.wait_for(1, StdDuration::from_secs(2)).await);
	assert_eq!(sink.recorded()[0].kind, "panic");
}

#[tokio::test]
async fn failing_sinks_leave_the_page_unchanged() {
	let sink = Arc::new(MemorySink::failing());
	let app = app(reporting_presenter(&sink));
	let response = get_path(&app, "/upload").await;

	assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
	assert!(body_text(response).await.contains("disk full"));
}

#[tokio::test]
async fn pages_render_without_any_sink() {
	let app = app(ErrorPresenter::default());
	let response = get_path(&app, "/upload").await;

	assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
	assert!(body_text(response).await.contains("disk full"));

	let response = get_path(&app, "/gone").await;

	assert_eq!(response.status(), StatusCode::GONE);
	assert!(body_text(response).await.contains("Gone"));
}

#[tokio::test]
async fn responses_with_a_body_pass_through() {
	let app = app(ErrorPresenter::default());
	let response = get_path(&app, "/teapot").await;

	assert_eq!(response.status(), StatusCode::IM_A_TEAPOT);
	assert_eq!(body_text(response).await, "short and stout");

	let response = get_path(&app, "/").await;

	assert_eq!(response.status(), StatusCode::OK);
	assert_eq!(body_text(response).await, "home");
}

#[tokio::test]
async fn direct_error_page_requests_use_the_status_query() {
	let app = app(ErrorPresenter::default());
	let response = get_path(&app, "/error?status=503").await;

	assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
	assert!(body_text(response).await.contains("Service Unavailable"));

	let response = get_path(&app, "/error").await;

	assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
	assert!(body_text(response).await.contains("Internal Server Error"));

	let response = get_path(&app, "/error?status=799").await;

	assert_eq!(response.status().as_u16(), 799);
	assert!(body_text(response).await.contains("Unknown Error"));

	let response = get_path(&app, "/error?status=soon").await;

	assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
}
