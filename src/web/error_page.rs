//! The `/error` page, the middleware that routes failed responses to it, and handler errors.

// std
use std::any::Any;
// crates.io
use axum::{
	body::HttpBody,
	extract::{Query, Request, State},
	http::{
		HeaderName, HeaderValue, StatusCode, Uri,
		header::{ALLOW, CACHE_CONTROL, RETRY_AFTER, SET_COOKIE, WWW_AUTHENTICATE},
	},
	middleware::Next,
	response::{Html, IntoResponse, Response},
};
// self
use crate::{
	_prelude::*,
	fault::{ErrorContext, Fault},
	presenter::Presentation,
	view,
	web::PortalState,
};

/// Path of the error page.
pub const ERROR_PATH: &str = "/error";

static PRESERVED_HEADERS: [HeaderName; 4] = [ALLOW, RETRY_AFTER, SET_COOKIE, WWW_AUTHENTICATE];

/// Marks responses produced by the error page so they are never dispatched again.
#[derive(Clone, Copy, Debug)]
pub(crate) struct Rendered;

/// Handler error carrying the status to respond with and the fault behind it.
///
/// Any `std::error::Error` converts into a 500 with the error as the cause, so handlers can use
/// `?` and let the error page report the fault.
#[derive(Debug)]
pub struct PortalError {
	status: StatusCode,
	fault: Fault,
}
impl PortalError {
	/// Error with an explicit status and cause.
	pub fn new(status: StatusCode, fault: Fault) -> Self {
		Self { status, fault }
	}

	/// Overrides the response status.
	pub fn with_status(mut self, status: StatusCode) -> Self {
		self.status = status;

		self
	}

	/// Status the response will carry.
	pub fn status(&self) -> StatusCode {
		self.status
	}

	/// Cause reported to the error page.
	pub fn fault(&self) -> &Fault {
		&self.fault
	}
}
impl<E> From<E> for PortalError
where
	E: StdError,
{
	fn from(e: E) -> Self {
		Self { status: StatusCode::INTERNAL_SERVER_ERROR, fault: Fault::from_error(&e) }
	}
}
impl IntoResponse for PortalError {
	fn into_response(self) -> Response {
		let mut response = self.status.into_response();

		response.extensions_mut().insert(self.fault);

		response
	}
}

#[derive(Debug, Default, Deserialize)]
struct ErrorQuery {
	status: Option<u16>,
}

/// `GET /error`: renders the status from `?status=`, else 500.
///
/// Dispatched failures are rendered in place by [`dispatch`] and never reach this handler.
pub async fn error_page(State(state): State<PortalState>, uri: Uri) -> Response {
	let status = Query::<ErrorQuery>::try_from_uri(&uri)
		.ok()
		.and_then(|Query(query)| query.status)
		.unwrap_or(StatusCode::INTERNAL_SERVER_ERROR.as_u16());

	render(&state, ErrorContext::new(status))
}

/// Fallback for unmatched routes.
pub async fn not_found() -> StatusCode {
	StatusCode::NOT_FOUND
}

/// Renders failed responses through the error page.
///
/// A response is dispatched when it carries a [`Fault`] extension or is a 4xx/5xx without a
/// body. Responses produced by the error page itself pass through untouched.
pub async fn dispatch(State(state): State<PortalState>, request: Request, next: Next) -> Response {
	let response = next.run(request).await;

	if response.extensions().get::<Rendered>().is_some() {
		return response;
	}

	let status = response.status();
	let fault = response.extensions().get::<Fault>().cloned();
	let bodiless_failure = (status.is_client_error() || status.is_server_error())
		&& response.body().size_hint().exact() == Some(0);

	if fault.is_none() && !bodiless_failure {
		return response;
	}

	let mut rendered = render(&state, ErrorContext::new(status.as_u16()).with_cause(fault));

	for name in &PRESERVED_HEADERS {
		for value in response.headers().get_all(name) {
			rendered.headers_mut().append(name.clone(), value.clone());
		}
	}

	rendered
}

/// Converts a handler panic into a 500 whose cause is the panic payload.
pub(crate) fn panic_response(payload: Box<dyn Any + Send + 'static>) -> Response {
	let fault = Fault::from_panic(payload.as_ref());

	tracing::error!(cause = %fault, "request handler panicked");

	let mut response = StatusCode::INTERNAL_SERVER_ERROR.into_response();

	response.extensions_mut().insert(fault);

	response
}

pub(crate) fn render(state: &PortalState, ctx: ErrorContext) -> Response {
	// The telemetry report keeps running after the handle is dropped.
	let Presentation { view, report: _ } = state.presenter().present(ctx);
	let html = view::render_error_view(state.views(), &view);
	let status = StatusCode::from_u16(view.status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
	let mut response =
		(status, [(CACHE_CONTROL, HeaderValue::from_static("no-store"))], Html(html)).into_response();

	response.extensions_mut().insert(Rendered);

	response
}
