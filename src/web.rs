//! axum integration: shared state, the portal router, and `serve`.
//!
//! [`router`] wraps application routes with, from the inside out:
//!
//! 1. panic capture, turning a panicking handler into a 500 whose cause is the panic payload;
//! 2. the authorization guard enforcing the installed policy;
//! 3. error dispatch, rendering failed responses through the error page;
//! 4. request tracing.

pub mod error_page;
pub mod guard;
pub mod login;
pub mod user;

pub use error_page::{ERROR_PATH, PortalError};
pub use guard::CurrentUser;

// std
use std::time::Duration as StdDuration;
// crates.io
use axum::{Router, middleware, routing::get};
use tokio::net::TcpListener;
use tower_http::{catch_panic::CatchPanicLayer, trace::TraceLayer};
// self
use crate::{
	_prelude::*,
	config::PortalConfig,
	error::TransportError,
	http,
	oidc::{OidcUserFetcher, UserInfoFetcher},
	policy::{SecurityChain, USER_PATH},
	presenter::ErrorPresenter,
	provider::{CALLBACK_PATH_PREFIX, LOGIN_PATH_PREFIX},
	session::SessionStore,
	view::{MiniJinjaEngine, TemplateEngine},
	wiring::Collaborator,
};

const LOGOUT_PATH: &str = "/logout";
const SESSION_PURGE_INTERVAL: StdDuration = StdDuration::from_secs(60);

/// State shared by every portal handler and middleware.
#[derive(Clone)]
pub struct PortalState {
	presenter: Arc<ErrorPresenter>,
	views: Arc<dyn TemplateEngine>,
	chain: Arc<SecurityChain>,
	sessions: SessionStore,
}
impl PortalState {
	/// Assembles state from already-resolved collaborators.
	pub fn new(presenter: ErrorPresenter, views: Arc<dyn TemplateEngine>, chain: SecurityChain) -> Self {
		Self {
			presenter: Arc::new(presenter),
			views,
			chain: Arc::new(chain),
			sessions: SessionStore::default(),
		}
	}

	/// Replaces the session store.
	pub fn with_sessions(mut self, sessions: SessionStore) -> Self {
		self.sessions = sessions;

		self
	}

	/// Resolves every collaborator from configuration.
	///
	/// Fails when the configuration is invalid or the security chain cannot be assembled; the
	/// portal must not start in either case.
	pub fn from_config(config: &PortalConfig) -> Result<Self> {
		let http = http::build_client()?;
		let telemetry = config.telemetry_dispatcher(http.clone())?;
		let registration = config.client_registration()?;
		let fetcher = Collaborator::from(registration.as_ref().map(|registration| {
			Arc::new(UserInfoFetcher::for_provider(http.clone(), &registration.descriptor))
				as Arc<dyn OidcUserFetcher>
		}));
		let chain = SecurityChain::select(fetcher, registration, http)?;

		if !telemetry.is_configured() {
			tracing::info!("no telemetry sink configured, exceptions are not reported");
		}

		Ok(Self::new(ErrorPresenter::new(telemetry), Arc::new(MiniJinjaEngine::new()), chain))
	}

	/// Error presenter.
	pub fn presenter(&self) -> &ErrorPresenter {
		&self.presenter
	}

	/// Template engine used by the error page.
	pub fn views(&self) -> &dyn TemplateEngine {
		self.views.as_ref()
	}

	/// Installed security chain.
	pub fn chain(&self) -> &SecurityChain {
		&self.chain
	}

	/// Session store.
	pub fn sessions(&self) -> &SessionStore {
		&self.sessions
	}
}
impl Debug for PortalState {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("PortalState")
			.field("presenter", &self.presenter)
			.field("chain", &self.chain)
			.field("sessions", &self.sessions)
			.finish()
	}
}

/// Wraps application `routes` with the portal routes and middleware.
///
/// `routes` must not define `/error`, `/user`, or the login paths themselves.
pub fn router(state: PortalState, routes: Router) -> Router {
	let mut portal = Router::new()
		.route(ERROR_PATH, get(error_page::error_page))
		.route(USER_PATH, get(user::current_user));

	if state.chain().login().is_some() {
		portal = portal
			.route(&format!("{LOGIN_PATH_PREFIX}/{{registration}}"), get(login::start))
			.route(&format!("{CALLBACK_PATH_PREFIX}/{{registration}}"), get(login::callback))
			.route(LOGOUT_PATH, get(login::logout).post(login::logout));
	}

	routes
		.merge(portal.with_state(state.clone()))
		.fallback(error_page::not_found)
		.layer(CatchPanicLayer::custom(error_page::panic_response))
		.layer(middleware::from_fn_with_state(state.clone(), guard::authorize))
		.layer(middleware::from_fn_with_state(state, error_page::dispatch))
		.layer(TraceLayer::new_for_http())
}

/// Resolves collaborators from `config`, binds the listener, and serves until the process exits.
pub async fn serve(config: PortalConfig, routes: Router) -> Result<()> {
	let state = PortalState::from_config(&config)?;
	let sessions = state.sessions().clone();
	let app = router(state, routes);
	let listener = TcpListener::bind(config.bind).await.map_err(TransportError::from)?;

	tokio::spawn(async move {
		let mut ticker = tokio::time::interval(SESSION_PURGE_INTERVAL);

		loop {
			ticker.tick().await;

			let purged = sessions.purge_expired();

			if purged > 0 {
				tracing::debug!(purged, "expired sessions purged");
			}
		}
	});
	tracing::info!(addr = %config.bind, "portal listening");

	axum::serve(listener, app).await.map_err(TransportError::from)?;

	Ok(())
}
