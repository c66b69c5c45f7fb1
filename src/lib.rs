//! Error pages with exception telemetry and OIDC-gated authorization policies for axum portals.
//!
//! The crate has two halves that meet only in [`web::router`]:
//!
//! - [`presenter::ErrorPresenter`] turns a failed request into the `error` view and forwards the
//!   cause to an optional [`telemetry::TelemetrySink`] without waiting for it.
//! - [`policy::SecurityChain`] picks one of two authorization policies at startup, depending on
//!   whether an [`oidc::OidcUserFetcher`] is configured, and installs the OIDC login flow with it.

#![deny(clippy::all)]
#![warn(missing_docs, unused_crate_dependencies)]

pub mod auth;
pub mod config;
pub mod error;
pub mod fault;
pub mod http;
pub mod oauth;
pub mod obs;
pub mod oidc;
pub mod policy;
pub mod presenter;
pub mod provider;
pub mod session;
pub mod telemetry;
pub mod view;
pub mod web;
pub mod wiring;

#[doc(hidden)]
pub mod _preludet {
	//! Re-exports and fixtures shared by the integration tests.

	pub use crate::_prelude::*;

	// self
	use crate::{
		auth::RegistrationId,
		oidc::{OidcUserFetcher, UserInfoFetcher},
		policy::SecurityChain,
		presenter::ErrorPresenter,
		provider::{ClientRegistration, ProviderDescriptor},
		view::MiniJinjaEngine,
		web::PortalState,
		wiring::Collaborator,
	};

	/// Registration `oidc` whose provider endpoints live under `base` (e.g. an `httpmock` server).
	pub fn test_registration(base: &str, client_secret: Option<&str>) -> ClientRegistration {
		let url = |path: &str| Url::parse(&format!("{base}{path}")).expect("Provider URL fixture should parse.");
		let descriptor = ProviderDescriptor::builder(
			RegistrationId::new(RegistrationId::DEFAULT).expect("Default registration id should be valid."),
		)
		.authorization_endpoint(url("/authorize"))
		.token_endpoint(url("/token"))
		.userinfo_endpoint(url("/userinfo"))
		.build()
		.expect("Provider descriptor fixture should build.");
		let registration = ClientRegistration::new(
			descriptor,
			"portal-it",
			Url::parse("http://localhost:8080/login/oauth2/code/oidc").expect("Redirect fixture should parse."),
		)
		.expect("Client registration fixture should build.");

		match client_secret {
			Some(secret) => registration.with_client_secret(secret),
			None => registration,
		}
	}

	/// Portal state without a login flow.
	pub fn open_state(presenter: ErrorPresenter) -> PortalState {
		let chain = SecurityChain::select(Collaborator::Absent, None, ReqwestClient::new())
			.expect("Open security chain should assemble.");

		PortalState::new(presenter, Arc::new(MiniJinjaEngine::new()), chain)
	}

	/// Portal state with OIDC login against `registration`, using the real user-info fetcher.
	pub fn oidc_state(presenter: ErrorPresenter, registration: ClientRegistration) -> PortalState {
		let http = crate::http::build_client().expect("HTTP client should build.");
		let fetcher: Arc<dyn OidcUserFetcher> =
			Arc::new(UserInfoFetcher::for_provider(http.clone(), &registration.descriptor));
		let chain = SecurityChain::select(Collaborator::Configured(fetcher), Some(registration), http)
			.expect("OIDC security chain should assemble.");

		PortalState::new(presenter, Arc::new(MiniJinjaEngine::new()), chain)
	}
}

mod _prelude {
	pub use std::{
		collections::HashMap,
		error::Error as StdError,
		fmt::{Debug, Display, Formatter, Result as FmtResult},
		future::Future,
		pin::Pin,
		str::FromStr,
		sync::Arc,
	};

	pub use parking_lot::{Mutex, RwLock};
	pub use reqwest::{Client as ReqwestClient, Error as ReqwestError};
	pub use serde::{Deserialize, Serialize};
	pub use thiserror::Error as ThisError;
	pub use time::{Duration, OffsetDateTime};
	pub use url::Url;

	pub use crate::error::{Error, Result};
}

pub use axum;
pub use reqwest;
pub use url;
#[cfg(test)] use {color_eyre as _, httpmock as _, tower as _, tracing_subscriber as _};
