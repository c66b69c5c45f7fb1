//! The OIDC login round-trip: redirect to the provider, then exchange the code and load the user.

// crates.io
use serde_json::Value;
// self
use crate::{
	_prelude::*,
	error::ConfigError,
	oauth::CodeExchange,
	obs::{self, Component, LoginOutcome, PortalSpan},
	oidc::{AuthorizationRequest, OidcUser, OidcUserFetcher, OidcUserRequest, id_token_claims},
	provider::ClientRegistration,
};

/// Query parameters the provider appends to the redirect URI.
#[derive(Clone, Debug, Default, Deserialize)]
pub struct CallbackParams {
	/// Authorization code on success.
	pub code: Option<String>,
	/// State echoed back by the provider.
	pub state: Option<String>,
	/// OAuth error code on failure.
	pub error: Option<String>,
	/// Human-readable error on failure.
	pub error_description: Option<String>,
}

/// Login flow for one client registration.
pub struct LoginFlow {
	registration: ClientRegistration,
	exchange: CodeExchange,
	fetcher: Arc<dyn OidcUserFetcher>,
}
impl LoginFlow {
	/// Wires the flow; fails when the registration cannot produce an OAuth client.
	pub fn new(
		registration: ClientRegistration,
		fetcher: Arc<dyn OidcUserFetcher>,
		http: ReqwestClient,
	) -> Result<Self, ConfigError> {
		let exchange = CodeExchange::from_registration(&registration, http)?;

		Ok(Self { registration, exchange, fetcher })
	}

	/// Registration the flow logs users in with.
	pub fn registration(&self) -> &ClientRegistration {
		&self.registration
	}

	/// Starts a login that returns to `return_to` (a local path) once it completes.
	pub fn start(&self, return_to: Option<&str>) -> AuthorizationRequest {
		let _guard = PortalSpan::new(Component::Login, "start").entered();
		let request = AuthorizationRequest::new(&self.registration, return_to.unwrap_or("/"));

		obs::record_login(LoginOutcome::Started);
		tracing::debug!(registration = %self.registration.id(), "login started");

		request
	}

	/// Completes the login started by `pending` with the provider's callback parameters.
	pub async fn complete(&self, pending: &AuthorizationRequest, callback: CallbackParams) -> Result<OidcUser> {
		let span = PortalSpan::new(Component::Login, "complete");
		let outcome = span.instrument(self.complete_inner(pending, callback)).await;

		match &outcome {
			Ok(user) => {
				obs::record_login(LoginOutcome::Succeeded);
				tracing::info!(registration = %self.registration.id(), subject = %user.subject, "login completed");
			},
			Err(e) => {
				obs::record_login(LoginOutcome::Failed);
				tracing::warn!(registration = %self.registration.id(), error = %e, "login failed");
			},
		}

		outcome
	}

	async fn complete_inner(&self, pending: &AuthorizationRequest, callback: CallbackParams) -> Result<OidcUser> {
		let CallbackParams { code, state, error, error_description } = callback;

		if let Some(error) = error {
			let reason = match error_description {
				Some(description) => format!("{error}: {description}"),
				None => error,
			};

			return Err(Error::InvalidGrant { reason });
		}

		pending.validate_state(state.as_deref().unwrap_or_default())?;

		if pending.is_expired(OffsetDateTime::now_utc()) {
			return Err(Error::InvalidGrant { reason: "login request expired".into() });
		}

		let code = code
			.filter(|code| !code.is_empty())
			.ok_or_else(|| Error::InvalidGrant { reason: "authorization code is missing".into() })?;
		let grant = self.exchange.exchange(&code, pending.pkce_verifier()).await?;

		if let Some(id_token) = &grant.id_token {
			verify_nonce(id_token.expose(), &pending.nonce)?;
		}

		let request = OidcUserRequest {
			registration: self.registration.id().clone(),
			access_token: grant.access_token,
			id_token: grant.id_token,
			nonce: pending.nonce.clone(),
			scope: grant.scope,
		};

		self.fetcher.load_user(&request).await
	}
}
impl Debug for LoginFlow {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("LoginFlow").field("registration", &self.registration).finish()
	}
}

/// Checks that an ID token answers this login: its `nonce` must equal the one sent.
fn verify_nonce(id_token: &str, expected: &str) -> Result<()> {
	let claims = id_token_claims(id_token)
		.ok_or_else(|| Error::InvalidGrant { reason: "ID token payload is unreadable".into() })?;

	match claims.get("nonce").and_then(Value::as_str) {
		Some(nonce) if nonce == expected => Ok(()),
		Some(_) => Err(Error::InvalidGrant { reason: "ID token nonce does not match the login".into() }),
		None => Err(Error::InvalidGrant { reason: "ID token carries no nonce".into() }),
	}
}

#[cfg(test)]
mod tests {
	// self
	use super::*;
	// crates.io
	use base64::{Engine as _, engine::general_purpose::URL_SAFE_NO_PAD};
	// self
	use crate::{
		auth::RegistrationId,
		oidc::UserFuture,
		provider::ProviderDescriptor,
	};

	fn id_token(payload: &str) -> String {
		format!("eyJhbGciOiJub25lIn0.{}.sig", URL_SAFE_NO_PAD.encode(payload))
	}

	struct UnreachableFetcher;
	impl OidcUserFetcher for UnreachableFetcher {
		fn load_user<'a>(&'a self, _request: &'a OidcUserRequest) -> UserFuture<'a> {
			Box::pin(async { Err(Error::Unauthenticated) })
		}
	}

	fn flow() -> LoginFlow {
		let url = |value: &str| Url::parse(value).expect("URL fixture should parse.");
		let descriptor = ProviderDescriptor::builder(
			RegistrationId::new("oidc").expect("Registration fixture should be valid."),
		)
		.authorization_endpoint(url("https://idp.example.com/authorize"))
		.token_endpoint(url("https://idp.example.com/token"))
		.userinfo_endpoint(url("https://idp.example.com/userinfo"))
		.build()
		.expect("Descriptor fixture should build.");
		let registration =
			ClientRegistration::new(descriptor, "portal", url("https://portal.example.com/login/oauth2/code/oidc"))
				.expect("Registration fixture should build.");

		LoginFlow::new(registration, Arc::new(UnreachableFetcher), ReqwestClient::new())
			.expect("Login flow should build.")
	}

	#[test]
	fn start_sanitizes_the_return_target() {
		let flow = flow();

		assert_eq!(flow.start(Some("/user")).return_to, "/user");
		assert_eq!(flow.start(Some("https://evil.example.com")).return_to, "/");
		assert_eq!(flow.start(None).return_to, "/");
	}

	#[tokio::test]
	async fn provider_errors_fail_before_any_exchange() {
		let flow = flow();
		let pending = flow.start(None);
		let err = flow
			.complete(&pending, CallbackParams {
				error: Some("access_denied".into()),
				error_description: Some("user cancelled".into()),
				state: Some(pending.state.clone()),
				..Default::default()
			})
			.await
			.expect_err("Provider errors must fail the login.");

		assert!(matches!(err, Error::InvalidGrant { reason } if reason == "access_denied: user cancelled"));
	}

	#[tokio::test]
	async fn mismatched_or_missing_state_is_rejected() {
		let flow = flow();
		let pending = flow.start(None);

		for state in [None, Some("forged".to_owned())] {
			let err = flow
				.complete(&pending, CallbackParams { code: Some("code".into()), state, ..Default::default() })
				.await
				.expect_err("State mismatches must fail the login.");

			assert!(matches!(err, Error::InvalidGrant { .. }));
		}
	}

	#[tokio::test]
	async fn missing_codes_are_rejected() {
		let flow = flow();
		let pending = flow.start(None);
		let err = flow
			.complete(&pending, CallbackParams { state: Some(pending.state.clone()), ..Default::default() })
			.await
			.expect_err("A callback without a code must fail.");

		assert!(matches!(err, Error::InvalidGrant { reason } if reason.contains("code")));
	}

	#[test]
	fn id_tokens_must_echo_the_login_nonce() {
		assert!(verify_nonce(&id_token(r#"{"sub":"u","nonce":"n-1"}"#), "n-1").is_ok());

		for token in [
			id_token(r#"{"sub":"u","nonce":"attacker"}"#),
			id_token(r#"{"sub":"u"}"#),
			"opaque".to_owned(),
		] {
			assert!(matches!(verify_nonce(&token, "n-1"), Err(Error::InvalidGrant { .. })));
		}
	}
}
