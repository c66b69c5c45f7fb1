//! Authorization Code + PKCE request state kept in the browser session between the redirect to
//! the provider and the callback.

// crates.io
use base64::{Engine as _, engine::general_purpose::URL_SAFE_NO_PAD};
use rand::{Rng, distr::Alphanumeric};
use sha2::{Digest, Sha256};
// self
use crate::{_prelude::*, provider::ClientRegistration};

const STATE_LEN: usize = 32;
const NONCE_LEN: usize = 32;
const PKCE_VERIFIER_LEN: usize = 64;

/// Supported PKCE challenge methods.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PkceCodeChallengeMethod {
	/// SHA-256 based PKCE (RFC 7636 S256).
	S256,
}
impl PkceCodeChallengeMethod {
	/// Returns the RFC 7636 identifier for the challenge method.
	pub fn as_str(self) -> &'static str {
		match self {
			PkceCodeChallengeMethod::S256 => "S256",
		}
	}
}

/// A login that has been started but not yet completed.
#[derive(Clone)]
pub struct AuthorizationRequest {
	/// Opaque value that must round-trip through the provider.
	pub state: String,
	/// OIDC nonce bound to the ID token.
	pub nonce: String,
	/// Provider URL the browser is redirected to.
	pub authorize_url: Url,
	/// Local path to return to once the login completes.
	pub return_to: String,
	/// When the login was started.
	pub created_at: OffsetDateTime,
	pkce: PkcePair,
}
impl AuthorizationRequest {
	/// Longest time a started login may wait for its callback.
	pub const MAX_AGE: Duration = Duration::minutes(10);

	/// Starts a login for `registration` that returns to `return_to` afterwards.
	pub fn new(registration: &ClientRegistration, return_to: &str) -> Self {
		let state = random_string(STATE_LEN);
		let nonce = random_string(NONCE_LEN);
		let pkce = PkcePair::generate();
		let authorize_url = build_authorize_url(registration, &state, &nonce, &pkce);

		Self {
			state,
			nonce,
			authorize_url,
			return_to: sanitize_return_to(return_to),
			created_at: OffsetDateTime::now_utc(),
			pkce,
		}
	}

	/// PKCE code challenge derived from the secret verifier.
	pub fn code_challenge(&self) -> &str {
		&self.pkce.challenge
	}

	/// PKCE challenge method (currently always `S256`).
	pub fn code_challenge_method(&self) -> PkceCodeChallengeMethod {
		self.pkce.method
	}

	/// Validates the returned `state` parameter after the authorization redirect.
	pub fn validate_state(&self, returned_state: &str) -> Result<()> {
		if returned_state == self.state {
			Ok(())
		} else {
			Err(Error::InvalidGrant { reason: "authorization state mismatch".into() })
		}
	}

	/// Whether the login waited longer than [`Self::MAX_AGE`] as of `now`.
	pub fn is_expired(&self, now: OffsetDateTime) -> bool {
		now - self.created_at > Self::MAX_AGE
	}

	pub(crate) fn pkce_verifier(&self) -> &str {
		&self.pkce.verifier
	}
}
impl Debug for AuthorizationRequest {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("AuthorizationRequest")
			.field("state", &self.state)
			.field("authorize_url", &self.authorize_url)
			.field("return_to", &self.return_to)
			.field("created_at", &self.created_at)
			.field("code_challenge", &self.pkce.challenge)
			.field("code_challenge_method", &self.pkce.method)
			.finish()
	}
}

#[derive(Clone)]
struct PkcePair {
	verifier: String,
	challenge: String,
	method: PkceCodeChallengeMethod,
}
impl PkcePair {
	fn generate() -> Self {
		let verifier = random_string(PKCE_VERIFIER_LEN);
		let challenge = compute_pkce_challenge(&verifier);

		Self { verifier, challenge, method: PkceCodeChallengeMethod::S256 }
	}
}

/// Keeps only local absolute paths; anything else returns to `/`.
pub fn sanitize_return_to(candidate: &str) -> String {
	let local = candidate.starts_with('/')
		&& !candidate.starts_with("//")
		&& !candidate.contains('\\')
		&& !candidate.chars().any(char::is_control);

	if local { candidate.to_owned() } else { "/".into() }
}

fn build_authorize_url(
	registration: &ClientRegistration,
	state: &str,
	nonce: &str,
	pkce: &PkcePair,
) -> Url {
	let mut url = registration.descriptor.endpoints.authorization.clone();
	let mut pairs = url.query_pairs_mut();

	pairs.append_pair("response_type", "code");
	pairs.append_pair("client_id", &registration.client_id);
	pairs.append_pair("redirect_uri", registration.redirect_uri.as_str());
	pairs.append_pair("scope", &registration.scope.normalized());
	pairs.append_pair("state", state);
	pairs.append_pair("nonce", nonce);
	pairs.append_pair("code_challenge", &pkce.challenge);
	pairs.append_pair("code_challenge_method", pkce.method.as_str());

	drop(pairs);

	url
}

fn random_string(len: usize) -> String {
	rand::rng().sample_iter(Alphanumeric).take(len).map(char::from).collect()
}

fn compute_pkce_challenge(verifier: &str) -> String {
	URL_SAFE_NO_PAD.encode(Sha256::digest(verifier.as_bytes()))
}
