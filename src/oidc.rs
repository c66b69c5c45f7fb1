//! OpenID Connect principal model, the user-info fetcher contract, and the login flow.

pub mod authorization;
pub mod login;
pub mod userinfo;

pub use authorization::*;
pub use login::*;
pub use userinfo::*;

// crates.io
use base64::{Engine as _, engine::general_purpose::URL_SAFE_NO_PAD};
use serde_json::{Map, Value};
// self
use crate::{
	_prelude::*,
	auth::{RegistrationId, ScopeSet, SubjectId, TokenSecret},
};

/// Boxed future returned by [`OidcUserFetcher::load_user`].
pub type UserFuture<'a> = Pin<Box<dyn Future<Output = Result<OidcUser>> + 'a + Send>>;

/// Resolves the authenticated end-user once the authorization code has been exchanged.
///
/// The portal never calls a fetcher outside the login callback; whether one is configured is
/// what switches OIDC login (and the protected `/user` path) on.
pub trait OidcUserFetcher
where
	Self: Send + Sync,
{
	/// Loads the principal for the tokens in `request`.
	fn load_user<'a>(&'a self, request: &'a OidcUserRequest) -> UserFuture<'a>;
}

/// Tokens and context handed to an [`OidcUserFetcher`].
#[derive(Clone, Debug)]
pub struct OidcUserRequest {
	/// Registration the login went through.
	pub registration: RegistrationId,
	/// Access token accepted by the user-info endpoint.
	pub access_token: TokenSecret,
	/// ID token returned alongside the access token, if any.
	pub id_token: Option<TokenSecret>,
	/// Nonce sent with the authorization request; a returned ID token already matched it.
	pub nonce: String,
	/// Scopes granted by the provider.
	pub scope: ScopeSet,
}

/// Authenticated end-user and the claims the provider released.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct OidcUser {
	/// Provider-issued subject identifier.
	pub subject: SubjectId,
	/// Every claim returned by the provider, including `sub`.
	pub claims: Map<String, Value>,
}
impl OidcUser {
	/// Builds a user from a claims object; `sub` is mandatory.
	pub fn from_claims(claims: Map<String, Value>) -> Result<Self> {
		let subject = match claims.get("sub") {
			Some(Value::String(sub)) => SubjectId::new(sub)
				.map_err(|e| Error::InvalidUserInfo { reason: e.to_string() })?,
			_ => return Err(Error::InvalidUserInfo { reason: "the `sub` claim is missing".into() }),
		};

		Ok(Self { subject, claims })
	}

	/// String-valued claim.
	pub fn claim(&self, key: &str) -> Option<&str> {
		self.claims.get(key).and_then(Value::as_str)
	}

	/// Best display name: `name`, then `preferred_username`, then `email`, then the subject.
	pub fn display_name(&self) -> &str {
		self.claim("name")
			.or_else(|| self.claim("preferred_username"))
			.or_else(|| self.claim("email"))
			.unwrap_or(&*self.subject)
	}

	/// The `email` claim.
	pub fn email(&self) -> Option<&str> {
		self.claim("email")
	}
}

/// Decodes the claims of an ID token payload without verifying the signature.
pub fn id_token_claims(id_token: &str) -> Option<Map<String, Value>> {
	let payload = id_token.split('.').nth(1)?;
	let decoded = URL_SAFE_NO_PAD.decode(payload.trim_end_matches('=')).ok()?;

	serde_json::from_slice(&decoded).ok()
}

/// Reads the `sub` claim from an ID token payload without verifying the signature.
///
/// Only used to cross-check the user-info response, which must describe the same subject.
pub fn id_token_subject(id_token: &str) -> Option<String> {
	id_token_claims(id_token)?.get("sub").and_then(Value::as_str).map(str::to_owned)
}
