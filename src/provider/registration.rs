//! Client registration: the portal's identity at one OIDC provider.

// self
use crate::{
	_prelude::*,
	auth::{RegistrationId, ScopeSet, TokenSecret},
	provider::{ProviderDescriptor, ProviderDescriptorError, descriptor::builder::validate_endpoint},
};

/// Path prefix of the endpoint that starts a login for a registration.
pub const LOGIN_PATH_PREFIX: &str = "/oauth2/authorization";
/// Path prefix of the endpoint the provider redirects back to.
pub const CALLBACK_PATH_PREFIX: &str = "/login/oauth2/code";

/// Credentials, redirect URI, and scopes used to log users in through one provider.
#[derive(Clone)]
pub struct ClientRegistration {
	/// Provider metadata.
	pub descriptor: ProviderDescriptor,
	/// OAuth 2.0 client identifier.
	pub client_id: String,
	/// Optional client secret for confidential clients.
	pub client_secret: Option<TokenSecret>,
	/// Redirect URI registered at the provider; its path must be [`Self::callback_path`].
	pub redirect_uri: Url,
	/// Scopes requested during login; always includes `openid`.
	pub scope: ScopeSet,
}
impl ClientRegistration {
	/// Creates a registration requesting the default `openid email profile` scopes.
	pub fn new(
		descriptor: ProviderDescriptor,
		client_id: impl Into<String>,
		redirect_uri: Url,
	) -> Result<Self, ProviderDescriptorError> {
		validate_endpoint("redirect", &redirect_uri)?;

		Ok(Self {
			descriptor,
			client_id: client_id.into(),
			client_secret: None,
			redirect_uri,
			scope: ScopeSet::openid_default(),
		})
	}

	/// Sets the client secret used for confidential client auth modes.
	pub fn with_client_secret(mut self, secret: impl Into<String>) -> Self {
		self.client_secret = Some(TokenSecret::new(secret));

		self
	}

	/// Replaces the requested scopes; `openid` is added when missing.
	pub fn with_scope(mut self, scope: ScopeSet) -> Self {
		self.scope = scope.with_openid();

		self
	}

	/// Registration identifier.
	pub fn id(&self) -> &RegistrationId {
		&self.descriptor.id
	}

	/// Local path that starts the login, e.g. `/oauth2/authorization/oidc`.
	pub fn login_path(&self) -> String {
		format!("{LOGIN_PATH_PREFIX}/{}", self.id())
	}

	/// Local path that receives the authorization response, e.g. `/login/oauth2/code/oidc`.
	pub fn callback_path(&self) -> String {
		format!("{CALLBACK_PATH_PREFIX}/{}", self.id())
	}

	/// Whether session cookies should carry the `Secure` attribute.
	pub fn secure_cookies(&self) -> bool {
		self.redirect_uri.scheme() == "https"
	}
}
impl Debug for ClientRegistration {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("ClientRegistration")
			.field("descriptor", &self.descriptor)
			.field("client_id", &self.client_id)
			.field("client_secret_set", &self.client_secret.is_some())
			.field("redirect_uri", &self.redirect_uri)
			.field("scope", &self.scope)
			.finish()
	}
}
