//! Authorization-code exchange against the provider's token endpoint.

pub use oauth2;

// crates.io
use oauth2::{
	AuthType, AuthUrl, AuthorizationCode, Client, ClientId, ClientSecret, EndpointNotSet,
	EndpointSet, ExtraTokenFields, HttpClientError, PkceCodeVerifier, RedirectUrl,
	RequestTokenError, StandardRevocableToken, StandardTokenResponse, TokenResponse, TokenUrl,
	basic::{
		BasicErrorResponse, BasicRevocationErrorResponse, BasicTokenIntrospectionResponse,
		BasicTokenType,
	},
};
// self
use crate::{
	_prelude::*,
	auth::{ScopeSet, TokenSecret},
	error::{ConfigError, TransientError, TransportError},
	provider::{ClientAuthMethod, ClientRegistration},
};

type OidcTokenResponse = StandardTokenResponse<IdTokenFields, BasicTokenType>;
type ConfiguredOidcClient = Client<
	BasicErrorResponse,
	OidcTokenResponse,
	BasicTokenIntrospectionResponse,
	StandardRevocableToken,
	BasicRevocationErrorResponse,
	EndpointSet,
	EndpointNotSet,
	EndpointNotSet,
	EndpointNotSet,
	EndpointSet,
>;
type UnconfiguredOidcClient = Client<
	BasicErrorResponse,
	OidcTokenResponse,
	BasicTokenIntrospectionResponse,
	StandardRevocableToken,
	BasicRevocationErrorResponse,
	EndpointNotSet,
	EndpointNotSet,
	EndpointNotSet,
	EndpointNotSet,
	EndpointNotSet,
>;
type FacadeFuture<'a, T> = Pin<Box<dyn Future<Output = Result<T>> + 'a + Send>>;

/// Token response fields defined by OpenID Connect on top of OAuth 2.0.
#[derive(Clone, Default, Serialize, Deserialize)]
pub struct IdTokenFields {
	#[serde(default, skip_serializing_if = "Option::is_none")]
	id_token: Option<String>,
}
impl ExtraTokenFields for IdTokenFields {}
impl Debug for IdTokenFields {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("IdTokenFields").field("id_token_set", &self.id_token.is_some()).finish()
	}
}

/// Tokens returned by a successful code exchange.
#[derive(Clone, Debug)]
pub struct TokenGrant {
	/// Access token for the user-info endpoint.
	pub access_token: TokenSecret,
	/// OIDC ID token, when the provider returned one.
	pub id_token: Option<TokenSecret>,
	/// Scopes the provider reports as granted; falls back to the requested set.
	pub scope: ScopeSet,
}

/// Exchanges authorization codes for one client registration.
pub(crate) struct CodeExchange {
	oauth_client: ConfiguredOidcClient,
	http_client: ReqwestClient,
	requested_scope: ScopeSet,
}
impl CodeExchange {
	pub(crate) fn from_registration(
		registration: &ClientRegistration,
		http_client: ReqwestClient,
	) -> Result<Self, ConfigError> {
		let descriptor = &registration.descriptor;
		let auth_url = AuthUrl::new(descriptor.endpoints.authorization.to_string())
			.map_err(|source| ConfigError::InvalidDescriptor { source })?;
		let token_url = TokenUrl::new(descriptor.endpoints.token.to_string())
			.map_err(|source| ConfigError::InvalidDescriptor { source })?;
		let redirect_url = RedirectUrl::new(registration.redirect_uri.to_string())
			.map_err(|source| ConfigError::InvalidRedirect { source })?;
		let mut oauth_client =
			UnconfiguredOidcClient::new(ClientId::new(registration.client_id.clone()))
				.set_auth_uri(auth_url)
				.set_token_uri(token_url)
				.set_redirect_uri(redirect_url);

		let secret = if matches!(descriptor.preferred_client_auth_method, ClientAuthMethod::None) {
			None
		} else {
			registration.client_secret.as_ref().map(|value| ClientSecret::new(value.expose().to_owned()))
		};

		if let Some(secret) = secret {
			oauth_client = oauth_client.set_client_secret(secret);
		}
		if matches!(descriptor.preferred_client_auth_method, ClientAuthMethod::ClientSecretPost) {
			oauth_client = oauth_client.set_auth_type(AuthType::RequestBody);
		}

		Ok(Self { oauth_client, http_client, requested_scope: registration.scope.clone() })
	}

	pub(crate) fn exchange<'a>(
		&'a self,
		code: &'a str,
		pkce_verifier: &'a str,
	) -> FacadeFuture<'a, TokenGrant> {
		Box::pin(async move {
			let response = self
				.oauth_client
				.exchange_code(AuthorizationCode::new(code.to_owned()))
				.set_pkce_verifier(PkceCodeVerifier::new(pkce_verifier.to_owned()))
				.request_async(&self.http_client)
				.await
				.map_err(map_request_error)?;
			let scope = match response.scopes() {
				Some(scopes) => ScopeSet::new(scopes.iter().map(|scope| scope.as_ref()))
					.map_err(ConfigError::from)?,
				None => self.requested_scope.clone(),
			};

			Ok(TokenGrant {
				access_token: TokenSecret::new(response.access_token().secret().to_owned()),
				id_token: response.extra_fields().id_token.clone().map(TokenSecret::new),
				scope,
			})
		})
	}
}
impl Debug for CodeExchange {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("CodeExchange").field("requested_scope", &self.requested_scope).finish()
	}
}

fn map_request_error(
	err: RequestTokenError<HttpClientError<ReqwestError>, BasicErrorResponse>,
) -> Error {
	match err {
		RequestTokenError::ServerResponse(response) => {
			let reason = match response.error_description() {
				Some(description) => format!("{}: {description}", response.error().as_ref()),
				None => response.error().as_ref().to_string(),
			};

			Error::InvalidGrant { reason }
		},
		RequestTokenError::Request(HttpClientError::Reqwest(inner)) =>
			TransportError::from(*inner).into(),
		RequestTokenError::Request(HttpClientError::Io(inner)) => TransportError::Io(inner).into(),
		RequestTokenError::Request(other) =>
			TransientError::TokenEndpoint { message: other.to_string() }.into(),
		RequestTokenError::Parse(source, _body) => TransientError::TokenResponseParse { source }.into(),
		RequestTokenError::Other(message) => TransientError::TokenEndpoint { message }.into(),
	}
}

#[cfg(test)]
mod tests {
	// self
	use super::*;
	use crate::{auth::RegistrationId, provider::ProviderDescriptor};

	fn registration(method: ClientAuthMethod) -> ClientRegistration {
		let url = |value: &str| Url::parse(value).expect("URL fixture should parse.");
		let descriptor = ProviderDescriptor::builder(
			RegistrationId::new("oidc").expect("Registration fixture should be valid."),
		)
		.authorization_endpoint(url("https://idp.example.com/authorize"))
		.token_endpoint(url("https://idp.example.com/token"))
		.userinfo_endpoint(url("https://idp.example.com/userinfo"))
		.preferred_client_auth_method(method)
		.build()
		.expect("Descriptor fixture should build.");

		ClientRegistration::new(descriptor, "portal", url("https://portal.example.com/login/oauth2/code/oidc"))
			.expect("Registration fixture should build.")
			.with_client_secret("s3cret")
	}

	#[test]
	fn builds_clients_for_every_auth_method() {
		for method in
			[ClientAuthMethod::ClientSecretBasic, ClientAuthMethod::ClientSecretPost, ClientAuthMethod::None]
		{
			let exchange = CodeExchange::from_registration(&registration(method), ReqwestClient::new());

			assert!(exchange.is_ok(), "{method:?} should produce a client");
		}
	}

	#[test]
	fn id_token_fields_deserialize_and_redact() {
		let fields: IdTokenFields =
			serde_json::from_str(r#"{"id_token":"header.payload.sig"}"#).expect("Fields should parse.");

		assert_eq!(fields.id_token.as_deref(), Some("header.payload.sig"));
		assert!(!format!("{fields:?}").contains("payload"));
		assert!(
			serde_json::from_str::<IdTokenFields>("{}").expect("Empty fields should parse.").id_token.is_none()
		);
	}
}
