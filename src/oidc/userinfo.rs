//! [`OidcUserFetcher`] that calls the provider's user-info endpoint.

// crates.io
use reqwest::{
	StatusCode,
	header::{ACCEPT, HeaderValue},
};
use serde_json::{Map, Value};
// self
use crate::{
	_prelude::*,
	error::TransientError,
	oidc::{OidcUser, OidcUserFetcher, OidcUserRequest, UserFuture, id_token_subject},
	provider::ProviderDescriptor,
};

/// Fetches claims with the access token and builds the principal from them.
#[derive(Clone, Debug)]
pub struct UserInfoFetcher {
	http: ReqwestClient,
	endpoint: Url,
}
impl UserInfoFetcher {
	/// Targets an explicit user-info endpoint.
	pub fn new(http: ReqwestClient, endpoint: Url) -> Self {
		Self { http, endpoint }
	}

	/// Targets the endpoint declared by `descriptor`.
	pub fn for_provider(http: ReqwestClient, descriptor: &ProviderDescriptor) -> Self {
		Self::new(http, descriptor.endpoints.userinfo.clone())
	}

	async fn fetch(&self, request: &OidcUserRequest) -> Result<OidcUser> {
		let response = self
			.http
			.get(self.endpoint.clone())
			.bearer_auth(request.access_token.expose())
			.header(ACCEPT, HeaderValue::from_static("application/json"))
			.send()
			.await
			.map_err(crate::error::TransportError::from)?;
		let status = response.status();

		match status {
			status if status.is_success() => {},
			StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
				return Err(Error::InvalidGrant {
					reason: format!("user-info endpoint refused the access token with HTTP {status}"),
				});
			},
			status if status.is_server_error() =>
				return Err(TransientError::UserInfoEndpoint { status: status.as_u16() }.into()),
			status => {
				return Err(Error::InvalidUserInfo {
					reason: format!("user-info endpoint answered HTTP {status}"),
				});
			},
		}

		let body = response.bytes().await.map_err(crate::error::TransportError::from)?;
		let mut deserializer = serde_json::Deserializer::from_slice(&body);
		let claims: Map<String, Value> = serde_path_to_error::deserialize(&mut deserializer)
			.map_err(|e| Error::InvalidUserInfo { reason: e.to_string() })?;
		let user = OidcUser::from_claims(claims)?;

		let id_token_sub =
			request.id_token.as_ref().and_then(|token| id_token_subject(token.expose()));

		match id_token_sub {
			Some(expected) if expected != *user.subject => Err(Error::InvalidUserInfo {
				reason: "user-info subject does not match the ID token".into(),
			}),
			_ => Ok(user),
		}
	}
}
impl OidcUserFetcher for UserInfoFetcher {
	fn load_user<'a>(&'a self, request: &'a OidcUserRequest) -> UserFuture<'a> {
		Box::pin(self.fetch(request))
	}
}
