//! Portal-level error types shared across configuration, login, and the security chain.

// self
use crate::_prelude::*;

/// Portal-wide result type alias returning [`Error`] by default.
pub type Result<T, E = Error> = std::result::Result<T, E>;

pub(crate) type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Canonical portal error exposed by public APIs.
#[derive(Debug, ThisError)]
pub enum Error {
	/// Local configuration problem.
	#[error(transparent)]
	Config(#[from] ConfigError),
	/// The security chain could not be assembled; startup must abort.
	#[error(transparent)]
	SecurityChain(#[from] crate::policy::SecurityChainError),
	/// Temporary upstream failure; retry with backoff.
	#[error(transparent)]
	Transient(#[from] TransientError),
	/// Transport failure (DNS, TCP, TLS, socket binding).
	#[error(transparent)]
	Transport(#[from] TransportError),

	/// Provider rejected the authorization code or the login round-trip was tampered with.
	#[error("Provider rejected the grant: {reason}.")]
	InvalidGrant {
		/// Provider- or portal-supplied reason string.
		reason: String,
	},
	/// The user-info endpoint answered with claims the portal cannot use.
	#[error("User-info response is unusable: {reason}.")]
	InvalidUserInfo {
		/// Why the claims were rejected.
		reason: String,
	},
	/// Request lacks an authenticated principal.
	#[error("Authentication is required.")]
	Unauthenticated,
}

/// Configuration and validation failures raised while wiring the portal.
#[derive(Debug, ThisError)]
pub enum ConfigError {
	/// HTTP client could not be constructed.
	#[error("HTTP client could not be constructed.")]
	HttpClientBuild {
		/// Underlying transport builder failure.
		#[source]
		source: BoxError,
	},
	/// Environment variables do not describe a valid configuration.
	#[error("Environment configuration is invalid at `{path}`.")]
	Environment {
		/// Dotted key path of the offending entry.
		path: String,
		/// Structured deserialization failure.
		#[source]
		source: serde_path_to_error::Error<serde_json::Error>,
	},
	/// Provider descriptor could not be validated.
	#[error(transparent)]
	Descriptor(#[from] crate::provider::ProviderDescriptorError),
	/// Provider descriptor contains a URL the OAuth client refuses.
	#[error("Descriptor contains an invalid URL.")]
	InvalidDescriptor {
		/// Underlying parsing failure.
		#[source]
		source: oauth2::url::ParseError,
	},
	/// Redirect URI cannot be parsed.
	#[error("Redirect URI is invalid.")]
	InvalidRedirect {
		/// Underlying parsing failure.
		#[source]
		source: oauth2::url::ParseError,
	},
	/// Requested scopes cannot be normalized.
	#[error("Requested scopes are invalid.")]
	InvalidScope(#[from] crate::auth::ScopeValidationError),
	/// Registration identifier failed validation.
	#[error(transparent)]
	InvalidIdentifier(#[from] crate::auth::IdentifierError),
	/// Telemetry connection string is malformed.
	#[error("Telemetry connection string is invalid: {reason}.")]
	InvalidConnectionString {
		/// What was wrong with the connection string.
		reason: String,
	},
}
impl ConfigError {
	/// Wraps a transport's builder failure inside [`ConfigError`].
	pub fn http_client_build(src: impl 'static + Send + Sync + std::error::Error) -> Self {
		Self::HttpClientBuild { source: Box::new(src) }
	}
}
impl From<serde_path_to_error::Error<serde_json::Error>> for ConfigError {
	fn from(e: serde_path_to_error::Error<serde_json::Error>) -> Self {
		Self::Environment { path: e.path().to_string(), source: e }
	}
}

/// Temporary failure variants (safe to retry).
#[derive(Debug, ThisError)]
pub enum TransientError {
	/// Provider returned an unexpected but non-fatal response.
	#[error("Token endpoint returned an unexpected response: {message}.")]
	TokenEndpoint {
		/// Provider- or portal-supplied message summarizing the failure.
		message: String,
	},
	/// Token endpoint responded with malformed JSON that could not be parsed.
	#[error("Token endpoint returned malformed JSON.")]
	TokenResponseParse {
		/// Structured parsing failure.
		#[source]
		source: serde_path_to_error::Error<serde_json::Error>,
	},
	/// User-info endpoint failed with a server-side status.
	#[error("User-info endpoint returned HTTP {status}.")]
	UserInfoEndpoint {
		/// HTTP status code returned by the endpoint.
		status: u16,
	},
}

/// Transport-level failures (network, IO).
#[derive(Debug, ThisError)]
pub enum TransportError {
	/// Underlying HTTP client reported a network failure.
	#[error("Network error occurred while calling the identity provider.")]
	Network {
		/// Transport-specific network error.
		#[source]
		source: BoxError,
	},
	/// Underlying IO failure surfaced during transport or while binding the listener.
	#[error("I/O error occurred.")]
	Io(#[from] std::io::Error),
}
impl TransportError {
	/// Wraps a transport-specific network error.
	pub fn network(src: impl 'static + Send + Sync + std::error::Error) -> Self {
		Self::Network { source: Box::new(src) }
	}
}
impl From<ReqwestError> for TransportError {
	fn from(e: ReqwestError) -> Self {
		Self::network(e)
	}
}
