//! Portal configuration read from `PORTAL_*` environment variables.
//!
//! Keys are lower-cased after the prefix and `__` separates nesting levels, so
//! `PORTAL_OIDC__CLIENT_ID` becomes `oidc.client_id`. The conventional
//! `APPLICATIONINSIGHTS_CONNECTION_STRING` fills `telemetry.connection_string` unless the
//! prefixed variable is set.

// std
use std::{net::SocketAddr, time::Duration as StdDuration};
// crates.io
use serde::{Deserializer, de::Error as DeError};
use serde_json::{Map, Value};
// self
use crate::{
	_prelude::*,
	auth::{RegistrationId, ScopeSet, TokenSecret},
	error::ConfigError,
	provider::{ClientAuthMethod, ClientRegistration, ProviderDescriptor},
	telemetry::{ConnectionString, IngestionSink, TelemetryDispatcher},
	wiring::Collaborator,
};

/// Prefix shared by every portal variable.
pub const ENV_PREFIX: &str = "PORTAL_";
/// Connection string variable understood without the prefix.
pub const APPLICATIONINSIGHTS_CONNECTION_STRING: &str = "APPLICATIONINSIGHTS_CONNECTION_STRING";

const NESTING_SEPARATOR: &str = "__";

/// Top-level portal configuration.
#[derive(Clone, Debug, Deserialize)]
pub struct PortalConfig {
	/// Listen address.
	#[serde(default = "default_bind")]
	pub bind: SocketAddr,
	/// OIDC login settings; absent disables login.
	#[serde(default)]
	pub oidc: Option<OidcSettings>,
	/// Exception telemetry settings; absent disables reporting.
	#[serde(default)]
	pub telemetry: Option<TelemetrySettings>,
}
impl PortalConfig {
	/// Reads the process environment.
	pub fn from_env() -> Result<Self, ConfigError> {
		Self::from_vars(std::env::vars())
	}

	/// Reads configuration from `(name, value)` pairs; unrelated names are ignored.
	pub fn from_vars<I, K, V>(vars: I) -> Result<Self, ConfigError>
	where
		I: IntoIterator<Item = (K, V)>,
		K: AsRef<str>,
		V: Into<String>,
	{
		let mut root = Map::new();
		let mut fallback_connection_string = None;

		for (name, value) in vars {
			let name = name.as_ref();

			if name == APPLICATIONINSIGHTS_CONNECTION_STRING {
				fallback_connection_string = Some(value.into());

				continue;
			}

			let Some(rest) = name.strip_prefix(ENV_PREFIX) else { continue };
			let rest = rest.to_ascii_lowercase();
			let path = rest.split(NESTING_SEPARATOR).collect::<Vec<_>>();

			if path.iter().any(|segment| segment.is_empty()) {
				tracing::warn!(name, "ignoring malformed portal variable");

				continue;
			}

			insert_path(&mut root, &path, value.into());
		}

		if let Some(connection_string) = fallback_connection_string {
			insert_default(&mut root, &["telemetry", "connection_string"], connection_string);
		}

		Ok(serde_path_to_error::deserialize(Value::Object(root))?)
	}

	/// Client registration described by the `oidc` table, if present.
	pub fn client_registration(&self) -> Result<Option<ClientRegistration>, ConfigError> {
		self.oidc.as_ref().map(OidcSettings::client_registration).transpose()
	}

	/// Telemetry dispatcher described by the `telemetry` table.
	///
	/// A missing or blank connection string leaves reporting off; only a non-blank string that
	/// does not parse is an error.
	pub fn telemetry_dispatcher(
		&self,
		http: ReqwestClient,
	) -> Result<Collaborator<TelemetryDispatcher>, ConfigError> {
		let Some(settings) = &self.telemetry else { return Ok(Collaborator::Absent) };
		let Some(connection_string) =
			settings.connection_string.as_deref().map(str::trim).filter(|s| !s.is_empty())
		else {
			tracing::warn!(
				timeout_ms = ?settings.timeout_ms,
				role = ?settings.role,
				"telemetry settings present without a connection string, reporting stays off"
			);

			return Ok(Collaborator::Absent);
		};
		let connection = ConnectionString::from_str(connection_string)?;
		let mut sink = IngestionSink::new(http, &connection)?;

		if let Some(role) = &settings.role {
			sink = sink.with_role(role.clone());
		}

		let mut dispatcher = TelemetryDispatcher::new(Arc::new(sink));

		if let Some(timeout_ms) = settings.timeout_ms {
			dispatcher = dispatcher.with_timeout(StdDuration::from_millis(timeout_ms));
		}

		Ok(Collaborator::Configured(dispatcher))
	}
}
impl Default for PortalConfig {
	fn default() -> Self {
		Self { bind: default_bind(), oidc: None, telemetry: None }
	}
}

/// The `oidc` table; every endpoint and the client id are required once the table exists.
#[derive(Clone, Debug, Deserialize)]
pub struct OidcSettings {
	/// Registration identifier used in the login and callback paths; defaults to `oidc`.
	#[serde(default)]
	pub registration: Option<RegistrationId>,
	/// OAuth 2.0 client identifier.
	pub client_id: String,
	/// Client secret for confidential clients.
	#[serde(default)]
	pub client_secret: Option<TokenSecret>,
	/// How the client authenticates at the token endpoint.
	#[serde(default)]
	pub client_auth_method: ClientAuthMethod,
	/// Provider authorization endpoint.
	pub authorization_endpoint: Url,
	/// Provider token endpoint.
	pub token_endpoint: Url,
	/// Provider user-info endpoint.
	pub userinfo_endpoint: Url,
	/// Redirect URI registered at the provider.
	pub redirect_uri: Url,
	/// Space-delimited scopes; `openid` is always added.
	#[serde(default = "ScopeSet::openid_default")]
	pub scopes: ScopeSet,
}
impl OidcSettings {
	/// Validates the endpoints and builds the registration.
	pub fn client_registration(&self) -> Result<ClientRegistration, ConfigError> {
		let id = match &self.registration {
			Some(id) => id.clone(),
			None => RegistrationId::new(RegistrationId::DEFAULT)?,
		};
		let descriptor = ProviderDescriptor::builder(id)
			.authorization_endpoint(self.authorization_endpoint.clone())
			.token_endpoint(self.token_endpoint.clone())
			.userinfo_endpoint(self.userinfo_endpoint.clone())
			.preferred_client_auth_method(self.client_auth_method)
			.build()?;
		let mut registration =
			ClientRegistration::new(descriptor, self.client_id.clone(), self.redirect_uri.clone())?
				.with_scope(self.scopes.clone());

		if let Some(secret) = &self.client_secret {
			registration = registration.with_client_secret(secret.expose());
		}

		Ok(registration)
	}
}

/// The `telemetry` table.
#[derive(Clone, Deserialize)]
pub struct TelemetrySettings {
	/// `InstrumentationKey=...;IngestionEndpoint=...` connection string.
	#[serde(default)]
	pub connection_string: Option<String>,
	/// Per-report timeout in milliseconds.
	#[serde(default, deserialize_with = "millis_from_str")]
	pub timeout_ms: Option<u64>,
	/// Cloud role name attached to every report.
	#[serde(default)]
	pub role: Option<String>,
}
impl Debug for TelemetrySettings {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("TelemetrySettings")
			.field("connection_string", &"<redacted>")
			.field("timeout_ms", &self.timeout_ms)
			.field("role", &self.role)
			.finish()
	}
}

fn default_bind() -> SocketAddr {
	SocketAddr::from(([127, 0, 0, 1], 8080))
}

fn millis_from_str<'de, D>(deserializer: D) -> Result<Option<u64>, D::Error>
where
	D: Deserializer<'de>,
{
	Option::<String>::deserialize(deserializer)?
		.map(|raw| raw.trim().parse::<u64>().map_err(DeError::custom))
		.transpose()
}

fn insert_path(table: &mut Map<String, Value>, path: &[&str], value: String) {
	match path {
		[] => {},
		[leaf] => {
			table.insert((*leaf).to_owned(), Value::String(value));
		},
		[head, rest @ ..] => {
			let entry = table.entry((*head).to_owned()).or_insert_with(|| Value::Object(Map::new()));

			if !entry.is_object() {
				*entry = Value::Object(Map::new());
			}
			if let Value::Object(child) = entry {
				insert_path(child, rest, value);
			}
		},
	}
}

fn insert_default(table: &mut Map<String, Value>, path: &[&str], value: String) {
	let exists = match path.split_last() {
		Some((leaf, parents)) => parents
			.iter()
			.try_fold(&*table, |current, segment| current.get(*segment).and_then(Value::as_object))
			.is_some_and(|parent| parent.contains_key(*leaf)),
		None => true,
	};

	if !exists {
		insert_path(table, path, value);
	}
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	const IDP: [(&str, &str); 5] = [
		("PORTAL_OIDC__CLIENT_ID", "portal"),
		("PORTAL_OIDC__AUTHORIZATION_ENDPOINT", "https://idp.example.com/authorize"),
		("PORTAL_OIDC__TOKEN_ENDPOINT", "https://idp.example.com/token"),
		("PORTAL_OIDC__USERINFO_ENDPOINT", "https://idp.example.com/userinfo"),
		("PORTAL_OIDC__REDIRECT_URI", "https://portal.example.com/login/oauth2/code/oidc"),
	];

	#[test]
	fn empty_environment_yields_defaults() {
		let config = PortalConfig::from_vars([("HOME", "/root"), ("PATH", "/bin")])
			.expect("Unrelated variables should be ignored.");

		assert_eq!(config.bind, default_bind());
		assert!(config.oidc.is_none());
		assert!(config.telemetry.is_none());
		assert!(config.client_registration().expect("No table means no registration.").is_none());
	}

	#[test]
	fn oidc_table_builds_a_registration() {
		let config = PortalConfig::from_vars(
			IDP.into_iter().chain([("PORTAL_OIDC__SCOPES", "email"), ("PORTAL_BIND", "0.0.0.0:9000")]),
		)
		.expect("Complete OIDC table should parse.");
		let registration = config
			.client_registration()
			.expect("Registration should build.")
			.expect("Registration should be present.");

		assert_eq!(config.bind.port(), 9000);
		assert_eq!(&**registration.id(), "oidc");
		assert_eq!(registration.scope.normalized(), "email openid");
		assert_eq!(registration.callback_path(), "/login/oauth2/code/oidc");
	}

	#[test]
	fn partial_oidc_tables_are_rejected() {
		let err = PortalConfig::from_vars([("PORTAL_OIDC__CLIENT_ID", "portal")])
			.expect_err("A client id alone is not a usable table.");

		assert!(matches!(err, ConfigError::Environment { ref path, .. } if path == "oidc"));
	}

	#[test]
	fn plain_http_providers_are_rejected_unless_loopback() {
		let remote = PortalConfig::from_vars(
			IDP.into_iter()
				.filter(|(name, _)| *name != "PORTAL_OIDC__TOKEN_ENDPOINT")
				.chain([("PORTAL_OIDC__TOKEN_ENDPOINT", "http://idp.example.com/token")]),
		)
		.expect("Insecure URLs still parse.");

		assert!(matches!(remote.client_registration(), Err(ConfigError::Descriptor(_))));
	}

	#[test]
	fn telemetry_reads_the_conventional_variable_and_timeout() {
		let config = PortalConfig::from_vars([
			(APPLICATIONINSIGHTS_CONNECTION_STRING, "InstrumentationKey=abc"),
			("PORTAL_TELEMETRY__TIMEOUT_MS", "250"),
		])
		.expect("Telemetry variables should parse.");
		let settings = config.telemetry.as_ref().expect("Telemetry table should be present.");

		assert_eq!(settings.connection_string.as_deref(), Some("InstrumentationKey=abc"));
		assert_eq!(settings.timeout_ms, Some(250));
		assert!(!format!("{settings:?}").contains("abc"));
		assert!(
			config
				.telemetry_dispatcher(ReqwestClient::new())
				.expect("Dispatcher should build.")
				.is_configured()
		);
	}

	#[test]
	fn prefixed_connection_string_wins() {
		let config = PortalConfig::from_vars([
			("PORTAL_TELEMETRY__CONNECTION_STRING", "InstrumentationKey=prefixed"),
			(APPLICATIONINSIGHTS_CONNECTION_STRING, "InstrumentationKey=fallback"),
		])
		.expect("Telemetry variables should parse.");

		assert_eq!(
			config.telemetry.expect("Telemetry table should be present.").connection_string.as_deref(),
			Some("InstrumentationKey=prefixed")
		);
	}

	#[test]
	fn timeout_without_a_connection_string_leaves_reporting_off() {
		let config = PortalConfig::from_vars([("PORTAL_TELEMETRY__TIMEOUT_MS", "250")])
			.expect("A lone timeout should parse.");

		assert_eq!(config.telemetry.as_ref().and_then(|t| t.timeout_ms), Some(250));
		assert!(
			!config
				.telemetry_dispatcher(ReqwestClient::new())
				.expect("A missing connection string is not an error.")
				.is_configured()
		);
	}

	#[test]
	fn blank_connection_strings_leave_reporting_off() {
		for value in ["", "   "] {
			let config = PortalConfig::from_vars([(APPLICATIONINSIGHTS_CONNECTION_STRING, value)])
				.expect("Blank connection strings should parse.");

			assert!(
				!config
					.telemetry_dispatcher(ReqwestClient::new())
					.expect("A blank connection string is not an error.")
					.is_configured()
			);
		}
	}

	#[test]
	fn malformed_connection_strings_are_rejected() {
		let config =
			PortalConfig::from_vars([(APPLICATIONINSIGHTS_CONNECTION_STRING, "IngestionEndpoint=https://x")])
				.expect("The variable itself should parse.");

		assert!(matches!(
			config.telemetry_dispatcher(ReqwestClient::new()),
			Err(ConfigError::InvalidConnectionString { .. })
		));
	}

	#[test]
	fn malformed_timeouts_report_their_path() {
		let err = PortalConfig::from_vars([
			("PORTAL_TELEMETRY__CONNECTION_STRING", "InstrumentationKey=k"),
			("PORTAL_TELEMETRY__TIMEOUT_MS", "soon"),
		])
		.expect_err("Non-numeric timeouts must fail.");

		assert!(matches!(err, ConfigError::Environment { ref path, .. } if path == "telemetry.timeout_ms"));
	}
}
