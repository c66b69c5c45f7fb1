//! [`TelemetrySink`] that posts exception envelopes to an Application Insights style
//! ingestion endpoint described by a connection string.

// crates.io
use reqwest::header::CONTENT_TYPE;
use serde_json::json;
use time::format_description::well_known::Rfc3339;
// self
use crate::{
	_prelude::*,
	error::ConfigError,
	fault::Fault,
	telemetry::{TelemetryError, TelemetryFuture, TelemetrySink},
};

const DEFAULT_INGESTION_ENDPOINT: &str = "https://dc.services.visualstudio.com";
const TRACK_PATH: &str = "v2/track";
const ENVELOPE_NAME: &str = "Microsoft.ApplicationInsights.Exception";
// Severity level "Error" in the ingestion schema.
const SEVERITY_ERROR: u8 = 3;

/// Parsed `InstrumentationKey=...;IngestionEndpoint=...` connection string.
#[derive(Clone, PartialEq, Eq)]
pub struct ConnectionString {
	/// Instrumentation key that identifies the telemetry resource.
	pub instrumentation_key: String,
	/// Base URL of the ingestion service.
	pub ingestion_endpoint: Url,
}
impl ConnectionString {
	/// URL that receives tracked items.
	pub fn track_url(&self) -> Result<Url, ConfigError> {
		let mut base = self.ingestion_endpoint.clone();

		if !base.path().ends_with('/') {
			let path = format!("{}/", base.path());

			base.set_path(&path);
		}

		base.join(TRACK_PATH).map_err(|e| ConfigError::InvalidConnectionString {
			reason: format!("ingestion endpoint cannot be joined with the track path: {e}"),
		})
	}
}
impl FromStr for ConnectionString {
	type Err = ConfigError;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		let mut instrumentation_key = None;
		let mut ingestion_endpoint = None;

		for pair in s.split(';').map(str::trim).filter(|pair| !pair.is_empty()) {
			let Some((key, value)) = pair.split_once('=') else {
				return Err(ConfigError::InvalidConnectionString {
					reason: format!("segment `{pair}` is not a key=value pair"),
				});
			};
			let value = value.trim();

			if key.trim().eq_ignore_ascii_case("InstrumentationKey") {
				instrumentation_key = Some(value.to_owned());
			} else if key.trim().eq_ignore_ascii_case("IngestionEndpoint") {
				ingestion_endpoint = Some(Url::parse(value).map_err(|e| {
					ConfigError::InvalidConnectionString {
						reason: format!("IngestionEndpoint is not a URL: {e}"),
					}
				})?);
			}
		}

		let instrumentation_key = instrumentation_key.filter(|key| !key.is_empty()).ok_or_else(
			|| ConfigError::InvalidConnectionString { reason: "InstrumentationKey is missing".into() },
		)?;
		let ingestion_endpoint = match ingestion_endpoint {
			Some(url) => url,
			None => Url::parse(DEFAULT_INGESTION_ENDPOINT).map_err(|e| {
				ConfigError::InvalidConnectionString { reason: e.to_string() }
			})?,
		};

		Ok(Self { instrumentation_key, ingestion_endpoint })
	}
}
impl Debug for ConnectionString {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("ConnectionString")
			.field("instrumentation_key", &"<redacted>")
			.field("ingestion_endpoint", &self.ingestion_endpoint)
			.finish()
	}
}

/// Sink posting one exception envelope per report.
#[derive(Clone)]
pub struct IngestionSink {
	http: ReqwestClient,
	track_url: Url,
	instrumentation_key: String,
	role: Option<String>,
}
impl IngestionSink {
	/// Builds a sink for the provided connection string.
	pub fn new(http: ReqwestClient, connection: &ConnectionString) -> Result<Self, ConfigError> {
		Ok(Self {
			http,
			track_url: connection.track_url()?,
			instrumentation_key: connection.instrumentation_key.clone(),
			role: None,
		})
	}

	/// Tags every envelope with a cloud role name.
	pub fn with_role(mut self, role: impl Into<String>) -> Self {
		self.role = Some(role.into());

		self
	}

	/// Builds the JSON envelope for a fault observed at `time`.
	pub fn envelope(&self, fault: &Fault, time: OffsetDateTime) -> Result<serde_json::Value, TelemetryError> {
		let time = time.format(&Rfc3339).map_err(|e| TelemetryError::Sink { message: e.to_string() })?;
		let mut exceptions = vec![json!({
			"id": 0,
			"typeName": fault.kind,
			"message": fault.description(),
			"hasFullStack": false,
		})];

		for (idx, source) in fault.sources.iter().enumerate() {
			exceptions.push(json!({
				"id": idx + 1,
				"outerId": idx,
				"typeName": "source",
				"message": source,
				"hasFullStack": false,
			}));
		}

		let mut tags = serde_json::Map::new();

		if let Some(role) = &self.role {
			tags.insert("ai.cloud.role".into(), json!(role));
		}

		Ok(json!({
			"name": ENVELOPE_NAME,
			"time": time,
			"iKey": self.instrumentation_key,
			"tags": tags,
			"data": {
				"baseType": "ExceptionData",
				"baseData": {
					"ver": 2,
					"severityLevel": SEVERITY_ERROR,
					"exceptions": exceptions,
				},
			},
		}))
	}
}
impl TelemetrySink for IngestionSink {
	fn track_exception<'a>(&'a self, fault: &'a Fault) -> TelemetryFuture<'a> {
		Box::pin(async move {
			let body = serde_json::to_vec(&self.envelope(fault, OffsetDateTime::now_utc())?)?;
			let response = self
				.http
				.post(self.track_url.clone())
				.header(CONTENT_TYPE, "application/json")
				.body(body)
				.send()
				.await?;
			let status = response.status();

			if status.is_success() {
				Ok(())
			} else {
				Err(TelemetryError::Rejected { status: status.as_u16() })
			}
		})
	}
}
impl Debug for IngestionSink {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("IngestionSink")
			.field("track_url", &self.track_url)
			.field("role", &self.role)
			.finish()
	}
}
