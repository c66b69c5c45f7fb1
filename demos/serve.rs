//! Serves a tiny portal configured from `PORTAL_*` variables.
//!
//! `/` answers with a greeting, `/boom` fails so the error page (and telemetry, when a
//! connection string is set) can be seen in action. Set the `PORTAL_OIDC__*` variables to put
//! `/user` behind an OIDC login.

// std
use std::io;
// crates.io
use axum::{Router, routing::get};
use color_eyre::Result;
use tracing_subscriber::EnvFilter;
// self
use oauth2_portal::{config::PortalConfig, web::{self, PortalError}};

async fn index() -> &'static str {
	"Hello from the portal. Try /user, /boom, or /missing."
}

async fn boom() -> Result<&'static str, PortalError> {
	Err(io::Error::other("the demo disk is full").into())
}

#[tokio::main]
async fn main() -> Result<()> {
	color_eyre::install()?;
	tracing_subscriber::fmt()
		.with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
		.init();

	let config = PortalConfig::from_env()?;
	let routes = Router::new().route("/", get(index)).route("/boom", get(boom));

	println!("Listening on http://{}.", config.bind);

	web::serve(config, routes).await?;

	Ok(())
}
