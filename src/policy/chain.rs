//! The installed security chain: the selected policy plus the login flow that backs it.

// self
use crate::{
	_prelude::*,
	error::ConfigError,
	oidc::{LoginFlow, OidcUserFetcher},
	policy::{self, AuthorizationPolicy, Rule},
	provider::ClientRegistration,
	wiring::Collaborator,
};

/// Reasons the security chain refuses to assemble.
#[derive(Debug, ThisError)]
pub enum SecurityChainError {
	/// A policy without rules would deny every request.
	#[error("Authorization policy has no rules.")]
	EmptyRules,
	/// The policy demands authentication but no login flow is installed.
	#[error("Authorization policy requires login but no login flow is installed.")]
	MissingLoginFlow,
	/// A login flow was supplied for a policy that never authenticates.
	#[error("A login flow was supplied for the open policy.")]
	UnexpectedLoginFlow,
	/// A rule can never match because an earlier rule covers every path it does.
	#[error("Rule `{rule}` is unreachable behind `{by}`.")]
	ShadowedRule {
		/// Unreachable pattern.
		rule: String,
		/// Earlier pattern that swallows it.
		by: String,
	},
	/// An OIDC user fetcher is configured without a client registration to log in with.
	#[error("An OIDC user fetcher is configured but no client registration is.")]
	MissingClientRegistration,
	/// The login flow could not be built from the registration.
	#[error("OIDC login flow could not be built.")]
	LoginFlow {
		/// Underlying configuration failure.
		#[source]
		source: ConfigError,
	},
}

/// Policy and login flow installed for the lifetime of the process.
#[derive(Clone, Debug)]
pub struct SecurityChain {
	policy: AuthorizationPolicy,
	login: Option<Arc<LoginFlow>>,
}
impl SecurityChain {
	/// Validates and assembles a chain.
	pub fn build(
		policy: AuthorizationPolicy,
		login: Option<Arc<LoginFlow>>,
	) -> Result<Self, SecurityChainError> {
		validate_rules(policy.rules())?;

		match (policy.requires_login(), login.is_some()) {
			(true, false) => return Err(SecurityChainError::MissingLoginFlow),
			(false, true) => return Err(SecurityChainError::UnexpectedLoginFlow),
			_ => {},
		}

		Ok(Self { policy, login })
	}

	/// Selects the chain from the presence of the OIDC user fetcher.
	///
	/// A configured fetcher installs the OIDC policy and a login flow for `registration`; an
	/// absent one installs the open policy and ignores `registration`.
	pub fn select(
		fetcher: Collaborator<Arc<dyn OidcUserFetcher>>,
		registration: Option<ClientRegistration>,
		http: ReqwestClient,
	) -> Result<Self, SecurityChainError> {
		let policy = policy::select(&fetcher);
		let login = match fetcher {
			Collaborator::Configured(fetcher) => {
				let registration =
					registration.ok_or(SecurityChainError::MissingClientRegistration)?;
				let flow = LoginFlow::new(registration, fetcher, http)
					.map_err(|source| SecurityChainError::LoginFlow { source })?;

				Some(Arc::new(flow))
			},
			Collaborator::Absent => {
				if registration.is_some() {
					tracing::warn!("client registration is ignored without an OIDC user fetcher");
				}

				None
			},
		};
		let chain = Self::build(policy, login)?;

		match chain.login() {
			Some(flow) => tracing::info!(
				registration = %flow.registration().id(),
				"OIDC login enabled, `{}` requires authentication",
				policy::USER_PATH,
			),
			None => tracing::info!("no OIDC user fetcher configured, every path is open"),
		}

		Ok(chain)
	}

	/// Installed policy.
	pub fn policy(&self) -> &AuthorizationPolicy {
		&self.policy
	}

	/// Installed login flow, present exactly when the policy requires login.
	pub fn login(&self) -> Option<&Arc<LoginFlow>> {
		self.login.as_ref()
	}
}

fn validate_rules(rules: &[Rule]) -> Result<(), SecurityChainError> {
	if rules.is_empty() {
		return Err(SecurityChainError::EmptyRules);
	}

	for (idx, rule) in rules.iter().enumerate() {
		if let Some(earlier) = rules[..idx].iter().find(|earlier| earlier.pattern.covers(&rule.pattern)) {
			return Err(SecurityChainError::ShadowedRule {
				rule: rule.pattern.to_string(),
				by: earlier.pattern.to_string(),
			});
		}
	}

	Ok(())
}
