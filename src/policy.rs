//! Request authorization: ordered first-match-wins rules and the startup-time policy choice.
//!
//! Exactly two policies exist. With an OIDC user fetcher configured, `/user` requires an
//! authenticated principal and every other path is open; without one, every path is open.
//! [`select`] makes the choice once; [`SecurityChain`] pairs the chosen policy with the login
//! flow and refuses inconsistent pairings so startup fails instead of serving a half-secured
//! portal.

pub mod chain;

pub use chain::*;

// self
use crate::{_prelude::*, wiring::Collaborator};

/// Path that requires authentication while OIDC login is enabled.
pub const USER_PATH: &str = "/user";
/// Pattern matching every path.
pub const CATCH_ALL: &str = "/**";

/// Errors raised while parsing path patterns.
#[derive(Clone, Debug, PartialEq, Eq, ThisError)]
pub enum PatternError {
	/// Patterns must start with `/`.
	#[error("Path pattern `{pattern}` must start with `/`.")]
	NotAbsolute {
		/// Offending pattern.
		pattern: String,
	},
	/// Only a trailing `/**` wildcard is supported.
	#[error("Path pattern `{pattern}` uses an unsupported wildcard.")]
	UnsupportedWildcard {
		/// Offending pattern.
		pattern: String,
	},
}

/// Path matcher in the `/exact`, `/prefix/**`, `/**` style.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum PathPattern {
	/// Matches one normalized path.
	Exact(String),
	/// Matches a normalized path and everything below it.
	Prefix(String),
	/// Matches every path.
	Any,
}
impl PathPattern {
	/// Whether `path` matches the pattern after normalization.
	pub fn matches(&self, path: &str) -> bool {
		self.matches_normalized(&normalize_path(path))
	}

	/// Whether every path matched by `other` is also matched by `self`.
	pub fn covers(&self, other: &PathPattern) -> bool {
		match (self, other) {
			(PathPattern::Any, _) => true,
			(_, PathPattern::Any) => false,
			(PathPattern::Prefix(base), PathPattern::Prefix(path) | PathPattern::Exact(path)) =>
				is_under(base, path),
			(PathPattern::Exact(lhs), PathPattern::Exact(rhs)) => lhs == rhs,
			(PathPattern::Exact(_), PathPattern::Prefix(_)) => false,
		}
	}

	fn matches_normalized(&self, path: &str) -> bool {
		match self {
			PathPattern::Exact(expected) => path == expected,
			PathPattern::Prefix(base) => is_under(base, path),
			PathPattern::Any => true,
		}
	}
}
impl FromStr for PathPattern {
	type Err = PatternError;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		if !s.starts_with('/') {
			return Err(PatternError::NotAbsolute { pattern: s.to_owned() });
		}
		if s == CATCH_ALL {
			return Ok(PathPattern::Any);
		}

		let (base, prefix) = match s.strip_suffix("/**") {
			Some(base) => (base, true),
			None => (s, false),
		};

		if base.contains('*') {
			return Err(PatternError::UnsupportedWildcard { pattern: s.to_owned() });
		}

		let base = normalize_path(base);

		Ok(if prefix { PathPattern::Prefix(base) } else { PathPattern::Exact(base) })
	}
}
impl Display for PathPattern {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		match self {
			PathPattern::Exact(path) => f.write_str(path),
			PathPattern::Prefix(base) if base == "/" => f.write_str(CATCH_ALL),
			PathPattern::Prefix(base) => write!(f, "{base}/**"),
			PathPattern::Any => f.write_str(CATCH_ALL),
		}
	}
}

/// Access requirement attached to a rule.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Access {
	/// Anonymous requests are allowed.
	PermitAll,
	/// An authenticated principal is required.
	Authenticated,
}

/// One `(matcher, access)` pair.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Rule {
	/// Paths the rule applies to.
	pub pattern: PathPattern,
	/// Requirement for matching paths.
	pub access: Access,
}
impl Rule {
	/// Parses `pattern` and pairs it with `access`.
	pub fn new(pattern: &str, access: Access) -> Result<Self, PatternError> {
		Ok(Self { pattern: pattern.parse()?, access })
	}

	/// Rule requiring authentication for `pattern`.
	pub fn authenticated(pattern: PathPattern) -> Self {
		Self { pattern, access: Access::Authenticated }
	}

	/// Rule permitting anonymous access to `pattern`.
	pub fn permit_all(pattern: PathPattern) -> Self {
		Self { pattern, access: Access::PermitAll }
	}
}

/// Outcome of evaluating a request against a policy.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Decision {
	/// Let the request through.
	Permit,
	/// Authentication is required first.
	Challenge,
	/// No rule matched the path.
	Deny,
}
impl Decision {
	/// Returns a stable label suitable for span or metric fields.
	pub const fn as_str(self) -> &'static str {
		match self {
			Decision::Permit => "permit",
			Decision::Challenge => "challenge",
			Decision::Deny => "deny",
		}
	}
}

/// The two authorization policies the portal can run with.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum AuthorizationPolicy {
	/// OIDC login installed: `/user` requires authentication, everything else is open.
	Oidc {
		/// Ordered rules.
		rules: Vec<Rule>,
	},
	/// No OIDC provider: everything is open.
	Open {
		/// Ordered rules.
		rules: Vec<Rule>,
	},
}
impl AuthorizationPolicy {
	/// The OIDC-enabled policy; the `/user` rule precedes the catch-all.
	pub fn oidc() -> Self {
		Self::Oidc {
			rules: vec![
				Rule::authenticated(PathPattern::Exact(USER_PATH.into())),
				Rule::permit_all(PathPattern::Any),
			],
		}
	}

	/// The open policy.
	pub fn open() -> Self {
		Self::Open { rules: vec![Rule::permit_all(PathPattern::Any)] }
	}

	/// Rules in evaluation order.
	pub fn rules(&self) -> &[Rule] {
		match self {
			Self::Oidc { rules } | Self::Open { rules } => rules,
		}
	}

	/// Whether a login flow must accompany the policy.
	pub fn requires_login(&self) -> bool {
		matches!(self, Self::Oidc { .. })
	}

	/// Evaluates `path` against the rules; the first matching rule decides.
	pub fn evaluate(&self, path: &str, authenticated: bool) -> Decision {
		let path = normalize_path(path);

		match self.rules().iter().find(|rule| rule.pattern.matches_normalized(&path)) {
			Some(Rule { access: Access::PermitAll, .. }) => Decision::Permit,
			Some(Rule { access: Access::Authenticated, .. }) if authenticated => Decision::Permit,
			Some(Rule { access: Access::Authenticated, .. }) => Decision::Challenge,
			None => Decision::Deny,
		}
	}
}

/// Chooses the policy from the presence of the OIDC user fetcher.
pub fn select<T>(fetcher: &Collaborator<T>) -> AuthorizationPolicy {
	match fetcher {
		Collaborator::Configured(_) => AuthorizationPolicy::oidc(),
		Collaborator::Absent => AuthorizationPolicy::open(),
	}
}

/// Collapses empty and `.` segments and resolves `..` so `/a/../user` cannot dodge `/user`.
pub fn normalize_path(path: &str) -> String {
	let path = path.split(['?', '#']).next().unwrap_or_default();
	let mut segments = Vec::new();

	for segment in path.split('/') {
		match segment {
			"" | "." => {},
			".." => {
				segments.pop();
			},
			segment => segments.push(segment),
		}
	}

	format!("/{}", segments.join("/"))
}

fn is_under(base: &str, path: &str) -> bool {
	base == "/"
		|| path == base
		|| path.strip_prefix(base).is_some_and(|rest| rest.starts_with('/'))
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	#[test]
	fn patterns_parse_the_supported_forms() {
		assert_eq!(PathPattern::from_str("/**"), Ok(PathPattern::Any));
		assert_eq!(PathPattern::from_str("/user"), Ok(PathPattern::Exact("/user".into())));
		assert_eq!(PathPattern::from_str("/api/**"), Ok(PathPattern::Prefix("/api".into())));
		assert!(matches!(PathPattern::from_str("user"), Err(PatternError::NotAbsolute { .. })));
		assert!(matches!(
			PathPattern::from_str("/a/*/b"),
			Err(PatternError::UnsupportedWildcard { .. })
		));
		assert_eq!(PathPattern::Prefix("/api".into()).to_string(), "/api/**");
	}

	#[test]
	fn prefixes_respect_segment_boundaries() {
		let api = PathPattern::Prefix("/api".into());

		assert!(api.matches("/api"));
		assert!(api.matches("/api/v1/items"));
		assert!(!api.matches("/apiary"));
	}

	#[test]
	fn normalization_resolves_dot_segments() {
		assert_eq!(normalize_path("//user"), "/user");
		assert_eq!(normalize_path("/static/../user/"), "/user");
		assert_eq!(normalize_path("/./user?x=1"), "/user");
		assert_eq!(normalize_path("/../.."), "/");
	}

	#[test]
	fn open_policy_permits_everything() {
		let policy = select(&Collaborator::<()>::Absent);

		assert_eq!(policy, AuthorizationPolicy::open());
		assert!(!policy.requires_login());
		assert_eq!(policy.evaluate(USER_PATH, false), Decision::Permit);
		assert_eq!(policy.evaluate("/anything/else", false), Decision::Permit);
	}

	#[test]
	fn oidc_policy_challenges_only_the_user_path() {
		let policy = select(&Collaborator::Configured(()));

		assert!(policy.requires_login());
		assert_eq!(policy.evaluate(USER_PATH, false), Decision::Challenge);
		assert_eq!(policy.evaluate("/static/../user", false), Decision::Challenge);
		assert_eq!(policy.evaluate(USER_PATH, true), Decision::Permit);
		assert_eq!(policy.evaluate("/", false), Decision::Permit);
		assert_eq!(policy.evaluate("/user/settings", false), Decision::Permit);
	}

	#[test]
	fn first_matching_rule_wins() {
		let shadowed = AuthorizationPolicy::Oidc {
			rules: vec![
				Rule::permit_all(PathPattern::Any),
				Rule::authenticated(PathPattern::Exact(USER_PATH.into())),
			],
		};

		assert_eq!(shadowed.evaluate(USER_PATH, false), Decision::Permit);
	}

	#[test]
	fn unmatched_paths_are_denied() {
		let policy = AuthorizationPolicy::Open {
			rules: vec![Rule::new("/public/**", Access::PermitAll).expect("Rule should parse.")],
		};

		assert_eq!(policy.evaluate("/public/logo.png", false), Decision::Permit);
		assert_eq!(policy.evaluate("/private", true), Decision::Deny);
	}

	#[test]
	fn coverage_detects_shadowing() {
		let any = PathPattern::Any;
		let api = PathPattern::Prefix("/api".into());
		let user = PathPattern::Exact("/api/user".into());

		assert!(any.covers(&user));
		assert!(api.covers(&user));
		assert!(!user.covers(&api));
		assert!(!api.covers(&any));
	}
}
