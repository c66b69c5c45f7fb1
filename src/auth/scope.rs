//! Scope sets requested during the OIDC login flow.

// std
use std::collections::BTreeSet;
// crates.io
use serde::{Deserializer, Serializer, de::Error as DeError};
// self
use crate::_prelude::*;

/// Scope that turns a plain OAuth 2.0 authorization request into an OpenID Connect one.
pub const OPENID_SCOPE: &str = "openid";

/// Errors emitted when validating scopes.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, ThisError)]
pub enum ScopeValidationError {
	/// Empty scope entries are not allowed.
	#[error("Scope entries cannot be empty.")]
	Empty,
	/// Scopes cannot contain embedded whitespace characters.
	#[error("Scope contains whitespace: {scope}.")]
	ContainsWhitespace {
		/// The offending scope string.
		scope: String,
	},
}

/// Sorted, deduplicated scope list.
///
/// Serializes as the space-delimited wire form so it can be read from a single environment
/// variable and written straight into an authorization request.
#[derive(Clone, Default, PartialEq, Eq, Hash)]
pub struct ScopeSet(Arc<[String]>);
impl ScopeSet {
	/// Creates a normalized scope set from any iterator.
	pub fn new<I, S>(scopes: I) -> Result<Self, ScopeValidationError>
	where
		I: IntoIterator<Item = S>,
		S: Into<String>,
	{
		let mut set = BTreeSet::new();

		for scope in scopes {
			let owned: String = scope.into();

			if owned.is_empty() {
				return Err(ScopeValidationError::Empty);
			}
			if owned.chars().any(char::is_whitespace) {
				return Err(ScopeValidationError::ContainsWhitespace { scope: owned });
			}

			set.insert(owned);
		}

		Ok(Self(set.into_iter().collect::<Vec<_>>().into()))
	}

	/// The `openid profile email` set most providers expect for a login.
	pub fn openid_default() -> Self {
		Self(
			["email", OPENID_SCOPE, "profile"]
				.into_iter()
				.map(str::to_owned)
				.collect::<Vec<_>>()
				.into(),
		)
	}

	/// Returns a copy that is guaranteed to contain [`OPENID_SCOPE`].
	pub fn with_openid(&self) -> Self {
		if self.contains(OPENID_SCOPE) {
			return self.clone();
		}

		let mut scopes = self.0.to_vec();

		scopes.push(OPENID_SCOPE.into());
		scopes.sort();

		Self(scopes.into())
	}

	/// Number of distinct scopes.
	pub fn len(&self) -> usize {
		self.0.len()
	}

	/// Returns true if no scopes are defined.
	pub fn is_empty(&self) -> bool {
		self.0.is_empty()
	}

	/// Returns true if the set contains the provided scope.
	pub fn contains(&self, scope: &str) -> bool {
		self.0.binary_search_by(|candidate| candidate.as_str().cmp(scope)).is_ok()
	}

	/// Iterator over normalized scopes.
	pub fn iter(&self) -> impl Iterator<Item = &str> {
		self.0.iter().map(String::as_str)
	}

	/// Space-delimited wire representation.
	pub fn normalized(&self) -> String {
		self.0.join(" ")
	}
}
impl Debug for ScopeSet {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_tuple("ScopeSet").field(&self.0).finish()
	}
}
impl Display for ScopeSet {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(&self.normalized())
	}
}
impl FromStr for ScopeSet {
	type Err = ScopeValidationError;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		if s.is_empty() {
			return Ok(Self::default());
		}
		if s.chars().all(char::is_whitespace) {
			return Err(ScopeValidationError::Empty);
		}

		Self::new(s.split_whitespace())
	}
}
impl Serialize for ScopeSet {
	fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
	where
		S: Serializer,
	{
		serializer.serialize_str(&self.normalized())
	}
}
impl<'de> Deserialize<'de> for ScopeSet {
	fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
	where
		D: Deserializer<'de>,
	{
		let raw = String::deserialize(deserializer)?;

		raw.parse().map_err(DeError::custom)
	}
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	#[test]
	fn scopes_normalize_and_dedupe() {
		let lhs = ScopeSet::new(["profile", "openid", "profile"])
			.expect("Left-hand scope set should be valid.");
		let rhs = ScopeSet::from_str("openid profile").expect("Scope string should parse.");

		assert_eq!(lhs, rhs);
		assert_eq!(lhs.normalized(), "openid profile");
	}

	#[test]
	fn with_openid_adds_the_scope_once() {
		let scopes = ScopeSet::from_str("email").expect("Scope string should parse.");
		let upgraded = scopes.with_openid();

		assert!(upgraded.contains(OPENID_SCOPE));
		assert_eq!(upgraded.normalized(), "email openid");
		assert_eq!(upgraded.with_openid(), upgraded);
	}

	#[test]
	fn whitespace_only_input_is_rejected() {
		assert!(ScopeSet::from_str("").expect("Empty input is an empty set.").is_empty());
		assert!(ScopeSet::from_str("   ").is_err());
		assert!(matches!(
			ScopeSet::new(["bad scope"]),
			Err(ScopeValidationError::ContainsWhitespace { .. })
		));
	}

	#[test]
	fn serde_uses_the_wire_form() {
		let scopes: ScopeSet = serde_json::from_str("\"profile openid\"")
			.expect("Space-delimited scopes should deserialize.");

		assert_eq!(
			serde_json::to_string(&scopes).expect("Scopes should serialize."),
			"\"openid profile\""
		);
		assert_eq!(ScopeSet::openid_default().normalized(), "email openid profile");
	}
}
