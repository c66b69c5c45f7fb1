//! Strongly typed identifiers for client registrations and authenticated subjects.

// std
use std::{borrow::Borrow, ops::Deref};
// self
use crate::_prelude::*;

macro_rules! def_id {
	($name:ident, $doc:literal, $kind:literal, $max:expr) => {
		#[doc = $doc]
		#[derive(Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
		#[serde(try_from = "String", into = "String")]
		pub struct $name(String);
		impl $name {
			/// Creates a new identifier after validation.
			pub fn new(value: impl AsRef<str>) -> Result<Self, IdentifierError> {
				let view = value.as_ref();

				validate_view($kind, $max, view)?;

				Ok(Self(view.to_owned()))
			}
		}
		impl Deref for $name {
			type Target = str;

			fn deref(&self) -> &Self::Target {
				&self.0
			}
		}
		impl AsRef<str> for $name {
			fn as_ref(&self) -> &str {
				&self.0
			}
		}
		impl Borrow<str> for $name {
			fn borrow(&self) -> &str {
				&self.0
			}
		}
		impl From<$name> for String {
			fn from(value: $name) -> Self {
				value.0
			}
		}
		impl TryFrom<String> for $name {
			type Error = IdentifierError;

			fn try_from(value: String) -> Result<Self, Self::Error> {
				validate_view($kind, $max, &value)?;

				Ok(Self(value))
			}
		}
		impl Debug for $name {
			fn fmt(&self, f: &mut Formatter) -> FmtResult {
				write!(f, concat!($kind, "({})"), self.0)
			}
		}
		impl Display for $name {
			fn fmt(&self, f: &mut Formatter) -> FmtResult {
				f.write_str(&self.0)
			}
		}
		impl FromStr for $name {
			type Err = IdentifierError;

			fn from_str(s: &str) -> Result<Self, Self::Err> {
				Self::new(s)
			}
		}
	};
}

/// Error returned when identifier validation fails.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, ThisError)]
pub enum IdentifierError {
	/// The identifier was empty.
	#[error("{kind} identifier cannot be empty.")]
	Empty {
		/// Kind of identifier (registration, subject).
		kind: &'static str,
	},
	/// The identifier contains whitespace characters.
	#[error("{kind} identifier contains whitespace.")]
	ContainsWhitespace {
		/// Kind of identifier (registration, subject).
		kind: &'static str,
	},
	/// The identifier exceeded the allowed character count.
	#[error("{kind} identifier exceeds {max} characters.")]
	TooLong {
		/// Kind of identifier (registration, subject).
		kind: &'static str,
		/// Maximum permitted character count.
		max: usize,
	},
}

// Registrations appear in route segments, so they stay short.
def_id! { RegistrationId, "Identifier of a configured OIDC client registration.", "Registration", 64 }
// OpenID Connect caps `sub` at 255 ASCII characters.
def_id! { SubjectId, "Provider-issued `sub` claim of an authenticated end-user.", "Subject", 255 }

impl RegistrationId {
	/// Registration name used when configuration does not provide one.
	pub const DEFAULT: &'static str = "oidc";
}

fn validate_view(kind: &'static str, max: usize, view: &str) -> Result<(), IdentifierError> {
	if view.is_empty() {
		return Err(IdentifierError::Empty { kind });
	}
	if view.chars().any(char::is_whitespace) {
		return Err(IdentifierError::ContainsWhitespace { kind });
	}
	if view.len() > max {
		return Err(IdentifierError::TooLong { kind, max });
	}

	Ok(())
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	#[test]
	fn registration_ids_reject_whitespace_and_empty_values() {
		assert!(RegistrationId::new("").is_err());
		assert!(RegistrationId::new("azure ad").is_err());

		let id = RegistrationId::new(RegistrationId::DEFAULT)
			.expect("The default registration name should be valid.");

		assert_eq!(id.as_ref(), "oidc");
		assert_eq!(format!("{id:?}"), "Registration(oidc)");
	}

	#[test]
	fn subject_length_follows_the_claim_limit() {
		SubjectId::new("a".repeat(255)).expect("A 255 character subject should be accepted.");

		let err = SubjectId::new("a".repeat(256)).expect_err("Oversized subjects must fail.");

		assert_eq!(err, IdentifierError::TooLong { kind: "Subject", max: 255 });
	}

	#[test]
	fn serde_enforces_validation() {
		let id: SubjectId =
			serde_json::from_str("\"248289761001\"").expect("Subject should deserialize.");

		assert_eq!(&*id, "248289761001");
		assert!(serde_json::from_str::<SubjectId>("\"\"").is_err());
	}
}
