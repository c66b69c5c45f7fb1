//! Startup-time resolution of optional collaborators.

// self
use crate::_prelude::*;

/// An optional process-wide collaborator, resolved once while the portal is wired.
///
/// Components capture the resolved value at construction time, so request handling never
/// re-checks whether a collaborator exists.
#[derive(Clone)]
pub enum Collaborator<T> {
	/// Deployment configuration provided the collaborator.
	Configured(T),
	/// Deployment configuration left the collaborator out.
	Absent,
}
impl<T> Collaborator<T> {
	/// Returns the collaborator, if configured.
	pub fn configured(&self) -> Option<&T> {
		match self {
			Self::Configured(value) => Some(value),
			Self::Absent => None,
		}
	}

	/// Whether the collaborator was configured.
	pub fn is_configured(&self) -> bool {
		matches!(self, Self::Configured(_))
	}

	/// Maps the configured value, keeping [`Collaborator::Absent`] as is.
	pub fn map<U>(self, f: impl FnOnce(T) -> U) -> Collaborator<U> {
		match self {
			Self::Configured(value) => Collaborator::Configured(f(value)),
			Self::Absent => Collaborator::Absent,
		}
	}

	/// Converts into an [`Option`].
	pub fn into_option(self) -> Option<T> {
		match self {
			Self::Configured(value) => Some(value),
			Self::Absent => None,
		}
	}
}
impl<T> Default for Collaborator<T> {
	fn default() -> Self {
		Self::Absent
	}
}
impl<T> From<Option<T>> for Collaborator<T> {
	fn from(value: Option<T>) -> Self {
		match value {
			Some(value) => Self::Configured(value),
			None => Self::Absent,
		}
	}
}
impl<T> Debug for Collaborator<T> {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		match self {
			Self::Configured(_) => f.write_str("Configured(..)"),
			Self::Absent => f.write_str("Absent"),
		}
	}
}
