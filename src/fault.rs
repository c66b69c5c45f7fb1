//! Faults raised while handling a request and the context handed to the error presenter.

// std
use std::any;
// self
use crate::_prelude::*;

/// An error raised during request processing, reduced to what the error page and telemetry
/// need: a type label, an optional human-readable description, and the source chain.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Fault {
	/// Type label reported to telemetry, e.g. `std::io::Error`.
	pub kind: String,
	/// Human-readable description, if the fault carries one.
	pub description: Option<String>,
	/// Descriptions of the chained `source()` errors, outermost first.
	pub sources: Vec<String>,
}
impl Fault {
	/// Creates a fault with the provided type label and no description.
	pub fn new(kind: impl Into<String>) -> Self {
		Self { kind: kind.into(), description: None, sources: Vec::new() }
	}

	/// Attaches a description.
	pub fn with_description(mut self, description: impl Into<String>) -> Self {
		self.description = Some(description.into());

		self
	}

	/// Captures an error, its `Display` output, and its source chain.
	pub fn from_error<E>(error: &E) -> Self
	where
		E: ?Sized + StdError,
	{
		let mut sources = Vec::new();
		let mut next = error.source();

		while let Some(source) = next {
			sources.push(source.to_string());

			next = source.source();
		}

		Self {
			kind: any::type_name::<E>().to_owned(),
			description: Some(error.to_string()),
			sources,
		}
	}

	/// Captures the payload of a panic raised by a handler.
	pub fn from_panic(payload: &(dyn any::Any + Send)) -> Self {
		let description = if let Some(message) = payload.downcast_ref::<&str>() {
			Some((*message).to_owned())
		} else {
			payload.downcast_ref::<String>().cloned()
		};

		Self { kind: "panic".into(), description, sources: Vec::new() }
	}

	/// Description shown on the error page; empty when the fault carries none.
	pub fn description(&self) -> &str {
		self.description.as_deref().unwrap_or_default()
	}
}
impl Display for Fault {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		match &self.description {
			Some(description) => write!(f, "{}: {description}", self.kind),
			None => f.write_str(&self.kind),
		}
	}
}

/// Per-request input of the error presenter.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ErrorContext {
	/// HTTP status the failed request terminated with.
	pub status: u16,
	/// Fault that caused the failure, if any.
	pub cause: Option<Fault>,
}
impl ErrorContext {
	/// Context for a failure without a cause (e.g. a plain 404).
	pub fn new(status: u16) -> Self {
		Self { status, cause: None }
	}

	/// Attaches (or clears) the causing fault.
	pub fn with_cause(mut self, cause: impl Into<Option<Fault>>) -> Self {
		self.cause = cause.into();

		self
	}
}

#[cfg(test)]
mod tests {
	// std
	use std::io;
	// self
	use super::*;

	#[derive(Debug, ThisError)]
	#[error("upload failed")]
	struct UploadError {
		#[source]
		source: io::Error,
	}

	#[test]
	fn from_error_keeps_description_and_chain() {
		let error = UploadError { source: io::Error::other("disk full") };
		let fault = Fault::from_error(&error);

		assert!(fault.kind.ends_with("UploadError"));
		assert_eq!(fault.description(), "upload failed");
		assert_eq!(fault.sources, vec!["disk full".to_owned()]);
	}

	#[test]
	fn missing_description_reads_as_empty() {
		let fault = Fault::new("NullPointer");

		assert_eq!(fault.description(), "");
		assert_eq!(fault.to_string(), "NullPointer");
	}

	#[test]
	fn panic_payloads_become_descriptions() {
		let payload: Box<dyn any::Any + Send> = Box::new("index out of bounds");
		let fault = Fault::from_panic(payload.as_ref());

		assert_eq!(fault.kind, "panic");
		assert_eq!(fault.description(), "index out of bounds");

		let payload: Box<dyn any::Any + Send> = Box::new(42_u8);

		assert_eq!(Fault::from_panic(payload.as_ref()).description(), "");
	}

	#[test]
	fn context_builder_attaches_causes() {
		let ctx = ErrorContext::new(500).with_cause(Fault::new("Io").with_description("disk full"));

		assert_eq!(ctx.status, 500);
		assert_eq!(ctx.cause.as_ref().map(Fault::description), Some("disk full"));
		assert_eq!(ErrorContext::new(404).with_cause(None::<Fault>).cause, None);
	}
}
