//! Exception telemetry: the sink contract, bounded fire-and-forget dispatch, and built-in sinks.
//!
//! The error presenter never waits for a sink. [`TelemetryDispatcher::dispatch`] spawns the
//! report onto the current tokio runtime, bounds it with a timeout, and swallows (but logs and
//! counts) every failure so the error page is rendered identically whether or not reporting
//! works.

pub mod ingestion;
pub mod memory;

pub use ingestion::*;
pub use memory::*;

// std
use std::time::Duration as StdDuration;
// crates.io
use tokio::{runtime::Handle, task::JoinHandle};
// self
use crate::{
	_prelude::*,
	error::BoxError,
	fault::Fault,
	obs::{self, Component, PortalSpan},
};

/// Boxed future returned by [`TelemetrySink::track_exception`].
pub type TelemetryFuture<'a> = Pin<Box<dyn Future<Output = Result<(), TelemetryError>> + 'a + Send>>;

/// Destination for exception reports.
pub trait TelemetrySink
where
	Self: Send + Sync,
{
	/// Reports a fault. The returned value is only inspected for logging.
	fn track_exception<'a>(&'a self, fault: &'a Fault) -> TelemetryFuture<'a>;
}

/// Failures raised by telemetry sinks.
#[derive(Debug, ThisError)]
pub enum TelemetryError {
	/// The sink could not reach its backend.
	#[error("Telemetry backend is unreachable.")]
	Transport {
		/// Underlying transport failure.
		#[source]
		source: BoxError,
	},
	/// The backend answered with a non-success status.
	#[error("Telemetry backend rejected the report with HTTP {status}.")]
	Rejected {
		/// HTTP status returned by the backend.
		status: u16,
	},
	/// The report could not be encoded.
	#[error("Telemetry report could not be encoded.")]
	Encode(#[from] serde_json::Error),
	/// Sink-specific failure.
	#[error("Telemetry sink failed: {message}.")]
	Sink {
		/// Human-readable failure.
		message: String,
	},
}
impl From<ReqwestError> for TelemetryError {
	fn from(e: ReqwestError) -> Self {
		Self::Transport { source: Box::new(e) }
	}
}

/// How a single dispatch settled.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum DispatchOutcome {
	/// The sink accepted the report.
	Delivered,
	/// The sink returned an error.
	Failed,
	/// The sink did not settle within the dispatch timeout.
	TimedOut,
	/// No tokio runtime was available to run the report on.
	Skipped,
}
impl DispatchOutcome {
	/// Returns a stable label suitable for span or metric fields.
	pub const fn as_str(self) -> &'static str {
		match self {
			DispatchOutcome::Delivered => "delivered",
			DispatchOutcome::Failed => "failed",
			DispatchOutcome::TimedOut => "timed_out",
			DispatchOutcome::Skipped => "skipped",
		}
	}
}

/// Handle to an in-flight dispatch; dropping it does not cancel the report.
#[derive(Debug)]
pub struct DispatchHandle(Option<JoinHandle<DispatchOutcome>>);
impl DispatchHandle {
	/// Waits until the report settles.
	pub async fn settled(self) -> DispatchOutcome {
		match self.0 {
			Some(task) => task.await.unwrap_or(DispatchOutcome::Failed),
			None => DispatchOutcome::Skipped,
		}
	}
}

/// Bounded fire-and-forget dispatcher wrapping a configured sink.
#[derive(Clone)]
pub struct TelemetryDispatcher {
	sink: Arc<dyn TelemetrySink>,
	timeout: StdDuration,
}
impl TelemetryDispatcher {
	/// Upper bound for a single report unless overridden.
	pub const DEFAULT_TIMEOUT: StdDuration = StdDuration::from_secs(5);

	/// Wraps a sink with the default timeout.
	pub fn new(sink: Arc<dyn TelemetrySink>) -> Self {
		Self { sink, timeout: Self::DEFAULT_TIMEOUT }
	}

	/// Overrides the per-report timeout.
	pub fn with_timeout(mut self, timeout: StdDuration) -> Self {
		self.timeout = timeout;

		self
	}

	/// Starts reporting `fault` in the background and returns immediately.
	pub fn dispatch(&self, fault: Fault) -> DispatchHandle {
		let Ok(runtime) = Handle::try_current() else {
			tracing::warn!(kind = %fault.kind, "no async runtime available, exception report skipped");
			obs::record_telemetry_dispatch(DispatchOutcome::Skipped);

			return DispatchHandle(None);
		};
		let sink = Arc::clone(&self.sink);
		let timeout = self.timeout;
		let span = PortalSpan::new(Component::Telemetry, "track_exception");
		let task = runtime.spawn(span.instrument(async move {
			let outcome = match tokio::time::timeout(timeout, sink.track_exception(&fault)).await {
				Ok(Ok(())) => DispatchOutcome::Delivered,
				Ok(Err(e)) => {
					tracing::warn!(kind = %fault.kind, error = %e, "exception report failed");

					DispatchOutcome::Failed
				},
				Err(_) => {
					tracing::warn!(kind = %fault.kind, ?timeout, "exception report timed out");

					DispatchOutcome::TimedOut
				},
			};

			obs::record_telemetry_dispatch(outcome);

			outcome
		}));

		DispatchHandle(Some(task))
	}
}
impl Debug for TelemetryDispatcher {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("TelemetryDispatcher").field("timeout", &self.timeout).finish()
	}
}
