//! In-process [`TelemetrySink`] that records reports for tests and demos.

// std
use std::time::Duration as StdDuration;
// self
use crate::{
	_prelude::*,
	fault::Fault,
	telemetry::{TelemetryError, TelemetryFuture, TelemetrySink},
};

/// Thread-safe sink that keeps every reported fault in memory.
#[derive(Clone, Debug, Default)]
pub struct MemorySink {
	recorded: Arc<Mutex<Vec<Fault>>>,
	fail: bool,
}
impl MemorySink {
	/// A sink that records each report and then fails it.
	pub fn failing() -> Self {
		Self { recorded: Default::default(), fail: true }
	}

	/// Snapshot of the faults reported so far, in arrival order.
	pub fn recorded(&self) -> Vec<Fault> {
		self.recorded.lock().clone()
	}

	/// Polls until at least `count` reports arrived or `within` elapses.
	pub async fn wait_for(&self, count: usize, within: StdDuration) -> bool {
		let poll = async {
			while self.recorded.lock().len() < count {
				tokio::time::sleep(StdDuration::from_millis(5)).await;
			}
		};

		tokio::time::timeout(within, poll).await.is_ok()
	}
}
impl TelemetrySink for MemorySink {
	fn track_exception<'a>(&'a self, fault: &'a Fault) -> TelemetryFuture<'a> {
		self.recorded.lock().push(fault.clone());

		let fail = self.fail;

		Box::pin(async move {
			if fail {
				Err(TelemetryError::Sink { message: "memory sink configured to fail".into() })
			} else {
				Ok(())
			}
		})
	}
}
