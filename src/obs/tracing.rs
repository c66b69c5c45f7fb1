// self
use crate::{_prelude::*, obs::Component};

/// A span builder used around portal components.
#[derive(Clone, Debug)]
pub struct PortalSpan {
	span: tracing::Span,
}
impl PortalSpan {
	/// Creates a new span tagged with the provided component + stage.
	pub fn new(component: Component, stage: &'static str) -> Self {
		let span = tracing::info_span!("oauth2_portal.request", component = component.as_str(), stage);

		Self { span }
	}

	/// Enters the span for synchronous sections.
	pub fn entered(self) -> tracing::span::EnteredSpan {
		self.span.entered()
	}

	/// Instruments an async block without holding a guard across `.await` points.
	pub fn instrument<Fut>(&self, fut: Fut) -> tracing::instrument::Instrumented<Fut>
	where
		Fut: Future,
	{
		use tracing::Instrument;

		fut.instrument(self.span.clone())
	}
}
