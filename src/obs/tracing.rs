// self
use crate::{_prelude::*, obs::FlowKind};

/// Type alias that resolves to an instrumented future when tracing is enabled.
#[cfg(feature = "tracing")]
pub type InstrumentedFlow<F> = tracing::instrument::Instrumented<F>;
/// Passthrough future type when tracing is disabled.
#[cfg(not(feature = "tracing"))]
pub type InstrumentedFlow<F> = F;

/// A span builder used by acquisitions, solves, and tool calls.
#[derive(Clone, Debug)]
pub struct FlowSpan {
	#[cfg(feature = "tracing")]
	span: tracing::Span,
}
impl FlowSpan {
	/// Creates a new span tagged with the provided flow kind + stage.
	pub fn new(kind: FlowKind, stage: &'static str) -> Self {
		#[cfg(feature = "tracing")]
		{
			let span = tracing::info_span!("seo_mcp.flow", flow = kind.as_str(), stage);

			Self { span }
		}
		#[cfg(not(feature = "tracing"))]
		{
			let _ = (kind, stage);

			Self {}
		}
	}

	/// Instruments an async block without holding a guard across `.await` points.
	pub fn instrument<Fut>(&self, fut: Fut) -> InstrumentedFlow<Fut>
	where
		Fut: Future,
	{
		#[cfg(feature = "tracing")]
		{
			use tracing::Instrument;

			fut.instrument(self.span.clone())
		}
		#[cfg(not(feature = "tracing"))]
		{
			fut
		}
	}
}

/// Emits a warning when a challenge provider fails and the selector moves on.
pub fn provider_failed(provider: &str, reason: &dyn Display) {
	#[cfg(feature = "tracing")]
	{
		tracing::warn!(provider, %reason, "challenge provider failed");
	}
	#[cfg(not(feature = "tracing"))]
	{
		let _ = (provider, reason);
	}
}

/// Warns once at startup when no challenge provider has a key.
pub fn challenge_unconfigured() {
	#[cfg(feature = "tracing")]
	{
		tracing::warn!(
			"no CAPTCHA provider configured; only AI query generation and cached backlinks will work"
		);
	}
}

/// Emits a trace event for each poll of a pending challenge task.
pub fn poll_pending(provider: &str, attempt: u32) {
	#[cfg(feature = "tracing")]
	{
		tracing::trace!(provider, attempt, "challenge task still pending");
	}
	#[cfg(not(feature = "tracing"))]
	{
		let _ = (provider, attempt);
	}
}

/// Records whether a signature lookup hit the cache.
pub fn cache_lookup(target: &dyn Display, outcome: &'static str) {
	#[cfg(feature = "tracing")]
	{
		tracing::debug!(%target, outcome, "signature cache lookup");
	}
	#[cfg(not(feature = "tracing"))]
	{
		let _ = (target, outcome);
	}
}

/// Emits a warning when the language model output could not be used.
pub fn upstream_degraded(source: &str, reason: &dyn Display) {
	#[cfg(feature = "tracing")]
	{
		tracing::warn!(source, %reason, "upstream response degraded to an empty result");
	}
	#[cfg(not(feature = "tracing"))]
	{
		let _ = (source, reason);
	}
}
