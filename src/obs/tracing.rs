// crates.io
use tracing::{Instrument, instrument::Instrumented};
use tracing_subscriber::{EnvFilter, fmt, prelude::*};
// self
use crate::{_prelude::*, obs::FlowKind};

const DEFAULT_FILTER: &str = "info";

/// A span builder used by proxy flows.
#[derive(Clone, Debug)]
pub struct FlowSpan {
	span: tracing::Span,
}
impl FlowSpan {
	/// Creates a new span tagged with the provided flow kind + stage.
	pub fn new(kind: FlowKind, stage: &'static str) -> Self {
		let span = tracing::info_span!("rsvp_proxy.flow", flow = kind.as_str(), stage);

		Self { span }
	}

	/// Instruments an async block without holding a guard across `.await` points.
	pub fn instrument<Fut>(&self, fut: Fut) -> Instrumented<Fut>
	where
		Fut: Future,
	{
		fut.instrument(self.span.clone())
	}
}

/// Installs the global fmt subscriber, honoring `RUST_LOG` and falling back to `info`.
///
/// Calling it twice is harmless; the second installation attempt is ignored.
pub fn init_tracing() {
	let filter =
		EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));
	let _ = tracing_subscriber::registry().with(filter).with(fmt::layer()).try_init();
}
