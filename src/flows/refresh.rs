//! Scheduled refresh-token exchange.
//!
//! [`Refresher::start`] performs one exchange right away, then re-runs it every
//! [`Refresher::interval`] until the [`ShutdownSignal`] fires. A failed cycle is logged and
//! counted but never clears the store: the previous access token keeps serving requests
//! until a later cycle succeeds. There is no immediate retry and no backoff; the next tick
//! is the retry. Shutdown also abandons an exchange that is still in flight.

mod metrics;

pub use metrics::RefreshMetrics;

// crates.io
use tokio::{
	task::JoinHandle,
	time::{self, Instant, MissedTickBehavior},
};
// self
use crate::{
	_prelude::*,
	auth::Credential,
	error::ConfigError,
	flows::Refresher,
	oauth::{self, GrantType},
	obs::{self, FlowKind, FlowOutcome, FlowSpan},
	shutdown::ShutdownSignal,
};

impl Refresher {
	/// Runs a single refresh-token exchange and publishes the result to the store.
	///
	/// Concurrent callers are serialized so two exchanges never race to rotate the
	/// refresh token.
	pub async fn refresh_once(&self) -> Result<()> {
		const KIND: FlowKind = FlowKind::Refresh;

		let span = FlowSpan::new(KIND, "refresh_once");

		obs::record_flow_outcome(KIND, FlowOutcome::Attempt);

		let result: Result<()> = span
			.instrument(async {
				let _serialized = self.exchange_guard.lock().await;

				self.metrics.record_attempt();
				tracing::info!("Refreshing API access token.");

				let refresh_token =
					self.current_refresh_token().ok_or(ConfigError::MissingRefreshToken)?;
				let pair = oauth::exchange(
					&self.http_client,
					&self.descriptor,
					&self.credentials,
					GrantType::RefreshToken,
					refresh_token.expose(),
					self.exchange_timeout,
				)
				.await?;
				let obtained_at = OffsetDateTime::now_utc();
				let rotated = pair.refresh_token.clone();

				if let Some(rotated) = &rotated {
					*self.refresh_token.write() = Some(rotated.clone());
				}

				self.store.write(Credential {
					access_token: pair.access_token,
					refresh_token: rotated.or(Some(refresh_token)),
					obtained_at,
				});
				self.metrics.record_success(obtained_at);

				Ok(())
			})
			.await;

		match &result {
			Ok(()) => obs::record_flow_outcome(KIND, FlowOutcome::Success),
			Err(err) => {
				self.metrics.record_failure();
				tracing::error!(
					error = %err,
					consecutive_failures = self.metrics.consecutive_failures(),
					"Failed to refresh API access token; keeping the previous credential."
				);
				obs::record_flow_outcome(KIND, FlowOutcome::Failure);
			},
		}

		result
	}

	/// Refreshes immediately, then keeps refreshing on a fixed interval in a background task.
	///
	/// The initial exchange is awaited so callers can check the store before serving
	/// traffic; its failure is logged and the loop starts regardless. A shutdown during the
	/// initial exchange returns a task that finishes right away.
	pub async fn start(self: Arc<Self>, mut shutdown: ShutdownSignal) -> JoinHandle<()> {
		tokio::select! {
			_ = shutdown.cancelled() => {},
			_ = self.refresh_once() => {},
		}

		tokio::spawn(self.run(shutdown))
	}

	async fn run(self: Arc<Self>, mut shutdown: ShutdownSignal) {
		let mut ticker = time::interval_at(Instant::now() + self.interval, self.interval);

		ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

		loop {
			tokio::select! {
				_ = shutdown.cancelled() => break,
				_ = ticker.tick() => {},
			}
			tokio::select! {
				_ = shutdown.cancelled() => break,
				_ = self.refresh_once() => {},
			}
		}

		tracing::info!("Stopping credential refresher.");
	}
}
