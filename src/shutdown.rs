//! Process-lifetime cancellation shared by the background tasks.
//!
//! [`Shutdown`] owns a `tokio::sync::watch` sender; every [`ShutdownSignal`] clone resolves
//! once [`Shutdown::trigger`] runs or the owner is dropped.

// crates.io
use tokio::sync::watch;

/// Owner side of the cancellation signal.
#[derive(Debug)]
pub struct Shutdown(watch::Sender<bool>);
impl Shutdown {
	/// Creates an untriggered signal.
	pub fn new() -> Self {
		Self(watch::Sender::new(false))
	}

	/// Hands out a receiver for a background task.
	pub fn signal(&self) -> ShutdownSignal {
		ShutdownSignal(self.0.subscribe())
	}

	/// Fires the signal for every subscriber.
	pub fn trigger(&self) {
		self.0.send_replace(true);
	}

	/// Waits for Ctrl+C, then fires the signal.
	pub async fn trigger_on_ctrl_c(self) {
		if let Err(e) = tokio::signal::ctrl_c().await {
			tracing::error!(error = %e, "Failed to listen for Ctrl+C; shutting down.");
		} else {
			tracing::info!("Shutdown signal received.");
		}

		self.trigger();
	}
}
impl Default for Shutdown {
	fn default() -> Self {
		Self::new()
	}
}

/// Receiver side handed to background loops.
#[derive(Clone, Debug)]
pub struct ShutdownSignal(watch::Receiver<bool>);
impl ShutdownSignal {
	/// Resolves when cancellation is requested or the owner goes away.
	pub async fn cancelled(&mut self) {
		loop {
			if *self.0.borrow_and_update() {
				return;
			}
			if self.0.changed().await.is_err() {
				return;
			}
		}
	}
}

#[cfg(test)]
mod tests {
	// std
	use std::time::Duration;
	// self
	use super::*;

	#[tokio::test]
	async fn trigger_wakes_every_subscriber() {
		let shutdown = Shutdown::new();
		let mut first = shutdown.signal();
		let mut second = first.clone();

		shutdown.trigger();

		tokio::time::timeout(Duration::from_secs(1), async {
			first.cancelled().await;
			second.cancelled().await;
		})
		.await
		.expect("Both subscribers should observe the trigger.");
	}

	#[tokio::test]
	async fn dropping_the_owner_cancels() {
		let shutdown = Shutdown::new();
		let mut signal = shutdown.signal();

		drop(shutdown);

		tokio::time::timeout(Duration::from_secs(1), signal.cancelled())
			.await
			.expect("Dropped owner should cancel the signal.");
	}

	#[tokio::test(start_paused = true)]
	async fn untriggered_signal_stays_pending() {
		let shutdown = Shutdown::new();
		let mut signal = shutdown.signal();
		let waited = tokio::time::timeout(Duration::from_secs(60), signal.cancelled()).await;

		assert!(waited.is_err());
	}
}
