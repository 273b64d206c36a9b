//! Read-through RSVP cache in front of an [`RsvpSource`].
//!
//! Entries expire a fixed TTL after insertion and expiry is checked on every read; the
//! background sweeper only reclaims memory. Concurrent misses for the same event queue on a
//! per-event async guard, so one upstream fetch serves all of them. Failed fetches are never
//! stored, which means the next caller simply tries again.

// crates.io
use tokio::{
	task::JoinHandle,
	time::{self, Instant, MissedTickBehavior},
};
// self
use crate::{
	_prelude::*,
	auth::{EventId, GroupName},
	shutdown::ShutdownSignal,
	upstream::{RsvpSet, RsvpSource},
};

/// Default freshness window of a cached RSVP list.
pub const DEFAULT_TTL: Duration = Duration::from_secs(5 * 60);
/// Default upper bound for a single upstream fetch.
pub const DEFAULT_FETCH_TIMEOUT: Duration = Duration::from_secs(2);
/// Default period of the expired-entry sweeper.
pub const DEFAULT_SWEEP_INTERVAL: Duration = Duration::from_secs(10 * 60);

#[derive(Clone, Debug)]
struct CacheEntry {
	set: RsvpSet,
	inserted_at: Instant,
}
impl CacheEntry {
	fn is_fresh(&self, now: Instant, ttl: Duration) -> bool {
		now.saturating_duration_since(self.inserted_at) < ttl
	}
}

/// Event-keyed cache of RSVP lists with per-entry expiry.
pub struct ResponseCache {
	source: Arc<dyn RsvpSource>,
	group: GroupName,
	ttl: Duration,
	fetch_timeout: Duration,
	sweep_interval: Duration,
	entries: RwLock<HashMap<EventId, CacheEntry>>,
	in_flight: Mutex<HashMap<EventId, Arc<AsyncMutex<()>>>>,
}
impl ResponseCache {
	/// Creates a cache for `group` backed by `source`, using the default timings.
	pub fn new(source: Arc<dyn RsvpSource>, group: GroupName) -> Self {
		Self {
			source,
			group,
			ttl: DEFAULT_TTL,
			fetch_timeout: DEFAULT_FETCH_TIMEOUT,
			sweep_interval: DEFAULT_SWEEP_INTERVAL,
			entries: Default::default(),
			in_flight: Default::default(),
		}
	}

	/// Overrides the freshness window.
	pub fn with_ttl(mut self, ttl: Duration) -> Self {
		self.ttl = ttl;

		self
	}

	/// Overrides the per-fetch timeout handed to the source.
	pub fn with_fetch_timeout(mut self, timeout: Duration) -> Self {
		self.fetch_timeout = timeout;

		self
	}

	/// Overrides the sweeper period.
	pub fn with_sweep_interval(mut self, interval: Duration) -> Self {
		self.sweep_interval = interval;

		self
	}

	/// Returns the cached list for `event`, fetching it from the source on a miss.
	pub async fn get_or_fetch(&self, event: &EventId) -> Result<RsvpSet> {
		if let Some(set) = self.peek(event) {
			tracing::debug!(%event, "RSVP cache hit.");

			return Ok(set);
		}

		let guard = self.guard_for(event);
		let _flight = guard.lock().await;

		// Another caller may have filled the entry while this one was queued.
		if let Some(set) = self.peek(event) {
			tracing::debug!(%event, "RSVP cache filled by a concurrent fetch.");

			return Ok(set);
		}

		tracing::debug!(%event, "RSVP cache miss.");

		let set = self.source.fetch_rsvps(event, &self.group, self.fetch_timeout).await?;

		self.entries
			.write()
			.insert(event.clone(), CacheEntry { set: set.clone(), inserted_at: Instant::now() });

		Ok(set)
	}

	/// Returns the cached list for `event` when it is still fresh, without fetching.
	pub fn peek(&self, event: &EventId) -> Option<RsvpSet> {
		let now = Instant::now();

		self.entries
			.read()
			.get(event)
			.filter(|entry| entry.is_fresh(now, self.ttl))
			.map(|entry| entry.set.clone())
	}

	/// Number of stored entries, expired ones included until the next sweep.
	pub fn len(&self) -> usize {
		self.entries.read().len()
	}

	/// Returns `true` when nothing is stored.
	pub fn is_empty(&self) -> bool {
		self.entries.read().is_empty()
	}

	/// Drops expired entries and idle fetch guards, returning how many entries were removed.
	pub fn purge_expired(&self) -> usize {
		let now = Instant::now();
		let removed = {
			let mut entries = self.entries.write();
			let before = entries.len();

			entries.retain(|_, entry| entry.is_fresh(now, self.ttl));

			before - entries.len()
		};

		self.in_flight.lock().retain(|_, guard| Arc::strong_count(guard) > 1);

		removed
	}

	/// Runs [`ResponseCache::purge_expired`] every sweep interval until `shutdown` fires.
	pub fn spawn_sweeper(self: Arc<Self>, mut shutdown: ShutdownSignal) -> JoinHandle<()> {
		tokio::spawn(async move {
			let mut ticker =
				time::interval_at(Instant::now() + self.sweep_interval, self.sweep_interval);

			ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

			loop {
				tokio::select! {
					_ = shutdown.cancelled() => {
						tracing::info!("Stopping RSVP cache sweeper.");

						return;
					},
					_ = ticker.tick() => {
						let removed = self.purge_expired();

						if removed > 0 {
							tracing::debug!(removed, "Swept expired RSVP cache entries.");
						}
					},
				}
			}
		})
	}

	fn guard_for(&self, event: &EventId) -> Arc<AsyncMutex<()>> {
		self.in_flight.lock().entry(event.clone()).or_default().clone()
	}
}
impl Debug for ResponseCache {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("ResponseCache")
			.field("group", &self.group)
			.field("ttl", &self.ttl)
			.field("fetch_timeout", &self.fetch_timeout)
			.field("sweep_interval", &self.sweep_interval)
			.field("entries", &self.len())
			.finish()
	}
}

#[cfg(test)]
mod tests {
	// std
	use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
	// self
	use super::*;
	use crate::{
		error::UpstreamError,
		shutdown::Shutdown,
		upstream::{Member, RsvpEntry, RsvpFuture, RsvpResponse},
	};

	#[derive(Default)]
	struct CountingSource {
		calls: AtomicUsize,
		failing: AtomicBool,
		delay: Duration,
	}
	impl CountingSource {
		fn with_delay(delay: Duration) -> Self {
			Self { delay, ..Default::default() }
		}

		fn calls(&self) -> usize {
			self.calls.load(Ordering::SeqCst)
		}
	}
	impl RsvpSource for CountingSource {
		fn fetch_rsvps<'a>(
			&'a self,
			event: &'a EventId,
			_group: &'a GroupName,
			_timeout: Duration,
		) -> RsvpFuture<'a> {
			Box::pin(async move {
				let call = self.calls.fetch_add(1, Ordering::SeqCst);

				time::sleep(self.delay).await;

				if self.failing.load(Ordering::SeqCst) {
					return Err(UpstreamError::Status { status: 502, retry_after: None }.into());
				}

				Ok(RsvpSet::from(vec![RsvpEntry {
					member: Member { id: format!("{event}-{call}"), name: "Ada".into(), photo: None },
					response: RsvpResponse::Yes,
					guests: 0,
				}]))
			})
		}
	}

	fn event(id: &str) -> EventId {
		EventId::new(id).expect("Event fixture should be valid.")
	}

	fn cache(source: Arc<CountingSource>) -> ResponseCache {
		ResponseCache::new(source, GroupName::new("group").expect("Group fixture should be valid."))
	}

	#[tokio::test(start_paused = true)]
	async fn repeated_reads_within_ttl_fetch_once() {
		let source = Arc::new(CountingSource::default());
		let cache = cache(source.clone());
		let event = event("100");
		let first = cache.get_or_fetch(&event).await.expect("First fetch should succeed.");

		time::advance(Duration::from_secs(4 * 60)).await;

		let second = cache.get_or_fetch(&event).await.expect("Cached read should succeed.");

		assert_eq!(source.calls(), 1);
		assert!(first.is_same_fetch(&second));
	}

	#[tokio::test(start_paused = true)]
	async fn expired_entries_are_fetched_again() {
		let source = Arc::new(CountingSource::default());
		let cache = cache(source.clone());
		let event = event("100");
		let first = cache.get_or_fetch(&event).await.expect("First fetch should succeed.");

		time::advance(DEFAULT_TTL + Duration::from_secs(1)).await;

		assert!(cache.peek(&event).is_none());

		let second = cache.get_or_fetch(&event).await.expect("Refetch should succeed.");

		assert_eq!(source.calls(), 2);
		assert!(!first.is_same_fetch(&second));
		assert_eq!(second[0].member.id, "100-1");
	}

	#[tokio::test(start_paused = true)]
	async fn failures_are_not_cached() {
		let source = Arc::new(CountingSource::default());
		let cache = cache(source.clone());
		let event = event("100");

		source.failing.store(true, Ordering::SeqCst);

		assert!(cache.get_or_fetch(&event).await.is_err());
		assert!(cache.is_empty());

		source.failing.store(false, Ordering::SeqCst);

		assert!(cache.get_or_fetch(&event).await.is_ok());
		assert_eq!(source.calls(), 2);
		assert_eq!(cache.len(), 1);
	}

	#[tokio::test(start_paused = true)]
	async fn concurrent_misses_share_one_fetch() {
		let source = Arc::new(CountingSource::with_delay(Duration::from_millis(500)));
		let cache = cache(source.clone());
		let event = event("100");
		let (first, second, third) = tokio::join!(
			cache.get_or_fetch(&event),
			cache.get_or_fetch(&event),
			cache.get_or_fetch(&event),
		);
		let first = first.expect("Leader fetch should succeed.");

		assert_eq!(source.calls(), 1);
		assert!(first.is_same_fetch(&second.expect("Follower should share the fetch.")));
		assert!(first.is_same_fetch(&third.expect("Follower should share the fetch.")));
	}

	#[tokio::test(start_paused = true)]
	async fn distinct_events_do_not_share_entries() {
		let source = Arc::new(CountingSource::default());
		let cache = cache(source.clone());

		cache.get_or_fetch(&event("1")).await.expect("Fetch should succeed.");
		cache.get_or_fetch(&event("2")).await.expect("Fetch should succeed.");

		assert_eq!(source.calls(), 2);
		assert_eq!(cache.len(), 2);
	}

	#[tokio::test(start_paused = true)]
	async fn purge_drops_expired_entries_and_idle_guards() {
		let source = Arc::new(CountingSource::default());
		let cache = cache(source);

		cache.get_or_fetch(&event("1")).await.expect("Fetch should succeed.");
		time::advance(Duration::from_secs(60)).await;
		cache.get_or_fetch(&event("2")).await.expect("Fetch should succeed.");
		time::advance(DEFAULT_TTL - Duration::from_secs(30)).await;

		assert_eq!(cache.purge_expired(), 1);
		assert_eq!(cache.len(), 1);
		assert!(cache.in_flight.lock().is_empty());
	}

	#[tokio::test(start_paused = true)]
	async fn sweeper_runs_until_shutdown() {
		let source = Arc::new(CountingSource::default());
		let cache = Arc::new(cache(source).with_sweep_interval(Duration::from_secs(60)));
		let shutdown = Shutdown::new();

		cache.get_or_fetch(&event("1")).await.expect("Fetch should succeed.");

		let handle = cache.clone().spawn_sweeper(shutdown.signal());

		time::sleep(DEFAULT_TTL + Duration::from_secs(61)).await;

		assert!(cache.is_empty());

		shutdown.trigger();
		handle.await.expect("Sweeper should exit cleanly.");
	}
}
