//! Authenticated access to the RSVP endpoint.

pub mod model;

pub use model::*;

// crates.io
use reqwest::header::ACCEPT;
use tokio::time;
// self
use crate::{
	_prelude::*,
	auth::{CredentialStore, EventId, GroupName},
	error::UpstreamError,
	http::{ReqwestHttpClient, ResponseMetadata},
	obs::{self, FlowKind, FlowOutcome, FlowSpan},
	provider::ProviderDescriptor,
};

/// Boxed future returned by [`RsvpSource`] implementations.
pub type RsvpFuture<'a> = Pin<Box<dyn Future<Output = Result<RsvpSet>> + 'a + Send>>;

/// Anything able to produce the RSVP list of an event.
pub trait RsvpSource
where
	Self: Send + Sync,
{
	/// Fetches every RSVP of `event` in `group`, giving up after `timeout`.
	fn fetch_rsvps<'a>(
		&'a self,
		event: &'a EventId,
		group: &'a GroupName,
		timeout: Duration,
	) -> RsvpFuture<'a>;
}

/// reqwest-backed [`RsvpSource`] talking to the provider's REST API.
///
/// The bearer token is read from the [`CredentialStore`] on every call, so a refresh that
/// lands between two requests is picked up immediately.
#[derive(Clone, Debug)]
pub struct ApiClient {
	http_client: ReqwestHttpClient,
	descriptor: ProviderDescriptor,
	store: Arc<CredentialStore>,
}
impl ApiClient {
	/// Creates a client that reuses the caller-provided HTTP client.
	pub fn with_http_client(
		descriptor: &ProviderDescriptor,
		store: Arc<CredentialStore>,
		http_client: ReqwestHttpClient,
	) -> Self {
		Self { http_client, descriptor: descriptor.clone(), store }
	}

	async fn fetch(&self, event: &EventId, group: &GroupName, timeout: Duration) -> Result<RsvpSet> {
		const KIND: FlowKind = FlowKind::RsvpFetch;

		let span = FlowSpan::new(KIND, "fetch_rsvps");

		obs::record_flow_outcome(KIND, FlowOutcome::Attempt);

		let result: Result<RsvpSet> = span
			.instrument(async {
				let url = self.descriptor.rsvps_url(group, event)?;

				tracing::debug!(%event, %group, "Fetching RSVPs.");

				match time::timeout(timeout, self.request(url)).await {
					Ok(result) => result,
					Err(_) => Err(UpstreamError::Timeout { timeout }.into()),
				}
			})
			.await;

		match &result {
			Ok(set) => {
				tracing::debug!(%event, count = set.len(), "Fetched RSVPs.");
				obs::record_flow_outcome(KIND, FlowOutcome::Success);
			},
			Err(err) => {
				if matches!(err, Error::Upstream(upstream) if upstream.is_auth_failure()) {
					tracing::warn!(%event, error = %err, "RSVP endpoint rejected the access token.");
				}

				obs::record_flow_outcome(KIND, FlowOutcome::Failure);
			},
		}

		result
	}

	async fn request(&self, url: Url) -> Result<RsvpSet> {
		let token = self.store.read();
		let response = self
			.http_client
			.get(url)
			.bearer_auth(token.expose())
			.header(ACCEPT, "application/json")
			.send()
			.await
			.map_err(UpstreamError::from)?;
		let meta = ResponseMetadata::from_response(&response);

		if !response.status().is_success() {
			return Err(UpstreamError::Status {
				status: response.status().as_u16(),
				retry_after: meta.retry_after,
			}
			.into());
		}

		let body = response.bytes().await.map_err(UpstreamError::from)?;

		decode_rsvps(&body)
	}
}
impl RsvpSource for ApiClient {
	fn fetch_rsvps<'a>(
		&'a self,
		event: &'a EventId,
		group: &'a GroupName,
		timeout: Duration,
	) -> RsvpFuture<'a> {
		Box::pin(self.fetch(event, group, timeout))
	}
}

fn decode_rsvps(body: &[u8]) -> Result<RsvpSet> {
	let de = &mut serde_json::Deserializer::from_slice(body);
	let entries: Vec<RsvpEntry> =
		serde_path_to_error::deserialize(de).map_err(|source| UpstreamError::Decode { source })?;

	Ok(entries.into())
}
