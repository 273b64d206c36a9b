//! Interactive bootstrap: send an operator to the consent page, then trade the returned
//! authorization code for the first token pair.
//!
//! Nothing here touches the [`CredentialStore`](crate::auth::CredentialStore) or starts the
//! refresh loop. The refresh token printed by the CLI is what later seeds
//! [`Refresher::with_refresh_token`](crate::flows::Refresher::with_refresh_token).

// crates.io
use rand::{Rng, distr::Alphanumeric};
// self
use crate::{
	_prelude::*,
	flows::Refresher,
	oauth::{self, GrantType, TokenPair},
	obs::{self, FlowKind, FlowOutcome, FlowSpan},
	provider::ProviderDescriptor,
};

const STATE_LEN: usize = 32;

/// Authorization URL plus the `state` value that must round-trip through the redirect.
#[derive(Clone, Debug)]
pub struct AuthorizationRequest {
	/// Fully-formed authorize URL to open in a browser.
	pub url: Url,
	/// Opaque anti-CSRF value embedded in `url`.
	pub state: String,
}
impl AuthorizationRequest {
	/// Builds a consent URL with a fresh `state` for the given client.
	pub fn new(descriptor: &ProviderDescriptor, client_id: &str, redirect_uri: &Url) -> Self {
		Self::with_state(descriptor, client_id, redirect_uri, random_state())
	}

	/// Rebuilds a request around a `state` issued earlier, e.g. by a previous CLI run.
	pub fn with_state(
		descriptor: &ProviderDescriptor,
		client_id: &str,
		redirect_uri: &Url,
		state: impl Into<String>,
	) -> Self {
		let state = state.into();
		let url = oauth::authorize_url(descriptor, client_id, redirect_uri, &state);

		Self { url, state }
	}

	/// Validates the `state` returned alongside the authorization code.
	pub fn validate_state(&self, returned_state: &str) -> Result<()> {
		if returned_state == self.state {
			Ok(())
		} else {
			Err(Error::InvalidGrant { reason: "authorization state mismatch".into() })
		}
	}

	/// Extracts the authorization code from the redirect the provider sent the browser to.
	///
	/// The callback must echo this request's `state`; a provider-reported `error` wins over
	/// everything else.
	pub fn code_from_callback(&self, callback: &Url) -> Result<String> {
		let params: HashMap<_, _> = callback.query_pairs().into_owned().collect();

		if let Some(error) = params.get("error") {
			let reason = match params.get("error_description") {
				Some(description) => format!("authorization denied ({error}: {description})"),
				None => format!("authorization denied ({error})"),
			};

			return Err(Error::InvalidGrant { reason });
		}

		self.validate_state(params.get("state").map(String::as_str).unwrap_or_default())?;

		params
			.get("code")
			.filter(|code| !code.is_empty())
			.cloned()
			.ok_or_else(|| Error::InvalidGrant { reason: "callback carried no code".into() })
	}
}

impl Refresher {

	/// Exchanges an authorization code once and hands the token pair back to the caller.
	pub async fn exchange_code(&self, code: &str) -> Result<TokenPair> {
		const KIND: FlowKind = FlowKind::AuthorizationCode;

		let span = FlowSpan::new(KIND, "exchange_code");

		obs::record_flow_outcome(KIND, FlowOutcome::Attempt);

		let result = span
			.instrument(oauth::exchange(
				&self.http_client,
				&self.descriptor,
				&self.credentials,
				GrantType::AuthorizationCode,
				code,
				self.exchange_timeout,
			))
			.await;

		match &result {
			Ok(_) => obs::record_flow_outcome(KIND, FlowOutcome::Success),
			Err(err) => {
				tracing::error!(error = %err, "Authorization code exchange failed.");
				obs::record_flow_outcome(KIND, FlowOutcome::Failure);
			},
		}

		result
	}
}

fn random_state() -> String {
	rand::rng().sample_iter(Alphanumeric).take(STATE_LEN).map(char::from).collect()
}
