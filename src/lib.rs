//! Caching RSVP proxy for meetup events.
//!
//! A background refresher keeps the OAuth 2.0 bearer fresh while request handlers read
//! attendee lists through a short-lived cache and serve them as JSON or HTML fragments.

#![deny(clippy::all, missing_docs, unused_crate_dependencies)]

pub mod auth;
pub mod cache;
pub mod config;
pub mod error;
pub mod flows;
pub mod http;
pub mod oauth;
pub mod obs;
pub mod provider;
pub mod render;
pub mod server;
pub mod service;
pub mod shutdown;
pub mod upstream;
#[cfg(any(test, feature = "test"))]
#[doc(hidden)]
pub mod _preludet {
	//! Convenience re-exports and helpers for integration tests; enabled via `cfg(test)` or the
	//! `test` crate feature.

	pub use crate::_prelude::*;

	// self
	use crate::{
		auth::{CredentialStore, ProviderId},
		flows::{ClientCredentials, Refresher},
		http::ReqwestHttpClient,
		provider::ProviderDescriptor,
		upstream::ApiClient,
	};

	/// Builds a reqwest HTTP client that accepts the self-signed certificates produced by
	/// `httpmock` during tests.
	pub fn test_reqwest_http_client() -> ReqwestHttpClient {
		let client = ReqwestClient::builder()
			.danger_accept_invalid_certs(true)
			.danger_accept_invalid_hostnames(true)
			.build()
			.expect("Failed to build insecure Reqwest client for tests.");

		ReqwestHttpClient::with_client(client)
	}

	/// Points every provider endpoint at the mock server base URL.
	pub fn mock_descriptor(base: &str) -> ProviderDescriptor {
		let base = base.trim_end_matches('/');
		let parse = |path: &str| {
			Url::parse(&format!("{base}{path}")).expect("Mock provider URL should parse.")
		};

		ProviderDescriptor::builder(
			ProviderId::new("mock-meetup").expect("Mock provider identifier should be valid."),
		)
		.authorization_endpoint(parse("/oauth2/authorize"))
		.token_endpoint(parse("/oauth2/access"))
		.api_endpoint(parse("/"))
		.build()
		.expect("Mock provider descriptor should build.")
	}

	/// Constructs a [`Refresher`] wired to the mock provider and a fresh credential store.
	pub fn build_test_refresher(
		descriptor: ProviderDescriptor,
		refresh_token: &str,
	) -> (Refresher, Arc<CredentialStore>) {
		let store = Arc::new(CredentialStore::default());
		let credentials = ClientCredentials::new(
			"client-test",
			"secret-test",
			Url::parse("https://app.example.com/callback")
				.expect("Redirect URI fixture should parse."),
		);
		let refresher =
			Refresher::with_http_client(descriptor, credentials, store.clone(), test_reqwest_http_client())
				.with_refresh_token(refresh_token);

		(refresher, store)
	}

	/// Constructs an [`ApiClient`] reading bearer tokens from the provided store.
	pub fn build_test_api_client(
		descriptor: &ProviderDescriptor,
		store: Arc<CredentialStore>,
	) -> ApiClient {
		ApiClient::with_http_client(descriptor, store, test_reqwest_http_client())
	}
}

mod _prelude {
	pub use std::{
		collections::HashMap,
		fmt::{Debug, Display, Formatter, Result as FmtResult},
		future::Future,
		hash::Hash,
		pin::Pin,
		str::FromStr,
		sync::Arc,
		time::Duration,
	};

	pub use async_lock::Mutex as AsyncMutex;
	pub use parking_lot::{Mutex, RwLock};
	pub use reqwest::{Client as ReqwestClient, Error as ReqwestError};
	pub use serde::{Deserialize, Serialize};
	pub use thiserror::Error as ThisError;
	pub use time::{Duration as TimeDuration, OffsetDateTime};
	pub use url::Url;

	pub use crate::error::{Error, Result};
}

pub use reqwest;
pub use url;
// Consumed by the `rsvp-proxy` binary only.
use {color_eyre as _, dotenvy as _};
#[cfg(test)] use httpmock as _;
