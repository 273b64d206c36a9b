//! Token lifecycle orchestration: the interactive bootstrap and the scheduled refresh loop.

pub mod authorization;
pub mod refresh;

pub use authorization::*;
pub use refresh::*;

// self
use crate::{
	_prelude::*,
	auth::{CredentialStore, TokenSecret},
	error::ConfigError,
	http::ReqwestHttpClient,
	provider::ProviderDescriptor,
};

/// Default period between scheduled refresh exchanges.
pub const DEFAULT_REFRESH_INTERVAL: Duration = Duration::from_secs(5 * 60);
/// Default upper bound for a single token endpoint exchange.
pub const DEFAULT_EXCHANGE_TIMEOUT: Duration = Duration::from_secs(10);

/// Registered OAuth client identity sent with every grant.
#[derive(Clone)]
pub struct ClientCredentials {
	/// OAuth 2.0 client identifier.
	pub client_id: String,
	/// Client secret sent in the form body.
	pub client_secret: TokenSecret,
	/// Redirect URI registered with the provider.
	pub redirect_uri: Url,
}
impl ClientCredentials {
	/// Bundles a client identity.
	pub fn new(client_id: impl Into<String>, client_secret: impl Into<String>, redirect_uri: Url) -> Self {
		Self {
			client_id: client_id.into(),
			client_secret: TokenSecret::new(client_secret),
			redirect_uri,
		}
	}
}
impl Debug for ClientCredentials {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("ClientCredentials")
			.field("client_id", &self.client_id)
			.field("client_secret", &self.client_secret)
			.field("redirect_uri", &self.redirect_uri.as_str())
			.finish()
	}
}

/// Owns the credential lifecycle for a single provider client.
///
/// The refresher is the only writer of the [`CredentialStore`] it holds; request handlers
/// only ever read from the same store. The refresh token itself stays private to the
/// refresher and rotates whenever the provider issues a new one.
pub struct Refresher {
	/// HTTP client used for every token endpoint request.
	pub http_client: ReqwestHttpClient,
	/// Provider descriptor that defines the OAuth endpoints.
	pub descriptor: ProviderDescriptor,
	/// Client identity sent with every grant.
	pub credentials: ClientCredentials,
	/// Store receiving every freshly minted access token.
	pub store: Arc<CredentialStore>,
	/// Counters describing refresh outcomes.
	pub metrics: Arc<RefreshMetrics>,
	/// Period between scheduled refreshes.
	pub interval: Duration,
	/// Upper bound for one token endpoint exchange.
	pub exchange_timeout: Duration,
	refresh_token: RwLock<Option<TokenSecret>>,
	exchange_guard: AsyncMutex<()>,
}
impl Refresher {
	/// Creates a refresher with its own default HTTP client.
	pub fn new(
		descriptor: ProviderDescriptor,
		credentials: ClientCredentials,
		store: Arc<CredentialStore>,
	) -> Result<Self, ConfigError> {
		Ok(Self::with_http_client(descriptor, credentials, store, ReqwestHttpClient::new()?))
	}

	/// Creates a refresher that reuses the caller-provided HTTP client.
	pub fn with_http_client(
		descriptor: ProviderDescriptor,
		credentials: ClientCredentials,
		store: Arc<CredentialStore>,
		http_client: ReqwestHttpClient,
	) -> Self {
		Self {
			http_client,
			descriptor,
			credentials,
			store,
			metrics: Default::default(),
			interval: DEFAULT_REFRESH_INTERVAL,
			exchange_timeout: DEFAULT_EXCHANGE_TIMEOUT,
			refresh_token: RwLock::new(None),
			exchange_guard: AsyncMutex::new(()),
		}
	}

	/// Seeds the refresh token used by [`Refresher::refresh_once`].
	pub fn with_refresh_token(self, refresh_token: impl Into<String>) -> Self {
		let refresh_token = TokenSecret::new(refresh_token);

		*self.refresh_token.write() = Some(refresh_token).filter(|token| !token.is_empty());

		self
	}

	/// Overrides the period between scheduled refreshes.
	pub fn with_interval(mut self, interval: Duration) -> Self {
		self.interval = interval;

		self
	}

	/// Overrides how long one token endpoint exchange may take.
	pub fn with_exchange_timeout(mut self, timeout: Duration) -> Self {
		self.exchange_timeout = timeout;

		self
	}

	/// Returns the refresh token the next exchange will present.
	pub fn current_refresh_token(&self) -> Option<TokenSecret> {
		self.refresh_token.read().clone()
	}
}
impl Debug for Refresher {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("Refresher")
			.field("descriptor", &self.descriptor.id)
			.field("credentials", &self.credentials)
			.field("interval", &self.interval)
			.field("exchange_timeout", &self.exchange_timeout)
			.field("refresh_token_set", &self.refresh_token.read().is_some())
			.finish()
	}
}
