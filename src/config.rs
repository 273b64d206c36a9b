//! Command-line and environment configuration.
//!
//! Every flag has an environment fallback so the proxy can be configured from a `.env`
//! file. Parsed arguments are validated into settings structs before anything touches the
//! network; a missing OAuth setting is fatal at startup.

// std
use std::net::SocketAddr;
// crates.io
use axum::http::HeaderValue;
use clap::{Args, Parser, Subcommand};
// self
use crate::{
	_prelude::*,
	auth::GroupName,
	error::ConfigError,
	flows::ClientCredentials,
};

const DEFAULT_ADDR: &str = "127.0.0.1:8080";
const DEFAULT_GROUP: &str = "Graz-Open-Source-Meetup";
const DEFAULT_ORIGINS: [&str; 2] = ["http://localhost:1313", "https://gograz.org"];
const MAX_PERIOD: Duration = Duration::from_secs(30 * 24 * 60 * 60);

/// Top-level command line.
#[derive(Debug, Parser)]
#[command(name = "rsvp-proxy", version, about = "Caching RSVP proxy for meetup events")]
pub struct Cli {
	/// Command to run.
	#[command(subcommand)]
	pub command: Commands,
}

/// Available subcommands.
#[derive(Debug, Subcommand)]
pub enum Commands {
	/// Serve RSVPs over HTTP while keeping the access token fresh.
	Serve(ServeArgs),
	/// Print the consent URL an operator opens to authorize the client.
	AuthUrl(AuthUrlArgs),
	/// Trade an authorization code for the first access/refresh token pair.
	ExchangeCode(ExchangeCodeArgs),
}

/// OAuth client identity shared by every subcommand.
#[derive(Clone, Debug, Default, Args)]
pub struct ClientArgs {
	/// OAuth client identifier.
	#[arg(long, env = "MEETUP_CLIENT_ID")]
	pub client_id: Option<String>,
	/// OAuth client secret.
	#[arg(long, env = "MEETUP_CLIENT_SECRET", hide_env_values = true)]
	pub client_secret: Option<String>,
	/// Redirect URI registered for the client.
	#[arg(long, env = "MEETUP_REDIRECT_URI")]
	pub redirect_uri: Option<Url>,
}
impl ClientArgs {
	/// Returns the client identifier or a missing-setting error.
	pub fn client_id(&self) -> Result<&str, ConfigError> {
		required("--client-id / MEETUP_CLIENT_ID", self.client_id.as_deref())
	}

	/// Returns the redirect URI or a missing-setting error.
	pub fn redirect_uri(&self) -> Result<&Url, ConfigError> {
		self.redirect_uri
			.as_ref()
			.ok_or(ConfigError::MissingSetting { name: "--redirect-uri / MEETUP_REDIRECT_URI" })
	}

	/// Assembles the full client identity required by token exchanges.
	pub fn credentials(&self) -> Result<ClientCredentials, ConfigError> {
		let client_id = self.client_id()?;
		let client_secret =
			required("--client-secret / MEETUP_CLIENT_SECRET", self.client_secret.as_deref())?;

		Ok(ClientCredentials::new(client_id, client_secret, self.redirect_uri()?.clone()))
	}
}

/// Arguments of `serve`.
#[derive(Clone, Debug, Args)]
pub struct ServeArgs {
	/// OAuth client identity.
	#[command(flatten)]
	pub client: ClientArgs,
	/// Long-lived refresh token obtained through `exchange-code`.
	#[arg(long, env = "MEETUP_REFRESH_TOKEN", hide_env_values = true)]
	pub refresh_token: Option<String>,
	/// Socket address to listen on.
	#[arg(long, env = "RSVP_PROXY_ADDR", default_value = DEFAULT_ADDR)]
	pub addr: SocketAddr,
	/// URL name of the group whose events are served.
	#[arg(long, env = "RSVP_PROXY_URL_NAME", default_value = DEFAULT_GROUP)]
	pub url_name: GroupName,
	/// Origins allowed to call the proxy from a browser.
	#[arg(
		long,
		env = "RSVP_PROXY_ALLOWED_ORIGINS",
		value_delimiter = ',',
		default_values = DEFAULT_ORIGINS
	)]
	pub allowed_origins: Vec<String>,
	/// Seconds an RSVP list stays cached.
	#[arg(long, env = "RSVP_PROXY_CACHE_TTL_SECS", default_value_t = 300)]
	pub cache_ttl_secs: u64,
	/// Seconds between sweeps of expired cache entries.
	#[arg(long, env = "RSVP_PROXY_CACHE_SWEEP_SECS", default_value_t = 600)]
	pub cache_sweep_secs: u64,
	/// Milliseconds a single upstream fetch may take.
	#[arg(long, env = "RSVP_PROXY_FETCH_TIMEOUT_MS", default_value_t = 2_000)]
	pub fetch_timeout_ms: u64,
	/// Seconds between access token refreshes.
	#[arg(long, env = "RSVP_PROXY_REFRESH_INTERVAL_SECS", default_value_t = 300)]
	pub refresh_interval_secs: u64,
	/// Seconds a single token endpoint exchange may take.
	#[arg(long, env = "RSVP_PROXY_TOKEN_TIMEOUT_SECS", default_value_t = 10)]
	pub token_timeout_secs: u64,
}
impl ServeArgs {
	/// Validates the arguments into [`ServeSettings`].
	pub fn into_settings(self) -> Result<ServeSettings, ConfigError> {
		let credentials = self.client.credentials()?;
		let refresh_token =
			required("--refresh-token / MEETUP_REFRESH_TOKEN", self.refresh_token.as_deref())?
				.to_owned();
		let allowed_origins = self
			.allowed_origins
			.iter()
			.map(|origin| origin.trim())
			.filter(|origin| !origin.is_empty())
			.map(|origin| {
				HeaderValue::from_str(origin).map_err(|e| ConfigError::InvalidSetting {
					name: "--allowed-origins",
					reason: format!("`{origin}` is not a valid header value ({e})"),
				})
			})
			.collect::<Result<Vec<_>, _>>()?;

		Ok(ServeSettings {
			addr: self.addr,
			group: self.url_name,
			allowed_origins,
			cache_ttl: period("--cache-ttl-secs", Duration::from_secs(self.cache_ttl_secs))?,
			cache_sweep_interval: period(
				"--cache-sweep-secs",
				Duration::from_secs(self.cache_sweep_secs),
			)?,
			fetch_timeout: period("--fetch-timeout-ms", Duration::from_millis(self.fetch_timeout_ms))?,
			refresh_interval: period(
				"--refresh-interval-secs",
				Duration::from_secs(self.refresh_interval_secs),
			)?,
			token_timeout: period(
				"--token-timeout-secs",
				Duration::from_secs(self.token_timeout_secs),
			)?,
			credentials,
			refresh_token,
		})
	}
}

/// Arguments of `auth-url`.
#[derive(Clone, Debug, Args)]
pub struct AuthUrlArgs {
	/// OAuth client identity; the secret is not needed here.
	#[command(flatten)]
	pub client: ClientArgs,
}

/// Arguments of `exchange-code`.
#[derive(Clone, Debug, Args)]
pub struct ExchangeCodeArgs {
	/// OAuth client identity.
	#[command(flatten)]
	pub client: ClientArgs,
	/// `state` printed by `auth-url`; the callback must echo it back.
	#[arg(long, env = "MEETUP_AUTH_STATE")]
	pub state: String,
	/// Full redirect URL the browser landed on, carrying `code` and `state`.
	pub callback: Url,
}

/// Validated settings for `serve`.
#[derive(Clone, Debug)]
pub struct ServeSettings {
	/// Socket address to listen on.
	pub addr: SocketAddr,
	/// Group whose events are served.
	pub group: GroupName,
	/// CORS origin allow-list.
	pub allowed_origins: Vec<HeaderValue>,
	/// Freshness window of cached RSVP lists.
	pub cache_ttl: Duration,
	/// Period of the cache sweeper.
	pub cache_sweep_interval: Duration,
	/// Upper bound for a single upstream fetch.
	pub fetch_timeout: Duration,
	/// Period between access token refreshes.
	pub refresh_interval: Duration,
	/// Upper bound for a single token endpoint exchange.
	pub token_timeout: Duration,
	/// OAuth client identity.
	pub credentials: ClientCredentials,
	/// Refresh token seeding the refresher.
	pub refresh_token: String,
}

fn required<'a>(name: &'static str, value: Option<&'a str>) -> Result<&'a str, ConfigError> {
	value.map(str::trim).filter(|value| !value.is_empty()).ok_or(ConfigError::MissingSetting { name })
}

fn period(name: &'static str, value: Duration) -> Result<Duration, ConfigError> {
	if value.is_zero() {
		Err(ConfigError::InvalidSetting { name, reason: "must be greater than zero".into() })
	} else if value > MAX_PERIOD {
		Err(ConfigError::InvalidSetting { name, reason: "must not exceed 30 days".into() })
	} else {
		Ok(value)
	}
}
