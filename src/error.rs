//! Proxy-level error types shared across the refresher, upstream client, and cache.

// self
use crate::_prelude::*;

/// Crate-wide result type alias returning [`Error`] by default.
pub type Result<T, E = Error> = std::result::Result<T, E>;

type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Canonical error exposed by public APIs.
#[derive(Debug, ThisError)]
pub enum Error {
	/// Local configuration problem.
	#[error(transparent)]
	Config(#[from] ConfigError),
	/// Temporary token endpoint failure; the next scheduled refresh retries.
	#[error(transparent)]
	Transient(#[from] TransientError),
	/// Transport failure (DNS, TCP, TLS) while calling the token endpoint.
	#[error(transparent)]
	Transport(#[from] TransportError),
	/// RSVP endpoint failure.
	#[error(transparent)]
	Upstream(#[from] UpstreamError),

	/// Provider rejected the grant (e.g., bad code or refresh token).
	#[error("Provider rejected the grant: {reason}.")]
	InvalidGrant {
		/// Provider- or proxy-supplied reason string.
		reason: String,
	},
	/// Client authentication failed or credentials are malformed.
	#[error("Client authentication failed: {reason}.")]
	InvalidClient {
		/// Provider- or proxy-supplied reason string.
		reason: String,
	},
}

/// Configuration and validation failures raised at startup.
#[derive(Debug, ThisError)]
pub enum ConfigError {
	/// HTTP client could not be constructed.
	#[error("HTTP client could not be constructed.")]
	HttpClientBuild {
		/// Underlying transport builder failure.
		#[source]
		source: BoxError,
	},
	/// A setting required for the selected command was not supplied.
	#[error("Missing required setting `{name}`.")]
	MissingSetting {
		/// Flag or environment variable name.
		name: &'static str,
	},
	/// A supplied setting has an unusable value.
	#[error("Invalid value for `{name}`: {reason}.")]
	InvalidSetting {
		/// Flag or environment variable name.
		name: &'static str,
		/// Why the value was rejected.
		reason: String,
	},
	/// Provider descriptor failed validation.
	#[error("Provider descriptor is invalid.")]
	InvalidDescriptor(#[from] crate::provider::ProviderDescriptorError),
	/// An identifier failed validation.
	#[error(transparent)]
	InvalidIdentifier(#[from] crate::auth::IdentifierError),
	/// Upstream URL could not be joined from its parts.
	#[error("Upstream URL could not be built.")]
	InvalidUrl {
		/// Underlying parsing failure.
		#[source]
		source: url::ParseError,
	},
	/// No refresh token is available for the refresh grant.
	#[error("No refresh token is configured.")]
	MissingRefreshToken,
}
impl ConfigError {
	/// Wraps a transport's builder failure inside [`ConfigError`].
	pub fn http_client_build(src: impl 'static + Send + Sync + std::error::Error) -> Self {
		Self::HttpClientBuild { source: Box::new(src) }
	}
}
impl From<ReqwestError> for ConfigError {
	fn from(e: ReqwestError) -> Self {
		Self::http_client_build(e)
	}
}

/// Temporary token endpoint failure variants.
#[derive(Debug, ThisError)]
pub enum TransientError {
	/// Provider returned an unexpected but non-fatal response.
	#[error("Token endpoint returned an unexpected response: {message}.")]
	TokenEndpoint {
		/// Message summarizing the failure.
		message: String,
		/// HTTP status code, when available.
		status: Option<u16>,
		/// Retry-After hint from upstream, if supplied.
		retry_after: Option<TimeDuration>,
	},
	/// Token endpoint responded with malformed JSON that could not be parsed.
	#[error("Token endpoint returned malformed JSON.")]
	TokenResponseParse {
		/// Structured parsing failure.
		#[source]
		source: serde_path_to_error::Error<serde_json::Error>,
		/// HTTP status code, when available.
		status: Option<u16>,
	},
}

/// Transport-level failures (network, IO).
#[derive(Debug, ThisError)]
pub enum TransportError {
	/// Underlying HTTP client reported a network failure.
	#[error("Network error occurred while calling the token endpoint.")]
	Network {
		/// Transport-specific network error.
		#[source]
		source: BoxError,
	},
}
impl TransportError {
	/// Wraps a transport-specific network error.
	pub fn network(src: impl 'static + Send + Sync + std::error::Error) -> Self {
		Self::Network { source: Box::new(src) }
	}
}
impl From<ReqwestError> for TransportError {
	fn from(e: ReqwestError) -> Self {
		Self::network(e)
	}
}

/// RSVP endpoint failures. None of them are cached or retried by the proxy.
#[derive(Debug, ThisError)]
pub enum UpstreamError {
	/// The request did not complete within the caller-supplied timeout.
	#[error("RSVP request timed out after {}ms.", .timeout.as_millis())]
	Timeout {
		/// Timeout that elapsed.
		timeout: Duration,
	},
	/// Network or TLS failure while talking to the API.
	#[error("Network error occurred while calling the RSVP endpoint.")]
	Network {
		/// Transport-specific network error.
		#[source]
		source: BoxError,
	},
	/// The API answered with a non-success status.
	#[error("RSVP endpoint returned HTTP {status}.")]
	Status {
		/// HTTP status code.
		status: u16,
		/// Retry-After hint from upstream, if supplied.
		retry_after: Option<TimeDuration>,
	},
	/// The API body was not a list of RSVP records.
	#[error("RSVP endpoint returned a malformed payload.")]
	Decode {
		/// Structured parsing failure.
		#[source]
		source: serde_path_to_error::Error<serde_json::Error>,
	},
}
impl UpstreamError {
	/// Returns `true` when the API rejected the bearer credential.
	pub fn is_auth_failure(&self) -> bool {
		matches!(self, Self::Status { status: 401 | 403, .. })
	}
}
impl From<ReqwestError> for UpstreamError {
	fn from(e: ReqwestError) -> Self {
		Self::Network { source: Box::new(e) }
	}
}
