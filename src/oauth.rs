//! Token endpoint exchanges and authorization URL construction.
//!
//! The provider answers token requests with a bare `{access_token, refresh_token}` object
//! (no `token_type`, no `expires_in`), so the exchange is driven directly with reqwest:
//! form-encode the grant, require `200 OK`, and decode the body through
//! `serde_path_to_error` so malformed payloads report where they broke.

// self
use crate::{
	_prelude::*,
	auth::TokenSecret,
	error::{ConfigError, TransientError, TransportError},
	flows::ClientCredentials,
	http::ResponseMetadata,
	provider::ProviderDescriptor,
};

const BODY_PREVIEW_LIMIT: usize = 256;

/// OAuth 2.0 grant types used by the proxy.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GrantType {
	/// One-off exchange of an authorization code.
	AuthorizationCode,
	/// Periodic exchange of the long-lived refresh token.
	RefreshToken,
}
impl GrantType {
	/// Returns the RFC 6749 identifier for the grant type.
	pub const fn as_str(self) -> &'static str {
		match self {
			GrantType::AuthorizationCode => "authorization_code",
			GrantType::RefreshToken => "refresh_token",
		}
	}

	/// Form field carrying the grant secret.
	const fn secret_field(self) -> &'static str {
		match self {
			GrantType::AuthorizationCode => "code",
			GrantType::RefreshToken => "refresh_token",
		}
	}
}
impl Display for GrantType {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(self.as_str())
	}
}

/// Access/refresh token pair returned by a successful exchange.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TokenPair {
	/// Newly minted access token.
	pub access_token: TokenSecret,
	/// Refresh token, when the provider issued one.
	pub refresh_token: Option<TokenSecret>,
}

#[derive(Deserialize)]
struct TokenResponseBody {
	access_token: String,
	#[serde(default)]
	refresh_token: Option<String>,
}

#[derive(Deserialize)]
struct OAuthErrorBody {
	error: String,
	#[serde(default)]
	error_description: Option<String>,
}

/// Builds the URL end-users visit to grant the client access.
pub fn authorize_url(
	descriptor: &ProviderDescriptor,
	client_id: &str,
	redirect_uri: &Url,
	state: &str,
) -> Url {
	let mut url = descriptor.endpoints.authorization.clone();
	let mut pairs = url.query_pairs_mut();

	pairs.append_pair("client_id", client_id);
	pairs.append_pair("response_type", "code");
	pairs.append_pair("redirect_uri", redirect_uri.as_str());
	pairs.append_pair("state", state);

	drop(pairs);

	url
}

/// POSTs a grant to the token endpoint and decodes the resulting token pair.
///
/// `timeout` bounds the whole exchange, body included; expiry surfaces as a transient error.
pub(crate) async fn exchange(
	http: &ReqwestClient,
	descriptor: &ProviderDescriptor,
	credentials: &ClientCredentials,
	grant: GrantType,
	secret: &str,
	timeout: Duration,
) -> Result<TokenPair> {
	let form = [
		("client_id", credentials.client_id.as_str()),
		("client_secret", credentials.client_secret.expose()),
		("grant_type", grant.as_str()),
		("redirect_uri", credentials.redirect_uri.as_str()),
		(grant.secret_field(), secret),
	];
	let response = http
		.post(descriptor.endpoints.token.clone())
		.timeout(timeout)
		.form(&form)
		.send()
		.await
		.map_err(map_reqwest_error)?;
	let meta = ResponseMetadata::from_response(&response);
	let body = response.bytes().await.map_err(map_reqwest_error)?;

	if meta.status != Some(200) {
		return Err(map_status_error(grant, &meta, &body));
	}

	parse_token_response(&body, &meta)
}

fn parse_token_response(body: &[u8], meta: &ResponseMetadata) -> Result<TokenPair> {
	let de = &mut serde_json::Deserializer::from_slice(body);
	let parsed: TokenResponseBody = serde_path_to_error::deserialize(de)
		.map_err(|source| TransientError::TokenResponseParse { source, status: meta.status })?;

	if parsed.access_token.is_empty() {
		return Err(TransientError::TokenEndpoint {
			message: "response carried an empty access_token".into(),
			status: meta.status,
			retry_after: None,
		}
		.into());
	}

	Ok(TokenPair {
		access_token: TokenSecret::new(parsed.access_token),
		refresh_token: parsed.refresh_token.filter(|value| !value.is_empty()).map(TokenSecret::new),
	})
}

fn map_status_error(grant: GrantType, meta: &ResponseMetadata, body: &[u8]) -> Error {
	let detail = describe_error_body(body);

	match meta.status {
		Some(400) => Error::InvalidGrant { reason: format!("{grant} grant rejected ({detail})") },
		Some(401) => Error::InvalidClient { reason: detail },
		status => TransientError::TokenEndpoint {
			message: match status {
				Some(code) => format!("HTTP {code} during the {grant} grant ({detail})"),
				None => format!("no status during the {grant} grant ({detail})"),
			},
			status,
			retry_after: meta.retry_after,
		}
		.into(),
	}
}

fn describe_error_body(body: &[u8]) -> String {
	if let Ok(parsed) = serde_json::from_slice::<OAuthErrorBody>(body) {
		return match parsed.error_description {
			Some(description) => format!("{}: {description}", parsed.error),
			None => parsed.error,
		};
	}

	let text = String::from_utf8_lossy(body);
	let trimmed = text.trim();

	if trimmed.is_empty() {
		return "empty body".into();
	}

	trimmed.chars().take(BODY_PREVIEW_LIMIT).collect()
}

fn map_reqwest_error(err: ReqwestError) -> Error {
	if err.is_builder() {
		return ConfigError::from(err).into();
	}
	if err.is_timeout() {
		return TransientError::TokenEndpoint {
			message: "request timed out while calling the token endpoint".into(),
			status: err.status().map(|code| code.as_u16()),
			retry_after: None,
		}
		.into();
	}

	TransportError::from(err).into()
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	fn meta(status: u16) -> ResponseMetadata {
		ResponseMetadata { status: Some(status), retry_after: None }
	}

	#[test]
	fn authorize_url_carries_client_and_redirect() {
		let descriptor = ProviderDescriptor::meetup().expect("Meetup descriptor should build.");
		let redirect =
			Url::parse("https://gograz.org/callback").expect("Redirect fixture should parse.");
		let url = authorize_url(&descriptor, "client-1", &redirect, "state-xyz");
		let pairs: HashMap<_, _> = url.query_pairs().into_owned().collect();

		assert!(url.as_str().starts_with("https://secure.meetup.com/oauth2/authorize?"));
		assert_eq!(pairs.get("client_id").map(String::as_str), Some("client-1"));
		assert_eq!(pairs.get("response_type").map(String::as_str), Some("code"));
		assert_eq!(
			pairs.get("redirect_uri").map(String::as_str),
			Some("https://gograz.org/callback")
		);
		assert_eq!(pairs.get("state").map(String::as_str), Some("state-xyz"));
	}

	#[test]
	fn token_response_requires_access_token() {
		let pair = parse_token_response(br#"{"access_token":"a","refresh_token":"r"}"#, &meta(200))
			.expect("Well-formed response should parse.");

		assert_eq!(pair.access_token.expose(), "a");
		assert_eq!(pair.refresh_token.as_ref().map(TokenSecret::expose), Some("r"));

		let err = parse_token_response(br#"{"refresh_token":"r"}"#, &meta(200))
			.expect_err("Missing access_token should fail.");

		assert!(matches!(err, Error::Transient(TransientError::TokenResponseParse { .. })));

		let err = parse_token_response(br#"{"access_token":""}"#, &meta(200))
			.expect_err("Empty access_token should fail.");

		assert!(matches!(err, Error::Transient(TransientError::TokenEndpoint { .. })));
	}

	#[test]
	fn empty_refresh_token_is_treated_as_absent() {
		let pair = parse_token_response(br#"{"access_token":"a","refresh_token":""}"#, &meta(200))
			.expect("Response should parse.");

		assert!(pair.refresh_token.is_none());
	}

	#[test]
	fn status_errors_are_classified() {
		let err = map_status_error(
			GrantType::RefreshToken,
			&meta(400),
			br#"{"error":"invalid_grant","error_description":"expired"}"#,
		);

		assert!(matches!(&err, Error::InvalidGrant { reason } if reason.contains("invalid_grant: expired")));
		assert!(matches!(
			map_status_error(GrantType::RefreshToken, &meta(401), b""),
			Error::InvalidClient { .. }
		));

		match map_status_error(GrantType::RefreshToken, &meta(500), b"<html>oops</html>") {
			Error::Transient(TransientError::TokenEndpoint { status, message, .. }) => {
				assert_eq!(status, Some(500));
				assert!(message.contains("<html>oops</html>"));
			},
			other => panic!("Unexpected error variant: {other:?}."),
		}
	}

	#[test]
	fn error_body_preview_is_truncated() {
		let body = "x".repeat(BODY_PREVIEW_LIMIT * 2);

		assert_eq!(describe_error_body(body.as_bytes()).len(), BODY_PREVIEW_LIMIT);
		assert_eq!(describe_error_body(b"  "), "empty body");
	}
}
