//! Shared bearer credential written by the refresher and read by every request.
//!
//! The store swaps an [`Arc<Credential>`] wholesale under a [`RwLock`]: readers clone the
//! pointer and never observe a half-written value, and `parking_lot`'s eventual fairness
//! keeps a steady stream of readers from starving the refresher.

// self
use crate::{_prelude::*, auth::TokenSecret};

/// Bearer credential minted by the token endpoint.
#[derive(Clone, PartialEq, Eq)]
pub struct Credential {
	/// Access token attached as `Authorization: Bearer`.
	pub access_token: TokenSecret,
	/// Refresh token returned alongside the access token, if any.
	pub refresh_token: Option<TokenSecret>,
	/// Instant the token endpoint answered.
	pub obtained_at: OffsetDateTime,
}
impl Credential {
	/// Creates a credential stamped with the current UTC instant.
	pub fn new(access_token: impl Into<String>) -> Self {
		Self {
			access_token: TokenSecret::new(access_token),
			refresh_token: None,
			obtained_at: OffsetDateTime::now_utc(),
		}
	}

	/// Attaches the refresh token issued with this credential.
	pub fn with_refresh_token(mut self, refresh_token: impl Into<String>) -> Self {
		self.refresh_token = Some(TokenSecret::new(refresh_token));

		self
	}

	/// Overrides the instant the credential was obtained.
	pub fn with_obtained_at(mut self, instant: OffsetDateTime) -> Self {
		self.obtained_at = instant;

		self
	}
}
impl Debug for Credential {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("Credential")
			.field("access_token", &self.access_token)
			.field("refresh_token_set", &self.refresh_token.is_some())
			.field("obtained_at", &self.obtained_at)
			.finish()
	}
}

/// Single-writer, many-reader holder for the current [`Credential`].
#[derive(Debug, Default)]
pub struct CredentialStore(RwLock<Option<Arc<Credential>>>);
impl CredentialStore {
	/// Creates a store seeded with an existing credential.
	pub fn with_credential(credential: Credential) -> Self {
		Self(RwLock::new(Some(Arc::new(credential))))
	}

	/// Returns the current access token, or an empty secret when nothing was written yet.
	pub fn read(&self) -> TokenSecret {
		self.0.read().as_ref().map(|credential| credential.access_token.clone()).unwrap_or_default()
	}

	/// Returns the full credential last written, if any.
	pub fn snapshot(&self) -> Option<Arc<Credential>> {
		self.0.read().clone()
	}

	/// Replaces the stored credential.
	pub fn write(&self, credential: Credential) {
		let credential = Arc::new(credential);

		*self.0.write() = Some(credential);
	}

	/// Time elapsed since the stored credential was obtained, measured at `now`.
	///
	/// A growing age is the only visible symptom of repeated refresh failures, so the
	/// health endpoint surfaces it.
	pub fn age_at(&self, now: OffsetDateTime) -> Option<TimeDuration> {
		self.0.read().as_ref().map(|credential| now - credential.obtained_at)
	}

	/// Convenience wrapper around [`CredentialStore::age_at`] using the current UTC instant.
	pub fn age(&self) -> Option<TimeDuration> {
		self.age_at(OffsetDateTime::now_utc())
	}
}
