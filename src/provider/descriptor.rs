//! Provider descriptor data structures and the URL helpers derived from them.

/// Builder API for assembling provider descriptors.
pub mod builder;

pub use builder::*;

// self
use crate::{
	_prelude::*,
	auth::{EventId, GroupName, ProviderId},
	error::ConfigError,
};

const MEETUP_AUTHORIZATION: &str = "https://secure.meetup.com/oauth2/authorize";
const MEETUP_TOKEN: &str = "https://secure.meetup.com/oauth2/access";
const MEETUP_API: &str = "https://api.meetup.com/";

/// Endpoint set declared by a provider descriptor.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProviderEndpoints {
	/// Authorization endpoint end-users visit to grant access.
	pub authorization: Url,
	/// Token endpoint used for code exchanges and refreshes.
	pub token: Url,
	/// Base URL of the REST API; always ends with `/`.
	pub api: Url,
}

/// Immutable provider descriptor consumed by the refresher and the API client.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProviderDescriptor {
	/// Descriptor identifier.
	pub id: ProviderId,
	/// Endpoint definitions exposed by the provider.
	pub endpoints: ProviderEndpoints,
}
impl ProviderDescriptor {
	/// Creates a new builder for the provided identifier.
	pub fn builder(id: ProviderId) -> ProviderDescriptorBuilder {
		ProviderDescriptorBuilder::new(id)
	}

	/// Descriptor for the production meetup.com endpoints.
	pub fn meetup() -> Result<Self> {
		let parse = |raw: &str| Url::parse(raw).map_err(|source| ConfigError::InvalidUrl { source });
		let descriptor = Self::builder(ProviderId::new("meetup").map_err(ConfigError::from)?)
			.authorization_endpoint(parse(MEETUP_AUTHORIZATION)?)
			.token_endpoint(parse(MEETUP_TOKEN)?)
			.api_endpoint(parse(MEETUP_API)?)
			.build()
			.map_err(ConfigError::from)?;

		Ok(descriptor)
	}

	/// Builds `<api>/<group>/events/<event>/rsvps`.
	///
	/// Each identifier is pushed as one encoded path segment, so it never resolves relative
	/// to the API base.
	pub fn rsvps_url(&self, group: &GroupName, event: &EventId) -> Result<Url> {
		let mut rsvps = self.endpoints.api.clone();

		rsvps
			.path_segments_mut()
			.map_err(|()| ConfigError::InvalidUrl {
				source: url::ParseError::RelativeUrlWithCannotBeABaseBase,
			})?
			.pop_if_empty()
			.extend([group.as_ref(), "events", event.as_ref(), "rsvps"]);

		Ok(rsvps)
	}
}
