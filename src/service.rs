//! Normalized RSVP view handed to the HTTP layer.

// crates.io
use serde::{Deserializer, Serializer};
// self
use crate::{
	_prelude::*,
	auth::EventId,
	cache::ResponseCache,
	upstream::{RsvpEntry, RsvpResponse},
};

/// One attendee as exposed to clients.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Attendee {
	/// Upstream member identifier.
	pub id: String,
	/// Display name.
	pub name: String,
	/// Thumbnail avatar link; serialized as `""` when the member has none.
	#[serde(default, serialize_with = "link_or_empty", deserialize_with = "empty_as_none")]
	pub thumb_link: Option<String>,
	/// Full-size avatar link; serialized as `""` when the member has none.
	#[serde(default, serialize_with = "link_or_empty", deserialize_with = "empty_as_none")]
	pub photo_link: Option<String>,
	/// Additional guests the attendee brings.
	#[serde(default)]
	pub guests: u32,
}
impl From<&RsvpEntry> for Attendee {
	fn from(entry: &RsvpEntry) -> Self {
		let photo = entry.member.photo.as_ref();

		Self {
			id: entry.member.id.clone(),
			name: entry.member.name.clone(),
			thumb_link: photo.and_then(|photo| photo.thumb_link.clone()),
			photo_link: photo.and_then(|photo| photo.photo_link.clone()),
			guests: entry.guests,
		}
	}
}

fn link_or_empty<S>(link: &Option<String>, serializer: S) -> Result<S::Ok, S::Error>
where
	S: Serializer,
{
	serializer.serialize_str(link.as_deref().unwrap_or_default())
}

fn empty_as_none<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
	D: Deserializer<'de>,
{
	let link = Option::<String>::deserialize(deserializer)?;

	Ok(link.filter(|link| !link.is_empty()))
}

/// Attendees partitioned by their answer.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Rsvps {
	/// Members that answered yes, in upstream order.
	pub yes: Vec<Attendee>,
	/// Members that answered no, in upstream order.
	pub no: Vec<Attendee>,
}
impl Rsvps {
	/// Splits raw entries into the yes and no lists; every other answer is dropped.
	pub fn from_entries(entries: &[RsvpEntry]) -> Self {
		let mut rsvps = Self::default();

		for entry in entries {
			match entry.response {
				RsvpResponse::Yes => rsvps.yes.push(entry.into()),
				RsvpResponse::No => rsvps.no.push(entry.into()),
				RsvpResponse::Waitlist | RsvpResponse::Other(_) => {},
			}
		}

		rsvps
	}
}

/// Failure surfaced to the HTTP layer; upstream detail stays in the logs.
#[derive(Clone, Copy, Debug, PartialEq, Eq, ThisError)]
pub enum ServiceError {
	/// RSVPs could not be obtained from the upstream API.
	#[error("RSVPs are temporarily unavailable.")]
	Unavailable,
}

/// Entry point the HTTP layer calls for an event's RSVPs.
#[derive(Clone, Debug)]
pub struct RsvpService {
	cache: Arc<ResponseCache>,
}
impl RsvpService {
	/// Wraps the shared cache.
	pub fn new(cache: Arc<ResponseCache>) -> Self {
		Self { cache }
	}

	/// Shared cache backing the service.
	pub fn cache(&self) -> &Arc<ResponseCache> {
		&self.cache
	}

	/// Returns the normalized RSVPs of `event`.
	pub async fn rsvps(&self, event: &EventId) -> Result<Rsvps, ServiceError> {
		match self.cache.get_or_fetch(event).await {
			Ok(set) => Ok(Rsvps::from_entries(&set)),
			Err(err) => {
				tracing::error!(%event, error = %err, "Failed to fetch RSVPs.");

				Err(ServiceError::Unavailable)
			},
		}
	}
}

#[cfg(test)]
mod tests {
	// self
	use super::*;
	use crate::upstream::{Member, Photo};

	fn entry(id: &str, response: RsvpResponse, photo: Option<Photo>) -> RsvpEntry {
		RsvpEntry {
			member: Member { id: id.into(), name: format!("Member {id}"), photo },
			response,
			guests: 0,
		}
	}

	#[test]
	fn entries_are_partitioned_by_response() {
		let photo = Photo {
			photo_link: Some("https://img.example.com/1.jpg".into()),
			thumb_link: Some("https://img.example.com/1_thumb.jpg".into()),
		};
		let rsvps = Rsvps::from_entries(&[
			entry("1", RsvpResponse::Yes, Some(photo)),
			entry("2", RsvpResponse::No, None),
			entry("3", RsvpResponse::Waitlist, None),
			entry("4", RsvpResponse::Other("maybe".into()), None),
		]);

		assert_eq!(rsvps.yes.len(), 1);
		assert_eq!(rsvps.no.len(), 1);
		assert_eq!(rsvps.yes[0].id, "1");
		assert_eq!(rsvps.yes[0].name, "Member 1");
		assert_eq!(rsvps.yes[0].photo_link.as_deref(), Some("https://img.example.com/1.jpg"));
		assert_eq!(rsvps.yes[0].thumb_link.as_deref(), Some("https://img.example.com/1_thumb.jpg"));
		assert_eq!(rsvps.no[0].id, "2");
		assert!(rsvps.no[0].photo_link.is_none());
	}

	#[test]
	fn attendees_serialize_in_camel_case() {
		let attendee = Attendee {
			id: "1".into(),
			name: "Ada".into(),
			thumb_link: Some("t.jpg".into()),
			photo_link: None,
			guests: 1,
		};
		let value = serde_json::to_value(&attendee).expect("Attendee should serialize.");

		assert_eq!(
			value,
			serde_json::json!({
				"id": "1",
				"name": "Ada",
				"thumbLink": "t.jpg",
				"photoLink": "",
				"guests": 1
			})
		);

		let parsed: Attendee = serde_json::from_value(value).expect("Attendee should deserialize.");

		assert_eq!(parsed, attendee);
	}
}
