//! Wire models for the RSVP endpoint.

// std
use std::ops::Deref;
// self
use crate::_prelude::*;

/// Attendee's answer to an event invitation.
///
/// The API has used both `yes` and `YES` over time, so decoding ignores case. Unknown
/// answers are preserved verbatim in [`RsvpResponse::Other`].
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum RsvpResponse {
	/// Attending.
	Yes,
	/// Not attending.
	No,
	/// On the waiting list.
	Waitlist,
	/// Any other answer the API may add.
	Other(String),
}
impl RsvpResponse {
	/// Returns the lowercase wire label.
	pub fn as_str(&self) -> &str {
		match self {
			Self::Yes => "yes",
			Self::No => "no",
			Self::Waitlist => "waitlist",
			Self::Other(raw) => raw,
		}
	}
}
impl From<String> for RsvpResponse {
	fn from(raw: String) -> Self {
		match raw.to_ascii_lowercase().as_str() {
			"yes" => Self::Yes,
			"no" => Self::No,
			"waitlist" => Self::Waitlist,
			_ => Self::Other(raw),
		}
	}
}
impl From<RsvpResponse> for String {
	fn from(value: RsvpResponse) -> Self {
		match value {
			RsvpResponse::Other(raw) => raw,
			known => known.as_str().to_owned(),
		}
	}
}

/// Avatar links of a member.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Photo {
	/// Full-size avatar.
	#[serde(default)]
	pub photo_link: Option<String>,
	/// Thumbnail avatar.
	#[serde(default)]
	pub thumb_link: Option<String>,
}

/// Member that answered the invitation.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Member {
	/// Member identifier; the API sends numbers, older payloads sent strings.
	#[serde(deserialize_with = "member_id")]
	pub id: String,
	/// Display name.
	#[serde(default)]
	pub name: String,
	/// Avatar links; absent for members without a photo.
	#[serde(default)]
	pub photo: Option<Photo>,
}

/// One attendee record as returned by the API.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RsvpEntry {
	/// Member that answered.
	pub member: Member,
	/// The answer itself.
	pub response: RsvpResponse,
	/// Additional guests the member brings.
	#[serde(default)]
	pub guests: u32,
}

/// Immutable RSVP list produced by a single upstream fetch.
///
/// Clones share the same allocation, so the cache hands out the exact list it stored.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RsvpSet(Arc<[RsvpEntry]>);
impl RsvpSet {
	/// Returns `true` when both handles point at the same fetch result.
	pub fn is_same_fetch(&self, other: &Self) -> bool {
		Arc::ptr_eq(&self.0, &other.0)
	}
}
impl From<Vec<RsvpEntry>> for RsvpSet {
	fn from(entries: Vec<RsvpEntry>) -> Self {
		Self(entries.into())
	}
}
impl Deref for RsvpSet {
	type Target = [RsvpEntry];

	fn deref(&self) -> &Self::Target {
		&self.0
	}
}

fn member_id<'de, D>(deserializer: D) -> Result<String, D::Error>
where
	D: serde::Deserializer<'de>,
{
	#[derive(Deserialize)]
	#[serde(untagged)]
	enum RawId {
		Text(String),
		Signed(i64),
		Unsigned(u64),
	}

	Ok(match RawId::deserialize(deserializer)? {
		RawId::Text(value) => value,
		RawId::Signed(value) => value.to_string(),
		RawId::Unsigned(value) => value.to_string(),
	})
}
