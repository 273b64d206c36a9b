//! Strongly typed identifiers for events, groups, and providers.
//!
//! Event and group identifiers end up as path segments of upstream URLs, so they reject
//! characters that would change the request path or query.

// std
use std::{borrow::Borrow, ops::Deref};
// self
use crate::_prelude::*;

macro_rules! def_id {
	($name:ident, $doc:literal, $kind:literal) => {
		#[doc = $doc]
		#[derive(Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
		#[serde(try_from = "String", into = "String")]
		pub struct $name(String);
		impl $name {
			/// Creates a new identifier after validation.
			pub fn new(value: impl AsRef<str>) -> Result<Self, IdentifierError> {
				let view = value.as_ref();

				validate_view($kind, view)?;

				Ok(Self(view.to_owned()))
			}
		}
		impl Deref for $name {
			type Target = str;

			fn deref(&self) -> &Self::Target {
				&self.0
			}
		}
		impl AsRef<str> for $name {
			fn as_ref(&self) -> &str {
				&self.0
			}
		}
		impl From<$name> for String {
			fn from(value: $name) -> Self {
				value.0
			}
		}
		impl TryFrom<String> for $name {
			type Error = IdentifierError;

			fn try_from(value: String) -> Result<Self, Self::Error> {
				validate_view($kind, &value)?;

				Ok(Self(value))
			}
		}
		impl Borrow<str> for $name {
			fn borrow(&self) -> &str {
				&self.0
			}
		}
		impl Debug for $name {
			fn fmt(&self, f: &mut Formatter) -> FmtResult {
				write!(f, concat!($kind, "({})"), self.0)
			}
		}
		impl Display for $name {
			fn fmt(&self, f: &mut Formatter) -> FmtResult {
				f.write_str(&self.0)
			}
		}
		impl FromStr for $name {
			type Err = IdentifierError;

			fn from_str(s: &str) -> Result<Self, Self::Err> {
				Self::new(s)
			}
		}
	};
}

const IDENTIFIER_MAX_LEN: usize = 128;
const RESERVED_CHARS: [char; 5] = ['/', '\\', '?', '#', '%'];

/// Error returned when identifier validation fails.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, ThisError)]
pub enum IdentifierError {
	/// The identifier was empty.
	#[error("{kind} identifier cannot be empty.")]
	Empty {
		/// Kind of identifier (event, group, provider).
		kind: &'static str,
	},
	/// The identifier contains whitespace characters.
	#[error("{kind} identifier contains whitespace.")]
	ContainsWhitespace {
		/// Kind of identifier (event, group, provider).
		kind: &'static str,
	},
	/// The identifier contains a URL delimiter.
	#[error("{kind} identifier contains the reserved character `{found}`.")]
	ReservedCharacter {
		/// Kind of identifier (event, group, provider).
		kind: &'static str,
		/// First offending character.
		found: char,
	},
	/// The identifier is a relative path segment (`.` or `..`).
	#[error("{kind} identifier cannot be a dot segment.")]
	DotSegment {
		/// Kind of identifier (event, group, provider).
		kind: &'static str,
	},
	/// The identifier exceeded the allowed character count.
	#[error("{kind} identifier exceeds {max} characters.")]
	TooLong {
		/// Kind of identifier (event, group, provider).
		kind: &'static str,
		/// Maximum permitted character count.
		max: usize,
	},
}

def_id! { EventId, "Identifier of a single event on the upstream API.", "Event" }
def_id! { GroupName, "URL name of the group that owns the events.", "Group" }
def_id! { ProviderId, "Identifier for an OAuth provider descriptor.", "Provider" }

fn validate_view(kind: &'static str, view: &str) -> Result<(), IdentifierError> {
	if view.is_empty() {
		return Err(IdentifierError::Empty { kind });
	}
	if view.chars().any(char::is_whitespace) {
		return Err(IdentifierError::ContainsWhitespace { kind });
	}
	if let Some(found) = view.chars().find(|c| RESERVED_CHARS.contains(c)) {
		return Err(IdentifierError::ReservedCharacter { kind, found });
	}
	if matches!(view, "." | "..") {
		return Err(IdentifierError::DotSegment { kind });
	}
	if view.len() > IDENTIFIER_MAX_LEN {
		return Err(IdentifierError::TooLong { kind, max: IDENTIFIER_MAX_LEN });
	}

	Ok(())
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	#[test]
	fn identifiers_reject_whitespace_and_empty_values() {
		assert!(EventId::new(" 296131786").is_err(), "Leading whitespace must be rejected.");
		assert!(EventId::new("296131786 ").is_err(), "Trailing whitespace must be rejected.");

		let event = EventId::new("296131786").expect("Event fixture should be considered valid.");

		assert_eq!(event.as_ref(), "296131786");
		assert!(GroupName::new("").is_err());
		assert!(ProviderId::new("with space").is_err());
	}

	#[test]
	fn path_delimiters_are_rejected() {
		let err = EventId::new("123/../admin").expect_err("Slashes must be rejected.");

		assert_eq!(err, IdentifierError::ReservedCharacter { kind: "Event", found: '/' });
		assert!(EventId::new("123?x=1").is_err());
		assert!(GroupName::new("group#frag").is_err());
		assert!(GroupName::new("group%2F").is_err());
		assert!(GroupName::new("Graz-Open-Source-Meetup").is_ok());
	}

	#[test]
	fn dot_segments_and_backslashes_are_rejected() {
		assert_eq!(EventId::new(".").expect_err("`.` must be rejected."), IdentifierError::DotSegment {
			kind: "Event"
		});
		assert_eq!(EventId::new("..").expect_err("`..` must be rejected."), IdentifierError::DotSegment {
			kind: "Event"
		});
		assert_eq!(
			EventId::new("..\\..\\self").expect_err("Backslashes must be rejected."),
			IdentifierError::ReservedCharacter { kind: "Event", found: '\\' }
		);
		assert!(GroupName::new("..").is_err());
		assert!(EventId::new("...").is_ok());
		assert!(EventId::new("v1.2").is_ok());
	}

	#[test]
	fn serde_round_trip_enforces_validation() {
		let event: EventId =
			serde_json::from_str("\"event-42\"").expect("Event should deserialize successfully.");

		assert_eq!(event.as_ref(), "event-42");
		assert!(serde_json::from_str::<EventId>("\"with space\"").is_err());
		assert!(serde_json::from_str::<EventId>("\"a/b\"").is_err());
	}

	#[test]
	fn length_limit_is_inclusive() {
		let exact = "a".repeat(IDENTIFIER_MAX_LEN);

		EventId::new(&exact).expect("Exact length should succeed.");

		let too_long = "a".repeat(IDENTIFIER_MAX_LEN + 1);

		assert!(EventId::new(&too_long).is_err());
	}

	#[test]
	fn borrow_supports_fast_lookup() {
		let map: HashMap<EventId, u8> = HashMap::from_iter([(
			EventId::new("event-123").expect("Event used for lookup should be valid."),
			7_u8,
		)]);

		assert_eq!(map.get("event-123"), Some(&7));
	}
}
