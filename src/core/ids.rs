//! Opaque string identifiers for definition and state entities.
//!
//! The kernel never interprets these beyond equality and ordering, with one
//! exception: zone ids follow the `base:owner` convention (`deck:none`,
//! `hand:0`) so that per-seat zones can be addressed by base name and seat.

use serde::{Deserialize, Serialize};

use super::player::PlayerId;

macro_rules! string_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(pub String);

        impl $name {
            /// Create a new identifier.
            #[must_use]
            pub fn new(id: impl Into<String>) -> Self {
                Self(id.into())
            }

            /// Borrow the raw identifier.
            #[must_use]
            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl From<&str> for $name {
            fn from(id: &str) -> Self {
                Self(id.to_string())
            }
        }
    };
}

string_id!(
    /// Zone identifier (`base:owner`).
    ZoneId
);
string_id!(
    /// Action identifier.
    ActionId
);
string_id!(
    /// Phase identifier.
    PhaseId
);
string_id!(
    /// Token identifier, allocated from the state's ordinal counter.
    TokenId
);
string_id!(
    /// Trigger identifier.
    TriggerId
);
string_id!(
    /// Action pipeline identifier.
    PipelineId
);

impl ZoneId {
    /// Build a zone id from a base name and an optional owning seat.
    #[must_use]
    pub fn owned(base: &str, owner: Option<PlayerId>) -> Self {
        match owner {
            Some(player) => Self(format!("{base}:{}", player.0)),
            None => Self(format!("{base}:none")),
        }
    }

    /// The base part of the id (`hand` for `hand:0`).
    #[must_use]
    pub fn base(&self) -> &str {
        self.0.split_once(':').map_or(self.0.as_str(), |(base, _)| base)
    }

    /// The owning seat, if the owner suffix is a seat index.
    #[must_use]
    pub fn owner(&self) -> Option<PlayerId> {
        self.0
            .split_once(':')
            .and_then(|(_, owner)| owner.parse::<u8>().ok())
            .map(PlayerId)
    }
}

impl TokenId {
    /// Allocate the id for the token created with the given ordinal.
    #[must_use]
    pub fn from_ordinal(token_type: &str, ordinal: u64) -> Self {
        Self(format!("{token_type}#{ordinal}"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_zone_id_owner_convention() {
        let hand = ZoneId::owned("hand", Some(PlayerId::new(1)));
        assert_eq!(hand.as_str(), "hand:1");
        assert_eq!(hand.base(), "hand");
        assert_eq!(hand.owner(), Some(PlayerId::new(1)));

        let deck = ZoneId::owned("deck", None);
        assert_eq!(deck.as_str(), "deck:none");
        assert_eq!(deck.owner(), None);
    }

    #[test]
    fn test_token_id_from_ordinal() {
        assert_eq!(TokenId::from_ordinal("troop", 7).as_str(), "troop#7");
    }

    #[test]
    fn test_ids_serialize_transparently() {
        let id = ActionId::new("rally");
        assert_eq!(serde_json::to_string(&id).unwrap(), "\"rally\"");
    }
}
