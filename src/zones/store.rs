//! Zone storage: token lists keyed by zone id.
//!
//! The `ZoneStore` tracks which tokens live in which zone and in what order.
//! It supports:
//! - Ordered token lists (index 0 is the front/top of the zone)
//! - Insertion at the front, the back or an explicit index
//! - Token lookup by id with single-ownership checking
//! - Zone iteration in id order
//!
//! Lists are persistent `im::Vector`s, so cloning a store is O(1).

use std::collections::BTreeMap;

use im::{OrdMap, Vector};
use serde::{Deserialize, Serialize};

use crate::core::{Scalar, TokenId, Value, ZoneId};

/// A token instance.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Token {
    pub id: TokenId,
    #[serde(rename = "type")]
    pub token_type: String,
    #[serde(default)]
    pub props: BTreeMap<String, Scalar>,
}

impl Token {
    /// The token as a binding value.
    #[must_use]
    pub fn as_value(&self) -> Value {
        Value::Token(self.id.clone())
    }
}

/// Position for inserting a token into a zone.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum ZonePosition {
    /// Front of the list (top of a deck).
    Front,
    /// Back of the list.
    Back,
    /// Explicit index, clamped to the list length.
    Index(usize),
}

/// Where a token lives, or why it could not be pinned to one zone.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum TokenLocation {
    Found { zone: ZoneId, index: usize },
    Missing,
    /// Present in more than one place; carries the occurrence count.
    Duplicated(usize),
}

/// Token lists for every declared zone.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ZoneStore {
    zones: OrdMap<ZoneId, Vector<Token>>,
}

impl ZoneStore {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Declare a zone. No-op if it already exists.
    pub fn init_zone(&mut self, zone: ZoneId) {
        if !self.zones.contains_key(&zone) {
            self.zones.insert(zone, Vector::new());
        }
    }

    /// Check if a zone is declared.
    #[must_use]
    pub fn contains_zone(&self, zone: &ZoneId) -> bool {
        self.zones.contains_key(zone)
    }

    /// Tokens of a zone, front first.
    #[must_use]
    pub fn tokens(&self, zone: &ZoneId) -> Option<&Vector<Token>> {
        self.zones.get(zone)
    }

    /// Number of tokens in a zone (0 for unknown zones).
    #[must_use]
    pub fn zone_size(&self, zone: &ZoneId) -> usize {
        self.zones.get(zone).map_or(0, Vector::len)
    }

    /// Iterate zones in id order.
    pub fn iter(&self) -> impl Iterator<Item = (&ZoneId, &Vector<Token>)> {
        self.zones.iter()
    }

    /// Total number of tokens across all zones.
    #[must_use]
    pub fn total_tokens(&self) -> usize {
        self.zones.values().map(Vector::len).sum()
    }

    /// Find a token, counting every occurrence.
    #[must_use]
    pub fn locate(&self, id: &TokenId) -> TokenLocation {
        let mut found = None;
        let mut count = 0;
        for (zone, tokens) in &self.zones {
            for (index, token) in tokens.iter().enumerate() {
                if &token.id == id {
                    count += 1;
                    if found.is_none() {
                        found = Some((zone.clone(), index));
                    }
                }
            }
        }
        match (found, count) {
            (Some((zone, index)), 1) => TokenLocation::Found { zone, index },
            (None, _) => TokenLocation::Missing,
            (Some(_), n) => TokenLocation::Duplicated(n),
        }
    }

    /// Get a token by id (first occurrence).
    #[must_use]
    pub fn token(&self, id: &TokenId) -> Option<&Token> {
        self.zones
            .values()
            .flat_map(|tokens| tokens.iter())
            .find(|token| &token.id == id)
    }

    /// Insert a token. Returns `false` if the zone is not declared.
    pub fn insert(&mut self, zone: &ZoneId, token: Token, position: ZonePosition) -> bool {
        let Some(list) = self.zones.get_mut(zone) else {
            return false;
        };
        match position {
            ZonePosition::Front => list.push_front(token),
            ZonePosition::Back => list.push_back(token),
            ZonePosition::Index(i) => {
                let idx = i.min(list.len());
                list.insert(idx, token);
            }
        }
        true
    }

    /// Remove the token at `index` of `zone`.
    pub fn remove_at(&mut self, zone: &ZoneId, index: usize) -> Option<Token> {
        let list = self.zones.get_mut(zone)?;
        if index < list.len() {
            Some(list.remove(index))
        } else {
            None
        }
    }

    /// Remove up to `count` tokens from the front of a zone, in order.
    pub fn take_front(&mut self, zone: &ZoneId, count: usize) -> Vec<Token> {
        let Some(list) = self.zones.get_mut(zone) else {
            return Vec::new();
        };
        let n = count.min(list.len());
        let rest = list.split_off(n);
        let taken = std::mem::replace(list, rest);
        taken.into_iter().collect()
    }

    /// Replace the whole list of a zone.
    pub fn replace(&mut self, zone: &ZoneId, tokens: Vector<Token>) {
        self.zones.insert(zone.clone(), tokens);
    }

    /// Mutable access to a token by id (first occurrence).
    pub fn token_mut(&mut self, id: &TokenId) -> Option<&mut Token> {
        let zone = self
            .zones
            .iter()
            .find(|(_, tokens)| tokens.iter().any(|token| &token.id == id))
            .map(|(zone, _)| zone.clone())?;
        self.zones
            .get_mut(&zone)?
            .iter_mut()
            .find(|token| &token.id == id)
    }
}
