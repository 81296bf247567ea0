//! Zones: token storage, adjacency and stacking.
//!
//! Zones are **definition-configured**, not hardcoded. A definition declares
//! its zones (deck, hands, map spaces, etc.) with ids of the form
//! `base:owner` (`deck:none`, `hand:0`).
//!
//! ## Key Types
//!
//! - `ZoneStore`: token lists per zone, front first
//! - `Token`: a token instance with typed props
//! - `ZonePosition`: insertion position
//! - `AdjacencyGraph`: symmetric zone adjacency built from the definition
//! - `check_stacking`: stacking-constraint enforcement

pub mod adjacency;
pub mod stacking;
pub mod store;

pub use adjacency::AdjacencyGraph;
pub use stacking::check_stacking;
pub use store::{Token, TokenLocation, ZonePosition, ZoneStore};
