//! Per-action usage limits.

use crate::core::GameState;
use crate::def::{ActionDef, UsageLimit};

/// The first limit the action has already reached, if any.
#[must_use]
pub fn exhausted_limit<'d>(action: &'d ActionDef, state: &GameState) -> Option<&'d UsageLimit> {
    let usage = state.usage(&action.id);
    action
        .limits
        .iter()
        .find(|limit| usage.get(limit.scope) >= limit.max)
}
