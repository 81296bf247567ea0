//! Stacking constraints: per-zone caps on token counts.

use crate::core::{KernelError, Result, ZoneId};
use crate::def::{GameDef, StackingConstraint};
use crate::zones::ZoneStore;

impl StackingConstraint {
    /// Whether this constraint governs `zone`.
    #[must_use]
    pub fn applies_to_zone(&self, def: &GameDef, zone: &ZoneId) -> bool {
        if !self.zones.is_empty() && !self.zones.contains(zone) {
            return false;
        }
        match &self.zone_category {
            Some(category) => def
                .zone(zone)
                .and_then(|z| z.category.as_ref())
                .is_some_and(|c| c == category),
            None => true,
        }
    }

    /// Whether a token of `token_type` counts against this constraint.
    #[must_use]
    pub fn counts_type(&self, token_type: &str) -> bool {
        self.token_types.is_empty() || self.token_types.iter().any(|t| t == token_type)
    }
}

/// Check every constraint governing `zone` against its current contents.
pub fn check_stacking(def: &GameDef, zones: &ZoneStore, zone: &ZoneId) -> Result<()> {
    let Some(tokens) = zones.tokens(zone) else {
        return Ok(());
    };
    for constraint in &def.stacking_constraints {
        if !constraint.applies_to_zone(def, zone) {
            continue;
        }
        let count = tokens
            .iter()
            .filter(|t| constraint.counts_type(&t.token_type))
            .count();
        if count > constraint.max as usize {
            return Err(KernelError::StackingViolation {
                constraint: constraint.id.clone(),
                zone: zone.clone(),
                count,
                max: constraint.max,
            });
        }
    }
    Ok(())
}
