//! Turn order and card-driven eligibility.
//!
//! ## Turn orders
//!
//! - Round robin and fixed order: the active seat changes at turn boundaries
//! - Simultaneous: every seat submits once; the last submission ends the turn
//! - Card driven: seats act in eligibility order on each card, free
//!   operations are granted by effects, and card ends are turn boundaries
//!
//! ## Grant window
//!
//! While any free-operation grant is pending, the front grant's holder is
//! the active seat and only free operations and the pass action are legal.

mod eligibility;
mod grants;
mod runtime;

pub use eligibility::{
    apply_turn_flow_eligibility_after_move, card_should_end, end_card, rotate_turn_order,
    skip_stuck_seat, sync_active_seat, TurnFlowOutcome,
};
pub use grants::{
    check_free_operation_grant, consume_turn_flow_free_operation_grant, decline_grants,
    is_sequence_locked,
};
pub use runtime::{CardDrivenRuntime, EligibilityOverride, FreeOperationGrant, TurnOrderRuntime};
