//! Response behaviors applied after a response is chosen.
//!
//! - `delay` - Per-response and global per-destination latency rules

mod delay;

pub use delay::{
    apply as apply_delay, delay_for, plan as plan_delay, DelayRule, LogNormalBounds,
    LogNormalDelayRule, PlannedDelay, RESPONSE_DELAY_LABEL,
};
