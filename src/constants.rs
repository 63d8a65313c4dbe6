//! Central configuration constants for gridbot.
//!
//! Tunable parameters and magic numbers used throughout the engine. Modify
//! values here to adjust behavior without changing business logic.

use std::time::Duration;

// =============================================================================
// IDENTIFIER SEQUENCER
// =============================================================================

/// The persisted order sequence wraps at this bound.
pub const SEQUENCE_BOUND: u64 = 10_000;

/// Prefix embedded in every client order id.
pub const CLIENT_ID_PREFIX: &str = "grid";

// =============================================================================
// ENGINE TIMER INTERVALS
// =============================================================================

/// Default reconciliation interval when a grid does not configure one.
pub const DEFAULT_TICK_INTERVAL: Duration = Duration::from_secs(10);

/// Poll interval while waiting for the one-time rebalance order to fill.
pub const REBALANCE_POLL_INTERVAL: Duration = Duration::from_secs(2);

// =============================================================================
// BROADCAST
// =============================================================================

/// Capacity of the engine event broadcast channel.
pub const BROADCAST_CAPACITY: usize = 100;
