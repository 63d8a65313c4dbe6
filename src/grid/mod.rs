//! Grid trading core: ladder construction, base-index state machine,
//! reconciliation engine, and the supporting persistence pieces.

pub mod engine;
pub mod ladder;
pub mod manager;
pub mod persist;
pub mod rebalance;
pub mod sequencer;
pub mod state;

pub use engine::{GridEngine, GridStatus, OpenOrder};
pub use ladder::{GridLadder, GridLevel};
pub use manager::GridManager;
pub use persist::PersistenceGateway;
pub use rebalance::RebalancePlan;
pub use sequencer::OrderIdSequencer;
pub use state::{GridRecord, GridRuntimeState};
