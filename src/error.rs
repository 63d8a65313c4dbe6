use rust_decimal::Decimal;
use thiserror::Error;

/// Error taxonomy for the grid engine.
///
/// `Config`, `LadderBelowMinimum` and `Toml` are fatal at startup and never
/// retried. `Exchange` is transient: the current tick is abandoned and the
/// next tick retries naturally. `InsufficientFunds` is fatal for the symbol
/// whose rebalance failed but does not affect other symbols.
#[derive(Error, Debug)]
pub enum GridError {
    #[error("configuration error: {0}")]
    Config(String),

    #[error("config parse error: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("ladder level {level} below exchange minimum: {detail}")]
    LadderBelowMinimum { level: usize, detail: String },

    #[error("insufficient {asset}: need {need}, have {have}")]
    InsufficientFunds {
        asset: String,
        need: Decimal,
        have: Decimal,
    },

    #[error("exchange error: {0}")]
    Exchange(String),

    #[error("store error: {0}")]
    Store(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serde(#[from] serde_json::Error),

    #[error("persisted state for {0} does not match the configured ladder")]
    StateMismatch(String),
}

impl GridError {
    /// Transient errors abandon the current tick; everything else is fatal
    /// for the symbol that raised it.
    pub fn is_transient(&self) -> bool {
        matches!(self, GridError::Exchange(_))
    }
}

pub type GridResult<T> = Result<T, GridError>;
