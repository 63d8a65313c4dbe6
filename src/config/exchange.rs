use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::PathBuf;

fn default_data_dir() -> PathBuf {
    PathBuf::from("data")
}

/// Which venue the engine talks to and where durable state lives.
///
/// Concrete exchange adapters plug in behind the `ExchangeAdapter` trait;
/// `paper` is the only adapter built into this crate.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExchangeConfig {
    pub name: String,
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,
}

/// Seed state for the paper exchange used by tests and `--dry-run`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PaperConfig {
    /// Initial last price per symbol.
    #[serde(default)]
    pub prices: HashMap<String, Decimal>,
    /// Initial available balance per currency.
    #[serde(default)]
    pub balances: HashMap<String, Decimal>,
}
