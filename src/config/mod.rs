use crate::error::{GridError, GridResult};
use std::fs;

pub mod broadcast;
pub mod exchange;
pub mod grid;

use self::exchange::ExchangeConfig;
use self::grid::GridSettings;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    pub exchange: ExchangeConfig,
    #[serde(default)]
    pub grids: Vec<GridSettings>,
    #[serde(default)]
    pub paper: exchange::PaperConfig,
}

impl AppConfig {
    pub fn validate(&self) -> GridResult<()> {
        if self.grids.is_empty() {
            return Err(GridError::Config("no [[grids]] entries configured".into()));
        }
        let mut seen = std::collections::HashSet::new();
        for grid in &self.grids {
            grid.validate()?;
            if !seen.insert(grid.symbol.as_str()) {
                return Err(GridError::Config(format!(
                    "duplicate grid entry for symbol {}",
                    grid.symbol
                )));
            }
        }
        Ok(())
    }

    pub fn grid(&self, symbol: &str) -> Option<&GridSettings> {
        self.grids.iter().find(|g| g.symbol == symbol)
    }
}

pub fn load_config(path: &str) -> GridResult<AppConfig> {
    let content = fs::read_to_string(path)?;
    let config: AppConfig = toml::from_str(&content)?;
    config.validate()?;
    Ok(config)
}
