use crate::constants::DEFAULT_TICK_INTERVAL;
use crate::error::{GridError, GridResult};
use crate::model::split_symbol;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Per-symbol ladder configuration.
///
/// Decimal fields are toml strings (`max_price = "100"`) so prices and
/// amounts stay exact through parsing.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GridSettings {
    /// Trading pair in `Base/Quote` form.
    pub symbol: String,
    /// Ceiling price of the ladder (level 0).
    pub max_price: Decimal,
    /// Floor price of the ladder (level N).
    pub min_price: Decimal,
    /// Number of price steps N; the ladder has N + 1 levels.
    pub grid_count: u32,
    /// Quote currency committed to the ladder.
    pub total_funds: Decimal,
    /// Reconciliation interval in seconds.
    #[serde(default)]
    pub interval_secs: Option<u64>,
    pub price_decimals: u32,
    pub amount_decimals: u32,
    /// Exchange minimum order amount in base currency.
    pub min_amount: Decimal,
    /// Exchange minimum order notional in quote currency.
    pub min_notional: Decimal,
}

impl GridSettings {
    pub fn validate(&self) -> GridResult<()> {
        if !self.symbol.contains('/') || self.symbol.len() < 3 {
            return Err(GridError::Config(format!(
                "symbol '{}' must be in 'Base/Quote' format",
                self.symbol
            )));
        }
        if self.grid_count < 2 {
            return Err(GridError::Config(format!(
                "grid_count {} must be at least 2",
                self.grid_count
            )));
        }
        if self.min_price <= Decimal::ZERO {
            return Err(GridError::Config("min_price must be positive".into()));
        }
        if self.max_price <= self.min_price {
            return Err(GridError::Config(format!(
                "max_price {} must be greater than min_price {}",
                self.max_price, self.min_price
            )));
        }
        if self.total_funds <= Decimal::ZERO {
            return Err(GridError::Config("total_funds must be positive".into()));
        }
        if let Some(secs) = self.interval_secs {
            if secs == 0 {
                return Err(GridError::Config("interval_secs must be positive".into()));
            }
        }
        Ok(())
    }

    pub fn interval(&self) -> Duration {
        self.interval_secs
            .map(Duration::from_secs)
            .unwrap_or(DEFAULT_TICK_INTERVAL)
    }

    pub fn base_asset(&self) -> &str {
        split_symbol(&self.symbol).map(|(b, _)| b).unwrap_or(&self.symbol)
    }

    pub fn quote_asset(&self) -> &str {
        split_symbol(&self.symbol).map(|(_, q)| q).unwrap_or("USDT")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn settings() -> GridSettings {
        GridSettings {
            symbol: "ETH/USDT".to_string(),
            max_price: dec!(200),
            min_price: dec!(100),
            grid_count: 10,
            total_funds: dec!(1000),
            interval_secs: Some(5),
            price_decimals: 2,
            amount_decimals: 4,
            min_amount: dec!(0.0001),
            min_notional: dec!(10),
        }
    }

    #[test]
    fn accepts_valid_settings() {
        assert!(settings().validate().is_ok());
        assert_eq!(settings().base_asset(), "ETH");
        assert_eq!(settings().quote_asset(), "USDT");
        assert_eq!(settings().interval(), Duration::from_secs(5));
    }

    #[test]
    fn rejects_inverted_range() {
        let mut s = settings();
        s.min_price = dec!(300);
        assert!(s.validate().is_err());
    }

    #[test]
    fn rejects_bad_symbol() {
        let mut s = settings();
        s.symbol = "ETHUSDT".to_string();
        assert!(s.validate().is_err());
    }
}
