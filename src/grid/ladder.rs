//! Ladder construction.
//!
//! A ladder is a fixed set of price levels between a floor and a ceiling,
//! strictly decreasing by a constant ratio. It is rebuilt identically from
//! configuration on every process start and never mutated afterwards.

use crate::config::grid::GridSettings;
use crate::error::{GridError, GridResult};
use rust_decimal::prelude::{FromPrimitive, ToPrimitive};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// One price level. `id` runs from 0 (ceiling) to N (floor).
///
/// `amount_sell[i] == amount_buy[i + 1]`: selling at a level disposes of
/// exactly the inventory acquired one level below it. The top level has no
/// buy amount and the bottom level has no sell amount.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GridLevel {
    pub id: usize,
    pub price: Decimal,
    pub amount_buy: Decimal,
    pub amount_sell: Decimal,
    pub total_buy: Decimal,
}

#[derive(Debug, Clone, PartialEq)]
pub struct GridLadder {
    levels: Vec<GridLevel>,
}

impl GridLadder {
    /// Builds the ladder for a symbol. Fails fast on any level that falls
    /// below the exchange minimums: a misconfigured ladder can never trade
    /// correctly and must not start.
    pub fn build(settings: &GridSettings) -> GridResult<Self> {
        settings.validate()?;
        let n = settings.grid_count as usize;

        let ratio = (settings.min_price / settings.max_price)
            .to_f64()
            .unwrap_or(0.0);
        let scale = Decimal::from_f64(ratio.powf(1.0 / n as f64)).ok_or_else(|| {
            GridError::Config(format!(
                "cannot derive grid scale from range [{}, {}]",
                settings.min_price, settings.max_price
            ))
        })?;

        let mut prices = Vec::with_capacity(n + 1);
        prices.push(settings.max_price.round_dp(settings.price_decimals));
        for i in 1..=n {
            let price = (prices[i - 1] * scale).round_dp(settings.price_decimals);
            if price >= prices[i - 1] || price <= Decimal::ZERO {
                return Err(GridError::Config(format!(
                    "grid too dense for price precision: level {} rounds to {}",
                    i, price
                )));
            }
            prices.push(price);
        }

        let per_level_funds = settings.total_funds / Decimal::from(n as u64);
        let mut amounts = vec![Decimal::ZERO; n + 1];
        for i in 1..=n {
            let amount = (per_level_funds / prices[i]).round_dp(settings.amount_decimals);
            if amount < settings.min_amount {
                return Err(GridError::LadderBelowMinimum {
                    level: i,
                    detail: format!(
                        "amount {} below exchange minimum {}",
                        amount, settings.min_amount
                    ),
                });
            }
            let notional = prices[i] * amount;
            if notional < settings.min_notional {
                return Err(GridError::LadderBelowMinimum {
                    level: i,
                    detail: format!(
                        "notional {} below exchange minimum {}",
                        notional, settings.min_notional
                    ),
                });
            }
            amounts[i] = amount;
        }

        let levels = (0..=n)
            .map(|i| GridLevel {
                id: i,
                price: prices[i],
                amount_buy: amounts[i],
                amount_sell: if i < n { amounts[i + 1] } else { Decimal::ZERO },
                total_buy: prices[i] * amounts[i],
            })
            .collect();

        Ok(Self { levels })
    }

    /// Highest level index N.
    pub fn max_index(&self) -> usize {
        self.levels.len() - 1
    }

    pub fn level(&self, id: usize) -> &GridLevel {
        &self.levels[id]
    }

    pub fn levels(&self) -> &[GridLevel] {
        &self.levels
    }

    /// Number of levels priced strictly above the market, clamped to `[0, N]`.
    /// Levels below this index are held as inventory, levels above as cash.
    pub fn base_for_price(&self, market_price: Decimal) -> usize {
        let above = self
            .levels
            .iter()
            .filter(|l| l.price > market_price)
            .count();
        above.min(self.max_index())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn settings() -> GridSettings {
        GridSettings {
            symbol: "BTC/USDT".to_string(),
            max_price: dec!(100),
            min_price: dec!(90),
            grid_count: 2,
            total_funds: dec!(100),
            interval_secs: None,
            price_decimals: 2,
            amount_decimals: 4,
            min_amount: dec!(0.0001),
            min_notional: dec!(10),
        }
    }

    #[test]
    fn builds_reference_ladder() {
        // scale = (90/100)^(1/2) = 0.94868...
        let ladder = GridLadder::build(&settings()).unwrap();
        assert_eq!(ladder.max_index(), 2);
        assert_eq!(ladder.level(0).price, dec!(100.00));
        assert_eq!(ladder.level(1).price, dec!(94.87));
        assert_eq!(ladder.level(2).price, dec!(90.00));

        // 50 quote per step: 50 / 94.87 = 0.5270...
        assert_eq!(ladder.level(1).amount_buy, dec!(0.5270));
        assert_eq!(ladder.level(0).amount_sell, ladder.level(1).amount_buy);
        assert_eq!(ladder.level(0).amount_buy, Decimal::ZERO);
        assert_eq!(ladder.level(2).amount_sell, Decimal::ZERO);
    }

    #[test]
    fn prices_strictly_decrease_and_sells_chain() {
        let mut s = settings();
        s.grid_count = 8;
        s.max_price = dec!(250);
        s.min_price = dec!(120);
        s.total_funds = dec!(2000);
        let ladder = GridLadder::build(&s).unwrap();
        for i in 0..ladder.max_index() {
            assert!(ladder.level(i).price > ladder.level(i + 1).price);
            assert_eq!(ladder.level(i).amount_sell, ladder.level(i + 1).amount_buy);
        }
    }

    #[test]
    fn rejects_amount_below_exchange_minimum() {
        let mut s = settings();
        s.min_amount = dec!(1);
        match GridLadder::build(&s) {
            Err(GridError::LadderBelowMinimum { level, .. }) => assert_eq!(level, 1),
            other => panic!("expected LadderBelowMinimum, got {:?}", other.map(|_| ())),
        }
    }

    #[test]
    fn rejects_notional_below_exchange_minimum() {
        let mut s = settings();
        s.min_notional = dec!(60);
        assert!(matches!(
            GridLadder::build(&s),
            Err(GridError::LadderBelowMinimum { .. })
        ));
    }

    #[test]
    fn base_index_counts_levels_above_market() {
        let ladder = GridLadder::build(&settings()).unwrap();
        // price[0]=100, price[1]=94.87, price[2]=90
        assert_eq!(ladder.base_for_price(dec!(95)), 1);
        assert_eq!(ladder.base_for_price(dec!(101)), 0);
        assert_eq!(ladder.base_for_price(dec!(92)), 2);
        // Below the floor the base clamps to N.
        assert_eq!(ladder.base_for_price(dec!(80)), 2);
    }
}
