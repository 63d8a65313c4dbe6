//! One-time inventory adjustment before a ladder goes live.
//!
//! The ladder assumes the resting sell at `base - 1` and every sell above it
//! are covered by held inventory, and every buy below `base` is covered by
//! held quote. The plan computed here is the single trade that aligns actual
//! holdings with that assumption; it is not part of the steady-state loop.

use super::ladder::GridLadder;
use crate::config::grid::GridSettings;
use crate::error::{GridError, GridResult};
use crate::model::OrderSide;
use rust_decimal::Decimal;

#[derive(Debug, Clone, PartialEq)]
pub enum RebalancePlan {
    /// Holdings already match the ladder (or the delta is below exchange
    /// minimums and cannot be traded).
    None,
    Trade { side: OrderSide, amount: Decimal },
}

/// Inventory the ladder assumes at this base: the sell amounts of every
/// level above the base index, i.e. `amount_buy[1..=base]`.
pub fn coin_need(ladder: &GridLadder, base: usize) -> Decimal {
    ladder.levels()[..base].iter().map(|l| l.amount_sell).sum()
}

/// Quote the ladder assumes at this base: the notional of every buy level
/// below it, i.e. `total_buy[base + 1..=N]`.
pub fn money_need(ladder: &GridLadder, base: usize) -> Decimal {
    ladder.levels()[base + 1..].iter().map(|l| l.total_buy).sum()
}

pub fn plan(
    settings: &GridSettings,
    ladder: &GridLadder,
    market_price: Decimal,
    held_base: Decimal,
    held_quote: Decimal,
) -> GridResult<RebalancePlan> {
    let base = ladder.base_for_price(market_price);
    let coin_need = coin_need(ladder, base);
    let money_need = money_need(ladder, base);

    if money_need > held_quote {
        // Short on quote: sell enough base to cover the buy levels.
        let sell_amount =
            ((money_need - held_quote) / market_price).round_dp(settings.amount_decimals);
        if held_base < coin_need + sell_amount {
            return Err(GridError::InsufficientFunds {
                asset: settings.base_asset().to_string(),
                need: coin_need + sell_amount,
                have: held_base,
            });
        }
        if sell_amount < settings.min_amount || sell_amount * market_price < settings.min_notional {
            return Ok(RebalancePlan::None);
        }
        Ok(RebalancePlan::Trade {
            side: OrderSide::Sell,
            amount: sell_amount,
        })
    } else if coin_need > held_base {
        // Short on base: buy the missing inventory.
        let buy_amount = (coin_need - held_base).round_dp(settings.amount_decimals);
        if held_quote < money_need + buy_amount * market_price {
            return Err(GridError::InsufficientFunds {
                asset: settings.quote_asset().to_string(),
                need: money_need + buy_amount * market_price,
                have: held_quote,
            });
        }
        if buy_amount < settings.min_amount || buy_amount * market_price < settings.min_notional {
            return Ok(RebalancePlan::None);
        }
        Ok(RebalancePlan::Trade {
            side: OrderSide::Buy,
            amount: buy_amount,
        })
    } else {
        Ok(RebalancePlan::None)
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

    fn ladder() -> GridLadder {
        GridLadder::build(&settings()).unwrap()
    }

    // Ladder under test: prices [100, 94.87, 90], amount_buy [0, 0.5270,
    // 0.5556]. At market 95 the base index is 1: the resting sell at level 0
    // needs 0.5270 base held, the buy at level 2 needs total_buy[2] quote.

    #[test]
    fn matching_holdings_are_a_noop() {
        let p = plan(&settings(), &ladder(), dec!(95), dec!(0.5270), dec!(51)).unwrap();
        assert_eq!(p, RebalancePlan::None);
    }

    #[test]
    fn missing_inventory_is_bought() {
        match plan(&settings(), &ladder(), dec!(95), dec!(0), dec!(102)).unwrap() {
            RebalancePlan::Trade { side, amount } => {
                assert_eq!(side, OrderSide::Buy);
                assert_eq!(amount, dec!(0.5270));
            }
            other => panic!("expected buy, got {:?}", other),
        }
    }

    #[test]
    fn missing_quote_is_sold_for() {
        let l = ladder();
        match plan(&settings(), &l, dec!(95), dec!(2), dec!(0)).unwrap() {
            RebalancePlan::Trade { side, amount } => {
                assert_eq!(side, OrderSide::Sell);
                assert_eq!(amount, (l.level(2).total_buy / dec!(95)).round_dp(4));
            }
            other => panic!("expected sell, got {:?}", other),
        }
    }

    #[test]
    fn insufficient_base_for_sell_is_fatal() {
        match plan(&settings(), &ladder(), dec!(95), dec!(0.6), dec!(0)) {
            Err(GridError::InsufficientFunds { asset, .. }) => assert_eq!(asset, "BTC"),
            other => panic!("expected InsufficientFunds, got {:?}", other.map(|_| ())),
        }
    }

    #[test]
    fn insufficient_quote_for_buy_is_fatal() {
        // Exactly the ladder's total funds is not enough when the missing
        // inventory must be bought at a market price above its level price.
        match plan(&settings(), &ladder(), dec!(95), dec!(0), dec!(100)) {
            Err(GridError::InsufficientFunds { asset, .. }) => assert_eq!(asset, "USDT"),
            other => panic!("expected InsufficientFunds, got {:?}", other.map(|_| ())),
        }
    }

    #[test]
    fn tiny_deltas_below_minimums_are_skipped() {
        let mut strict = settings();
        strict.min_amount = dec!(1);
        let l = ladder();
        let held = l.level(1).amount_buy - dec!(0.0002);
        let p = plan(&strict, &l, dec!(95), held, dec!(101)).unwrap();
        assert_eq!(p, RebalancePlan::None);
    }
}
