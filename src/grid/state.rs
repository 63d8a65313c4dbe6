//! Mutable per-symbol runtime state and its persisted form.
//!
//! `base` is the boundary between "held as inventory" (levels below it) and
//! "held as cash" (levels above it). It moves by exactly one step per
//! observed fill and never leaves `[0, N]`.

use super::ladder::GridLadder;
use crate::error::{GridError, GridResult};
use crate::model::OrderId;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq)]
pub struct GridRuntimeState {
    pub symbol: String,
    base: usize,
    orders: Vec<Option<OrderId>>,
}

impl GridRuntimeState {
    pub fn new(symbol: impl Into<String>, base: usize, max_index: usize) -> Self {
        Self {
            symbol: symbol.into(),
            base: base.min(max_index),
            orders: vec![None; max_index + 1],
        }
    }

    pub fn base(&self) -> usize {
        self.base
    }

    pub fn max_index(&self) -> usize {
        self.orders.len() - 1
    }

    pub fn order_at(&self, level: usize) -> Option<&OrderId> {
        self.orders.get(level).and_then(|o| o.as_ref())
    }

    pub fn set_order(&mut self, level: usize, order_id: OrderId) {
        self.orders[level] = Some(order_id);
    }

    pub fn clear_order(&mut self, level: usize) {
        self.orders[level] = None;
    }

    /// Levels that currently record a resting order.
    pub fn open_orders(&self) -> Vec<(usize, OrderId)> {
        self.orders
            .iter()
            .enumerate()
            .filter_map(|(i, o)| o.clone().map(|id| (i, id)))
            .collect()
    }

    /// Price rose and the sell at `base - 1` filled. Returns false at the
    /// top of the ladder, where no lower base exists.
    pub fn advance_up(&mut self) -> bool {
        if self.base == 0 {
            return false;
        }
        self.base -= 1;
        true
    }

    /// Price fell and the buy at `base + 1` filled. Returns false at the
    /// bottom of the ladder.
    pub fn advance_down(&mut self) -> bool {
        if self.base == self.max_index() {
            return false;
        }
        self.base += 1;
        true
    }
}

/// Persisted record, one per symbol. Shape: `{symbol, base, levels}` with the
/// ladder definition and order ids stored together for fast recovery.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GridRecord {
    pub symbol: String,
    pub base: usize,
    pub levels: Vec<LevelRecord>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LevelRecord {
    pub id: usize,
    pub price: Decimal,
    pub amount_buy: Decimal,
    pub amount_sell: Decimal,
    pub total_buy: Decimal,
    pub order_id: Option<OrderId>,
}

impl GridRecord {
    pub fn from_state(state: &GridRuntimeState, ladder: &GridLadder) -> Self {
        Self {
            symbol: state.symbol.clone(),
            base: state.base,
            levels: ladder
                .levels()
                .iter()
                .map(|l| LevelRecord {
                    id: l.id,
                    price: l.price,
                    amount_buy: l.amount_buy,
                    amount_sell: l.amount_sell,
                    total_buy: l.total_buy,
                    order_id: state.order_at(l.id).cloned(),
                })
                .collect(),
        }
    }

    /// Rehydrates runtime state, validating the record against the ladder
    /// rebuilt from configuration. A changed ladder cannot safely adopt old
    /// order bookkeeping, so a mismatch is fatal rather than papered over.
    pub fn into_state(self, ladder: &GridLadder) -> GridResult<GridRuntimeState> {
        if self.levels.len() != ladder.levels().len() {
            return Err(GridError::StateMismatch(self.symbol));
        }
        for (record, level) in self.levels.iter().zip(ladder.levels()) {
            if record.price != level.price || record.amount_buy != level.amount_buy {
                return Err(GridError::StateMismatch(self.symbol));
            }
        }
        if self.base > ladder.max_index() {
            return Err(GridError::StateMismatch(self.symbol));
        }
        let mut state = GridRuntimeState::new(self.symbol, self.base, ladder.max_index());
        for record in self.levels {
            if let Some(order_id) = record.order_id {
                state.set_order(record.id, order_id);
            }
        }
        Ok(state)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::grid::GridSettings;
    use rust_decimal_macros::dec;

    fn ladder() -> GridLadder {
        GridLadder::build(&GridSettings {
            symbol: "BTC/USDT".to_string(),
            max_price: dec!(100),
            min_price: dec!(80),
            grid_count: 5,
            total_funds: dec!(500),
            interval_secs: None,
            price_decimals: 2,
            amount_decimals: 4,
            min_amount: dec!(0.0001),
            min_notional: dec!(10),
        })
        .unwrap()
    }

    #[test]
    fn base_never_leaves_bounds() {
        let mut state = GridRuntimeState::new("BTC/USDT", 0, 5);
        assert!(!state.advance_up());
        assert_eq!(state.base(), 0);

        let mut state = GridRuntimeState::new("BTC/USDT", 5, 5);
        assert!(!state.advance_down());
        assert_eq!(state.base(), 5);
    }

    #[test]
    fn transitions_step_exactly_one_level() {
        let mut state = GridRuntimeState::new("BTC/USDT", 3, 5);
        assert!(state.advance_up());
        assert_eq!(state.base(), 2);
        assert!(state.advance_down());
        assert_eq!(state.base(), 3);
    }

    #[test]
    fn record_round_trips_through_serde() {
        let l = ladder();
        let mut state = GridRuntimeState::new("BTC/USDT", 2, l.max_index());
        state.set_order(1, OrderId("paper-7".to_string()));
        state.set_order(3, OrderId("paper-8".to_string()));

        let record = GridRecord::from_state(&state, &l);
        let json = serde_json::to_string(&record).unwrap();
        let loaded: GridRecord = serde_json::from_str(&json).unwrap();
        let restored = loaded.into_state(&l).unwrap();

        assert_eq!(restored, state);
        assert_eq!(restored.order_at(1), Some(&OrderId("paper-7".to_string())));
        assert!(restored.order_at(2).is_none());
    }

    #[test]
    fn mismatched_ladder_is_rejected() {
        let l = ladder();
        let state = GridRuntimeState::new("BTC/USDT", 2, l.max_index());
        let mut record = GridRecord::from_state(&state, &l);
        record.levels[1].price = dec!(123.45);
        assert!(matches!(
            record.into_state(&l),
            Err(GridError::StateMismatch(_))
        ));
    }
}
