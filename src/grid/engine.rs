//! Per-symbol reconciliation loop.
//!
//! The engine never reacts to pushed events. Every tick it re-reads the
//! market and the exchange's view of its orders, applies at most one base
//! transition, and repairs the resting-order pair around the base index.
//! State is persisted after every step of a transition so a crash at any
//! point resumes into a tick that converges back to the invariant.

use super::ladder::GridLadder;
use super::persist::PersistenceGateway;
use super::rebalance::{self, RebalancePlan};
use super::sequencer::OrderIdSequencer;
use super::state::{GridRecord, GridRuntimeState};
use crate::broadcast::{EngineEvent, TradeBroadcaster, TradeNotice};
use crate::config::grid::GridSettings;
use crate::error::GridResult;
use crate::exchange::ExchangeAdapter;
use crate::logging::OrderAuditLogger;
use crate::model::{LimitOrderRequest, OrderDetails, OrderId, OrderSide};
use crate::constants::REBALANCE_POLL_INTERVAL;
use rust_decimal::Decimal;
use serde::Serialize;
use std::sync::Arc;
use tokio::sync::watch;
use tracing::{debug, info, warn};

/// Point-in-time snapshot published on a watch channel after every tick.
#[derive(Debug, Clone, Serialize)]
pub struct GridStatus {
    pub symbol: String,
    pub running: bool,
    pub base: usize,
    pub level_count: usize,
    pub last_price: Decimal,
    pub open_orders: Vec<OpenOrder>,
}

#[derive(Debug, Clone, Serialize)]
pub struct OpenOrder {
    pub level: usize,
    pub side: OrderSide,
    pub price: Decimal,
    pub amount: Decimal,
    pub order_id: String,
}

impl GridStatus {
    pub fn idle(symbol: &str) -> Self {
        GridStatus {
            symbol: symbol.to_string(),
            running: false,
            base: 0,
            level_count: 0,
            last_price: Decimal::ZERO,
            open_orders: Vec::new(),
        }
    }
}

pub struct GridEngine {
    settings: GridSettings,
    ladder: GridLadder,
    exchange: Arc<dyn ExchangeAdapter>,
    gateway: PersistenceGateway,
    sequencer: Arc<OrderIdSequencer>,
    broadcaster: TradeBroadcaster,
    audit: Option<OrderAuditLogger>,
    status_tx: watch::Sender<GridStatus>,
    labels: Vec<String>,
    last_price: Decimal,
}

impl GridEngine {
    pub fn new(
        settings: GridSettings,
        exchange: Arc<dyn ExchangeAdapter>,
        gateway: PersistenceGateway,
        sequencer: Arc<OrderIdSequencer>,
        broadcaster: TradeBroadcaster,
        audit: Option<OrderAuditLogger>,
        status_tx: watch::Sender<GridStatus>,
        labels: Vec<String>,
    ) -> GridResult<Self> {
        let ladder = GridLadder::build(&settings)?;
        Ok(GridEngine {
            settings,
            ladder,
            exchange,
            gateway,
            sequencer,
            broadcaster,
            audit,
            status_tx,
            labels,
            last_price: Decimal::ZERO,
        })
    }

    pub async fn run(mut self, mut stop: watch::Receiver<bool>) -> GridResult<()> {
        let symbol = self.settings.symbol.clone();
        self.broadcaster.send(EngineEvent::Started {
            symbol: symbol.clone(),
        });

        let mut state = match self.initialize(&mut stop).await {
            Ok(Some(state)) => state,
            Ok(None) => {
                info!(%symbol, "stopped before startup completed");
                return Ok(());
            }
            Err(err) => {
                self.broadcaster.send(EngineEvent::Error {
                    symbol: symbol.clone(),
                    message: err.to_string(),
                });
                return Err(err);
            }
        };
        self.publish(&state, true);
        info!(%symbol, base = state.base(), "grid running");

        let mut ticker = tokio::time::interval(self.settings.interval());
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    match self.tick(&mut state).await {
                        Ok(()) => {}
                        Err(err) if err.is_transient() => {
                            warn!(%symbol, %err, "tick abandoned, will retry next interval");
                        }
                        Err(err) => {
                            self.broadcaster.send(EngineEvent::Error {
                                symbol: symbol.clone(),
                                message: err.to_string(),
                            });
                            return Err(err);
                        }
                    }
                    self.publish(&state, true);
                }
                _ = stop.changed() => break,
            }
        }

        self.publish(&state, false);
        self.broadcaster.send(EngineEvent::Stopped {
            symbol: symbol.clone(),
        });
        info!(%symbol, "grid stopped");
        Ok(())
    }

    /// Resume persisted state if present, otherwise rebalance holdings and
    /// seed a fresh state at the base implied by the current price. Returns
    /// `None` if a stop arrived while waiting for the rebalance fill.
    async fn initialize(
        &mut self,
        stop: &mut watch::Receiver<bool>,
    ) -> GridResult<Option<GridRuntimeState>> {
        if let Some(record) = self.gateway.load(&self.settings.symbol)? {
            let state = record.into_state(&self.ladder)?;
            info!(
                symbol = %self.settings.symbol,
                base = state.base(),
                open_orders = state.open_orders().len(),
                "resuming persisted grid state"
            );
            self.last_price = self.exchange.last_price(&self.settings.symbol).await?;
            return Ok(Some(state));
        }

        let price = self.exchange.last_price(&self.settings.symbol).await?;
        self.last_price = price;
        let balances = self.exchange.available_balances().await?;
        let held_base = balances
            .get(self.settings.base_asset())
            .copied()
            .unwrap_or_default();
        let held_quote = balances
            .get(self.settings.quote_asset())
            .copied()
            .unwrap_or_default();

        match rebalance::plan(&self.settings, &self.ladder, price, held_base, held_quote)? {
            RebalancePlan::None => {
                info!(symbol = %self.settings.symbol, "holdings already match ladder");
            }
            RebalancePlan::Trade { side, amount } => {
                if !self.execute_rebalance(side, amount, price, stop).await? {
                    return Ok(None);
                }
            }
        }

        let base = self.ladder.base_for_price(price);
        let state = GridRuntimeState::new(
            self.settings.symbol.clone(),
            base,
            self.ladder.max_index(),
        );
        self.persist(&state)?;
        Ok(Some(state))
    }

    /// Place the rebalance trade as a limit order at the observed price and
    /// poll until it fills. Returns `false` if stopped while waiting.
    async fn execute_rebalance(
        &mut self,
        side: OrderSide,
        amount: Decimal,
        price: Decimal,
        stop: &mut watch::Receiver<bool>,
    ) -> GridResult<bool> {
        let client_order_id = self.sequencer.next(side).await?;
        if let Some(audit) = &self.audit {
            audit.log_request(
                &self.settings.symbol,
                &side.to_string(),
                price,
                amount,
                &client_order_id.0,
            );
        }
        let order_id = self
            .exchange
            .place_limit_order(LimitOrderRequest {
                symbol: self.settings.symbol.clone(),
                client_order_id,
                side,
                price,
                amount,
            })
            .await?;
        info!(
            symbol = %self.settings.symbol,
            %side,
            %price,
            %amount,
            order_id = %order_id.0,
            "rebalance order placed, waiting for fill"
        );

        let mut poll = tokio::time::interval(REBALANCE_POLL_INTERVAL);
        loop {
            tokio::select! {
                _ = poll.tick() => {
                    match self.exchange.order_filled(&self.settings.symbol, &order_id).await {
                        Ok((details, true)) => {
                            if let Some(audit) = &self.audit {
                                audit.log_fill(
                                    &self.settings.symbol,
                                    &details.side.to_string(),
                                    details.price,
                                    details.amount,
                                    &details.order_id.0,
                                    Decimal::ZERO,
                                );
                            }
                            info!(
                                symbol = %self.settings.symbol,
                                price = %details.price,
                                amount = %details.amount,
                                "rebalance order filled"
                            );
                            return Ok(true);
                        }
                        Ok((_, false)) => {}
                        Err(err) if err.is_transient() => {
                            warn!(symbol = %self.settings.symbol, %err, "rebalance fill check failed");
                        }
                        Err(err) => return Err(err),
                    }
                }
                _ = stop.changed() => {
                    warn!(
                        symbol = %self.settings.symbol,
                        order_id = %order_id.0,
                        "stopped while waiting for rebalance fill, order left on the book"
                    );
                    return Ok(false);
                }
            }
        }
    }

    /// One reconciliation pass: at most one base transition, then repair the
    /// resting-order pair.
    async fn tick(&mut self, state: &mut GridRuntimeState) -> GridResult<()> {
        self.last_price = self.exchange.last_price(&self.settings.symbol).await?;
        let base = state.base();

        if base > 0 {
            if let Some(order_id) = state.order_at(base - 1).cloned() {
                let (details, filled) = self
                    .exchange
                    .order_filled(&self.settings.symbol, &order_id)
                    .await?;
                if filled {
                    self.on_sell_filled(state, details).await?;
                    return Ok(());
                }
            }
        }
        if base < self.ladder.max_index() {
            if let Some(order_id) = state.order_at(base + 1).cloned() {
                let (details, filled) = self
                    .exchange
                    .order_filled(&self.settings.symbol, &order_id)
                    .await?;
                if filled {
                    self.on_buy_filled(state, details).await?;
                    return Ok(());
                }
            }
        }
        self.ensure_resting_orders(state).await
    }

    /// The sell at `base - 1` filled: place the replacement buy at the
    /// current base, then step the base up. Each step is persisted before
    /// the next so a crashed transition is replayed, and the recorded order
    /// slot guards the replay against placing the buy twice.
    async fn on_sell_filled(
        &mut self,
        state: &mut GridRuntimeState,
        details: OrderDetails,
    ) -> GridResult<()> {
        let buy_level = state.base();
        if state.order_at(buy_level).is_none() {
            match self.place_level_order(buy_level, OrderSide::Buy).await {
                Ok(order_id) => {
                    state.set_order(buy_level, order_id);
                    self.persist(state)?;
                }
                Err(err) if err.is_transient() => {
                    warn!(
                        symbol = %self.settings.symbol,
                        level = buy_level,
                        %err,
                        "buy placement failed, slot left for repair"
                    );
                }
                Err(err) => return Err(err),
            }
        } else {
            debug!(
                symbol = %self.settings.symbol,
                level = buy_level,
                "buy already recorded, resuming interrupted transition"
            );
        }
        state.advance_up();
        self.persist(state)?;
        state.clear_order(state.base());
        self.persist(state)?;

        let sold = self.ladder.level(state.base());
        let bought = self.ladder.level(state.base() + 1);
        let profit = (sold.price - bought.price) * bought.amount_buy;
        self.notify_fill(&details, profit)?;
        info!(
            symbol = %self.settings.symbol,
            base = state.base(),
            price = %details.price,
            amount = %details.amount,
            %profit,
            "sell filled, base moved up"
        );
        Ok(())
    }

    /// The buy at `base + 1` filled: place the replacement sell at the
    /// current base, then step the base down. Mirror of `on_sell_filled`; a
    /// buy books no profit until its paired sell completes the round trip.
    async fn on_buy_filled(
        &mut self,
        state: &mut GridRuntimeState,
        details: OrderDetails,
    ) -> GridResult<()> {
        let sell_level = state.base();
        if state.order_at(sell_level).is_none() {
            match self.place_level_order(sell_level, OrderSide::Sell).await {
                Ok(order_id) => {
                    state.set_order(sell_level, order_id);
                    self.persist(state)?;
                }
                Err(err) if err.is_transient() => {
                    warn!(
                        symbol = %self.settings.symbol,
                        level = sell_level,
                        %err,
                        "sell placement failed, slot left for repair"
                    );
                }
                Err(err) => return Err(err),
            }
        } else {
            debug!(
                symbol = %self.settings.symbol,
                level = sell_level,
                "sell already recorded, resuming interrupted transition"
            );
        }
        state.advance_down();
        self.persist(state)?;
        state.clear_order(state.base());
        self.persist(state)?;

        self.notify_fill(&details, Decimal::ZERO)?;
        info!(
            symbol = %self.settings.symbol,
            base = state.base(),
            price = %details.price,
            amount = %details.amount,
            "buy filled, base moved down"
        );
        Ok(())
    }

    /// Repair pass: cancel recorded orders that no longer sit at `base ± 1`
    /// and place whichever of the pair is missing. Every action is
    /// independently persisted, so the pass is safe to rerun.
    async fn ensure_resting_orders(&mut self, state: &mut GridRuntimeState) -> GridResult<()> {
        let base = state.base();
        let top = self.ladder.max_index();

        for (level, order_id) in state.open_orders() {
            let wanted = (base > 0 && level == base - 1) || (base < top && level == base + 1);
            if wanted {
                continue;
            }
            // A stale order can fill before we get to cancel it. Cancelling
            // such an order would fail every tick, so check first and release
            // the slot instead.
            match self
                .exchange
                .order_filled(&self.settings.symbol, &order_id)
                .await
            {
                Ok((details, true)) => {
                    warn!(
                        symbol = %self.settings.symbol,
                        level,
                        order_id = %order_id.0,
                        "stale order filled before it could be cancelled"
                    );
                    self.notify_fill(&details, Decimal::ZERO)?;
                    state.clear_order(level);
                    self.persist(state)?;
                    continue;
                }
                Ok((_, false)) => {}
                Err(err) if err.is_transient() => {
                    warn!(
                        symbol = %self.settings.symbol,
                        level,
                        order_id = %order_id.0,
                        %err,
                        "could not look up stale order"
                    );
                    continue;
                }
                Err(err) => return Err(err),
            }
            match self
                .exchange
                .cancel_order(&self.settings.symbol, &order_id)
                .await
            {
                Ok(()) => {
                    if let Some(audit) = &self.audit {
                        audit.log_cancel(&self.settings.symbol, &order_id.0);
                    }
                    debug!(
                        symbol = %self.settings.symbol,
                        level,
                        order_id = %order_id.0,
                        "cancelled stale order"
                    );
                    state.clear_order(level);
                    self.persist(state)?;
                }
                // Keep the recorded id so the order is retried, never lost.
                Err(err) => warn!(
                    symbol = %self.settings.symbol,
                    level,
                    order_id = %order_id.0,
                    %err,
                    "cancel failed"
                ),
            }
        }

        if base > 0 && state.order_at(base - 1).is_none() {
            self.place_and_record(state, base - 1, OrderSide::Sell)
                .await?;
        }
        if base < top && state.order_at(base + 1).is_none() {
            self.place_and_record(state, base + 1, OrderSide::Buy)
                .await?;
        }
        Ok(())
    }

    async fn place_and_record(
        &mut self,
        state: &mut GridRuntimeState,
        level: usize,
        side: OrderSide,
    ) -> GridResult<()> {
        match self.place_level_order(level, side).await {
            Ok(order_id) => {
                state.set_order(level, order_id);
                self.persist(state)?;
                Ok(())
            }
            Err(err) if err.is_transient() => {
                warn!(
                    symbol = %self.settings.symbol,
                    level,
                    %side,
                    %err,
                    "placement failed, will retry next tick"
                );
                Ok(())
            }
            Err(err) => Err(err),
        }
    }

    async fn place_level_order(&self, level: usize, side: OrderSide) -> GridResult<OrderId> {
        let grid_level = self.ladder.level(level);
        let amount = match side {
            OrderSide::Buy => grid_level.amount_buy,
            OrderSide::Sell => grid_level.amount_sell,
        };
        let client_order_id = self.sequencer.next(side).await?;
        if let Some(audit) = &self.audit {
            audit.log_request(
                &self.settings.symbol,
                &side.to_string(),
                grid_level.price,
                amount,
                &client_order_id.0,
            );
        }
        let order_id = self
            .exchange
            .place_limit_order(LimitOrderRequest {
                symbol: self.settings.symbol.clone(),
                client_order_id,
                side,
                price: grid_level.price,
                amount,
            })
            .await?;
        debug!(
            symbol = %self.settings.symbol,
            level,
            %side,
            price = %grid_level.price,
            %amount,
            order_id = %order_id.0,
            "order placed"
        );
        Ok(order_id)
    }

    fn notify_fill(&self, details: &OrderDetails, profit: Decimal) -> GridResult<()> {
        if let Some(audit) = &self.audit {
            audit.log_fill(
                &self.settings.symbol,
                &details.side.to_string(),
                details.price,
                details.amount,
                &details.order_id.0,
                profit,
            );
        }
        self.broadcaster.send(EngineEvent::Trade(TradeNotice {
            labels: self.labels.clone(),
            symbol: self.settings.symbol.clone(),
            side: details.side,
            price: details.price,
            amount: details.amount,
            total: details.price * details.amount,
            profit,
        }));
        Ok(())
    }

    fn persist(&self, state: &GridRuntimeState) -> GridResult<()> {
        self.gateway.save(&GridRecord::from_state(state, &self.ladder))
    }

    fn publish(&self, state: &GridRuntimeState, running: bool) {
        let base = state.base();
        let open_orders = state
            .open_orders()
            .into_iter()
            .map(|(level, order_id)| {
                let grid_level = self.ladder.level(level);
                let side = if level < base {
                    OrderSide::Sell
                } else {
                    OrderSide::Buy
                };
                OpenOrder {
                    level,
                    side,
                    price: grid_level.price,
                    amount: match side {
                        OrderSide::Buy => grid_level.amount_buy,
                        OrderSide::Sell => grid_level.amount_sell,
                    },
                    order_id: order_id.0,
                }
            })
            .collect();
        self.status_tx.send_replace(GridStatus {
            symbol: self.settings.symbol.clone(),
            running,
            base,
            level_count: self.ladder.max_index() + 1,
            last_price: self.last_price,
            open_orders,
        });
    }
}
