//! Lifecycle of the per-symbol engine tasks.
//!
//! One task per symbol, stopped through a watch flag so an engine is never
//! interrupted mid-transition. Status snapshots flow back on a second watch
//! channel, read without touching the running task.

use super::engine::{GridEngine, GridStatus};
use super::persist::PersistenceGateway;
use super::sequencer::OrderIdSequencer;
use crate::broadcast::TradeBroadcaster;
use crate::config::grid::GridSettings;
use crate::error::{GridError, GridResult};
use crate::exchange::ExchangeAdapter;
use crate::logging::OrderAuditLogger;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{info, warn};

struct SymbolHandle {
    stop: watch::Sender<bool>,
    status: watch::Receiver<GridStatus>,
    task: JoinHandle<GridResult<()>>,
}

pub struct GridManager {
    exchange_name: String,
    exchange: Arc<dyn ExchangeAdapter>,
    gateway: PersistenceGateway,
    sequencer: Arc<OrderIdSequencer>,
    broadcaster: TradeBroadcaster,
    audit: Option<OrderAuditLogger>,
    handles: HashMap<String, SymbolHandle>,
}

impl GridManager {
    pub fn new(
        exchange_name: impl Into<String>,
        exchange: Arc<dyn ExchangeAdapter>,
        gateway: PersistenceGateway,
        sequencer: Arc<OrderIdSequencer>,
        broadcaster: TradeBroadcaster,
        audit: Option<OrderAuditLogger>,
    ) -> Self {
        GridManager {
            exchange_name: exchange_name.into(),
            exchange,
            gateway,
            sequencer,
            broadcaster,
            audit,
            handles: HashMap::new(),
        }
    }

    /// Spawns the engine task for one symbol. Errors if the symbol is
    /// already running or its ladder cannot be built.
    pub fn start(&mut self, settings: GridSettings) -> GridResult<()> {
        let symbol = settings.symbol.clone();
        if self.handles.contains_key(&symbol) {
            return Err(GridError::Config(format!("{} is already running", symbol)));
        }

        let (stop_tx, stop_rx) = watch::channel(false);
        let (status_tx, status_rx) = watch::channel(GridStatus::idle(&symbol));
        let engine = GridEngine::new(
            settings,
            self.exchange.clone(),
            self.gateway.clone(),
            self.sequencer.clone(),
            self.broadcaster.clone(),
            self.audit.clone(),
            status_tx,
            vec![self.exchange_name.clone(), "grid".to_string()],
        )?;
        let task = tokio::spawn(engine.run(stop_rx));
        self.handles.insert(
            symbol.clone(),
            SymbolHandle {
                stop: stop_tx,
                status: status_rx,
                task,
            },
        );
        info!(%symbol, "grid task started");
        Ok(())
    }

    /// Signals one symbol's engine to stop and waits for it to finish its
    /// current tick. Resting orders stay on the book and the persisted state
    /// keeps tracking them for the next run.
    pub async fn stop(&mut self, symbol: &str) -> GridResult<()> {
        let handle = self
            .handles
            .remove(symbol)
            .ok_or_else(|| GridError::Config(format!("{} is not running", symbol)))?;
        let _ = handle.stop.send(true);
        match handle.task.await {
            Ok(result) => result,
            Err(join_err) => Err(GridError::Exchange(format!(
                "engine task for {} panicked: {}",
                symbol, join_err
            ))),
        }
    }

    /// Latest status snapshot for a running symbol.
    pub fn status(&self, symbol: &str) -> Option<GridStatus> {
        self.handles
            .get(symbol)
            .map(|handle| handle.status.borrow().clone())
    }

    pub fn running_symbols(&self) -> Vec<String> {
        let mut symbols: Vec<String> = self.handles.keys().cloned().collect();
        symbols.sort();
        symbols
    }

    /// Stops every running symbol, reporting the first failure after all
    /// tasks have finished.
    pub async fn shutdown(&mut self) -> GridResult<()> {
        let mut first_err = None;
        for symbol in self.running_symbols() {
            if let Err(err) = self.stop(&symbol).await {
                warn!(%symbol, %err, "engine exited with error during shutdown");
                first_err.get_or_insert(err);
            }
        }
        match first_err {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }

    /// Cancels every recorded order for a symbol and deletes its persisted
    /// state. The symbol must not be running; the next start rebalances from
    /// scratch.
    pub async fn clear(&mut self, symbol: &str) -> GridResult<()> {
        if self.handles.contains_key(symbol) {
            return Err(GridError::Config(format!(
                "{} is running, stop it before clearing",
                symbol
            )));
        }
        let record = match self.gateway.load(symbol)? {
            Some(record) => record,
            None => {
                info!(%symbol, "no persisted state to clear");
                return Ok(());
            }
        };
        for level in &record.levels {
            if let Some(order_id) = &level.order_id {
                match self.exchange.cancel_order(symbol, order_id).await {
                    Ok(()) => {
                        if let Some(audit) = &self.audit {
                            audit.log_cancel(symbol, &order_id.0);
                        }
                    }
                    // Filled or already-gone orders cannot block a reset.
                    Err(err) => warn!(%symbol, order_id = %order_id.0, %err, "cancel failed"),
                }
            }
        }
        self.gateway.delete(symbol)?;
        info!(%symbol, "persisted grid state cleared");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::exchange::paper::PaperExchange;
    use crate::store::file::FileStore;
    use crate::store::Store;
    use rust_decimal_macros::dec;
    use tempfile::TempDir;

    fn settings() -> GridSettings {
        GridSettings {
            symbol: "BTC/USDT".to_string(),
            max_price: dec!(100),
            min_price: dec!(90),
            grid_count: 2,
            total_funds: dec!(100),
            interval_secs: Some(1),
            price_decimals: 2,
            amount_decimals: 4,
            min_amount: dec!(0.0001),
            min_notional: dec!(10),
        }
    }

    fn manager(dir: &TempDir, exchange: Arc<PaperExchange>) -> GridManager {
        let store: Arc<dyn Store> = Arc::new(FileStore::new(dir.path()).unwrap());
        GridManager::new(
            "paper",
            exchange,
            PersistenceGateway::new(store.clone(), "paper"),
            Arc::new(OrderIdSequencer::new(store, "paper")),
            TradeBroadcaster::new(),
            None,
        )
    }

    #[tokio::test]
    async fn start_stop_leaves_orders_resting_and_state_persisted() {
        let dir = TempDir::new().unwrap();
        let exchange = Arc::new(PaperExchange::new());
        exchange.set_price("BTC/USDT", dec!(95));
        exchange.fund("USDT", dec!(102));
        let mut manager = manager(&dir, exchange.clone());

        manager.start(settings()).unwrap();
        assert!(manager.start(settings()).is_err());

        // First tick fires immediately after startup.
        tokio::time::sleep(std::time::Duration::from_millis(200)).await;
        let status = manager.status("BTC/USDT").unwrap();
        assert!(status.running);
        assert_eq!(status.base, 1);
        assert_eq!(status.open_orders.len(), 2);

        manager.stop("BTC/USDT").await.unwrap();
        assert!(manager.status("BTC/USDT").is_none());
        assert_eq!(exchange.open_order_count("BTC/USDT"), 2);
    }

    #[tokio::test]
    async fn clear_cancels_orders_and_deletes_state() {
        let dir = TempDir::new().unwrap();
        let exchange = Arc::new(PaperExchange::new());
        exchange.set_price("BTC/USDT", dec!(95));
        exchange.fund("USDT", dec!(102));
        let mut manager = manager(&dir, exchange.clone());

        manager.start(settings()).unwrap();
        tokio::time::sleep(std::time::Duration::from_millis(200)).await;
        manager.stop("BTC/USDT").await.unwrap();
        assert_eq!(exchange.open_order_count("BTC/USDT"), 2);

        manager.clear("BTC/USDT").await.unwrap();
        assert_eq!(exchange.open_order_count("BTC/USDT"), 0);
        assert!(manager.gateway.load("BTC/USDT").unwrap().is_none());

        // Clearing an already-clean symbol is a no-op.
        manager.clear("BTC/USDT").await.unwrap();
    }

    #[tokio::test]
    async fn clear_refuses_running_symbol() {
        let dir = TempDir::new().unwrap();
        let exchange = Arc::new(PaperExchange::new());
        exchange.set_price("BTC/USDT", dec!(95));
        exchange.fund("USDT", dec!(102));
        let mut manager = manager(&dir, exchange.clone());

        manager.start(settings()).unwrap();
        assert!(manager.clear("BTC/USDT").await.is_err());
        manager.shutdown().await.unwrap();
    }
}
