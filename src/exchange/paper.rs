//! In-memory exchange double for tests and dry runs.
//!
//! Limit orders rest until the price crosses them: a buy fills once the
//! market trades at or below its limit, a sell once the market trades at or
//! above it. Fills settle balances immediately at the limit price.

use super::ExchangeAdapter;
use crate::error::{GridError, GridResult};
use crate::model::{split_symbol, ClientOrderId, LimitOrderRequest, OrderDetails, OrderId, OrderSide};
use async_trait::async_trait;
use rust_decimal::Decimal;
use std::collections::HashMap;
use std::sync::Mutex;

#[derive(Debug, Clone)]
struct PaperOrder {
    symbol: String,
    side: OrderSide,
    price: Decimal,
    amount: Decimal,
    filled: bool,
}

#[derive(Default)]
struct Inner {
    prices: HashMap<String, Decimal>,
    balances: HashMap<String, Decimal>,
    orders: HashMap<OrderId, PaperOrder>,
    client_index: HashMap<ClientOrderId, OrderId>,
    next_id: u64,
    placements: u64,
    fail_next_placement: bool,
    fail_next_cancel: bool,
}

impl Inner {
    fn fill(&mut self, order_id: &OrderId) {
        let order = match self.orders.get_mut(order_id) {
            Some(o) if !o.filled => o,
            _ => return,
        };
        order.filled = true;
        let (base, quote) = match split_symbol(&order.symbol) {
            Some((b, q)) => (b.to_string(), q.to_string()),
            None => return,
        };
        let notional = order.price * order.amount;
        let amount = order.amount;
        match order.side {
            OrderSide::Buy => {
                *self.balances.entry(base).or_default() += amount;
                *self.balances.entry(quote).or_default() -= notional;
            }
            OrderSide::Sell => {
                *self.balances.entry(base).or_default() -= amount;
                *self.balances.entry(quote).or_default() += notional;
            }
        }
    }

    fn crossed(order: &PaperOrder, market: Decimal) -> bool {
        match order.side {
            OrderSide::Buy => market <= order.price,
            OrderSide::Sell => market >= order.price,
        }
    }
}

#[derive(Default)]
pub struct PaperExchange {
    inner: Mutex<Inner>,
}

impl PaperExchange {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_config(config: &crate::config::exchange::PaperConfig) -> Self {
        let exchange = Self::new();
        {
            let mut inner = exchange.inner.lock().unwrap();
            inner.prices = config.prices.clone();
            inner.balances = config.balances.clone();
        }
        exchange
    }

    pub fn fund(&self, currency: &str, amount: Decimal) {
        let mut inner = self.inner.lock().unwrap();
        *inner.balances.entry(currency.to_string()).or_default() += amount;
    }

    /// Moves the market, filling any resting orders the new price crosses.
    pub fn set_price(&self, symbol: &str, price: Decimal) {
        let mut inner = self.inner.lock().unwrap();
        inner.prices.insert(symbol.to_string(), price);
        let crossed: Vec<OrderId> = inner
            .orders
            .iter()
            .filter(|(_, o)| o.symbol == symbol && !o.filled && Inner::crossed(o, price))
            .map(|(id, _)| id.clone())
            .collect();
        for id in crossed {
            inner.fill(&id);
        }
    }

    /// Number of placement requests that created a new order.
    pub fn placement_count(&self) -> u64 {
        self.inner.lock().unwrap().placements
    }

    pub fn open_order_count(&self, symbol: &str) -> usize {
        self.inner
            .lock()
            .unwrap()
            .orders
            .values()
            .filter(|o| o.symbol == symbol && !o.filled)
            .count()
    }

    pub fn has_order(&self, order_id: &OrderId) -> bool {
        self.inner.lock().unwrap().orders.contains_key(order_id)
    }

    /// Makes the next placement request fail with a transient error.
    pub fn fail_next_placement(&self) {
        self.inner.lock().unwrap().fail_next_placement = true;
    }

    /// Makes the next cancel request fail with a transient error.
    pub fn fail_next_cancel(&self) {
        self.inner.lock().unwrap().fail_next_cancel = true;
    }
}

#[async_trait]
impl ExchangeAdapter for PaperExchange {
    async fn last_price(&self, symbol: &str) -> GridResult<Decimal> {
        self.inner
            .lock()
            .unwrap()
            .prices
            .get(symbol)
            .copied()
            .ok_or_else(|| GridError::Exchange(format!("no price for {}", symbol)))
    }

    async fn available_balances(&self) -> GridResult<HashMap<String, Decimal>> {
        Ok(self.inner.lock().unwrap().balances.clone())
    }

    async fn place_limit_order(&self, request: LimitOrderRequest) -> GridResult<OrderId> {
        let mut inner = self.inner.lock().unwrap();

        if inner.fail_next_placement {
            inner.fail_next_placement = false;
            return Err(GridError::Exchange("placement refused".to_string()));
        }

        // Idempotency: a replayed client order id returns the original order.
        if let Some(existing) = inner.client_index.get(&request.client_order_id) {
            return Ok(existing.clone());
        }

        inner.next_id += 1;
        inner.placements += 1;
        let order_id = OrderId(format!("paper-{}", inner.next_id));
        let order = PaperOrder {
            symbol: request.symbol.clone(),
            side: request.side,
            price: request.price,
            amount: request.amount,
            filled: false,
        };
        let crosses = inner
            .prices
            .get(&request.symbol)
            .map(|market| Inner::crossed(&order, *market))
            .unwrap_or(false);
        inner.orders.insert(order_id.clone(), order);
        inner
            .client_index
            .insert(request.client_order_id, order_id.clone());
        if crosses {
            inner.fill(&order_id);
        }
        Ok(order_id)
    }

    async fn cancel_order(&self, _symbol: &str, order_id: &OrderId) -> GridResult<()> {
        let mut inner = self.inner.lock().unwrap();
        if inner.fail_next_cancel {
            inner.fail_next_cancel = false;
            return Err(GridError::Exchange("cancel refused".to_string()));
        }
        match inner.orders.get(order_id) {
            Some(order) if !order.filled => {
                inner.orders.remove(order_id);
                Ok(())
            }
            Some(_) => Err(GridError::Exchange(format!(
                "order {} already filled",
                order_id
            ))),
            None => Err(GridError::Exchange(format!("unknown order {}", order_id))),
        }
    }

    async fn order_filled(
        &self,
        _symbol: &str,
        order_id: &OrderId,
    ) -> GridResult<(OrderDetails, bool)> {
        let inner = self.inner.lock().unwrap();
        let order = inner
            .orders
            .get(order_id)
            .ok_or_else(|| GridError::Exchange(format!("unknown order {}", order_id)))?;
        let details = OrderDetails {
            order_id: order_id.clone(),
            side: order.side,
            price: order.price,
            amount: order.amount,
            filled_amount: if order.filled {
                order.amount
            } else {
                Decimal::ZERO
            },
        };
        Ok((details, order.filled))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn buy_request(id: &str, price: Decimal) -> LimitOrderRequest {
        LimitOrderRequest {
            symbol: "BTC/USDT".to_string(),
            client_order_id: ClientOrderId(id.to_string()),
            side: OrderSide::Buy,
            price,
            amount: dec!(1),
        }
    }

    #[tokio::test]
    async fn resting_buy_fills_when_price_drops() {
        let exchange = PaperExchange::new();
        exchange.set_price("BTC/USDT", dec!(100));
        exchange.fund("USDT", dec!(1000));

        let oid = exchange
            .place_limit_order(buy_request("a-0-0-1", dec!(95)))
            .await
            .unwrap();
        let (_, filled) = exchange.order_filled("BTC/USDT", &oid).await.unwrap();
        assert!(!filled);

        exchange.set_price("BTC/USDT", dec!(94));
        let (details, filled) = exchange.order_filled("BTC/USDT", &oid).await.unwrap();
        assert!(filled);
        assert_eq!(details.filled_amount, dec!(1));

        let balances = exchange.available_balances().await.unwrap();
        assert_eq!(balances["BTC"], dec!(1));
        assert_eq!(balances["USDT"], dec!(1000) - dec!(95));
    }

    #[tokio::test]
    async fn duplicate_client_id_does_not_place_twice() {
        let exchange = PaperExchange::new();
        exchange.set_price("BTC/USDT", dec!(100));

        let first = exchange
            .place_limit_order(buy_request("a-0-0-1", dec!(95)))
            .await
            .unwrap();
        let second = exchange
            .place_limit_order(buy_request("a-0-0-1", dec!(95)))
            .await
            .unwrap();
        assert_eq!(first, second);
        assert_eq!(exchange.placement_count(), 1);
    }

    #[tokio::test]
    async fn cancel_of_filled_order_errors() {
        let exchange = PaperExchange::new();
        exchange.set_price("BTC/USDT", dec!(100));

        // Crosses at placement, fills immediately.
        let oid = exchange
            .place_limit_order(buy_request("a-0-0-1", dec!(100)))
            .await
            .unwrap();
        assert!(exchange.cancel_order("BTC/USDT", &oid).await.is_err());
    }
}
