use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum OrderSide {
    Buy,
    Sell,
}

impl OrderSide {
    pub fn is_buy(&self) -> bool {
        matches!(self, OrderSide::Buy)
    }
}

impl fmt::Display for OrderSide {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OrderSide::Buy => write!(f, "Buy"),
            OrderSide::Sell => write!(f, "Sell"),
        }
    }
}

/// Exchange-assigned order identifier.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct OrderId(pub String);

impl fmt::Display for OrderId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Caller-chosen idempotency token attached to an order.
///
/// Format: `{prefix}-{sells}-{buys}-{sequence}` with the sequence persisted
/// by the [`crate::grid::sequencer::OrderIdSequencer`] before being handed
/// out, so ids stay unique across process restarts.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ClientOrderId(pub String);

impl fmt::Display for ClientOrderId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone)]
pub struct LimitOrderRequest {
    pub symbol: String,
    pub client_order_id: ClientOrderId,
    pub side: OrderSide,
    pub price: Decimal,
    pub amount: Decimal,
}

/// Order status as reported by the exchange.
#[derive(Debug, Clone)]
pub struct OrderDetails {
    pub order_id: OrderId,
    pub side: OrderSide,
    pub price: Decimal,
    pub amount: Decimal,
    pub filled_amount: Decimal,
}

/// Splits a `Base/Quote` pair into its two currencies.
pub fn split_symbol(symbol: &str) -> Option<(&str, &str)> {
    symbol.split_once('/')
}
