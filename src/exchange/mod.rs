//! Exchange adapter seam.
//!
//! One trait covers the five operations the engine needs; each concrete
//! venue implements it and is selected at construction time. The engine never
//! assumes a specific exchange's request/response shape.

use crate::error::GridResult;
use crate::model::{LimitOrderRequest, OrderDetails, OrderId};
use async_trait::async_trait;
use rust_decimal::Decimal;
use std::collections::HashMap;

pub mod paper;

pub use paper::PaperExchange;

#[async_trait]
pub trait ExchangeAdapter: Send + Sync {
    /// Last traded / ticker price for the pair.
    async fn last_price(&self, symbol: &str) -> GridResult<Decimal>;

    /// Available (not reserved) balance per currency.
    async fn available_balances(&self) -> GridResult<HashMap<String, Decimal>>;

    /// Places a resting limit order. The client order id is the idempotency
    /// token: replaying a request with an id the venue has already seen must
    /// not create a second order.
    async fn place_limit_order(&self, request: LimitOrderRequest) -> GridResult<OrderId>;

    async fn cancel_order(&self, symbol: &str, order_id: &OrderId) -> GridResult<()>;

    /// Reports the order's current state and whether it is fully filled.
    async fn order_filled(&self, symbol: &str, order_id: &OrderId)
        -> GridResult<(OrderDetails, bool)>;
}
