use crate::model::OrderSide;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Events published by the engine for observers (Telegram, logs).
///
/// Delivery is best-effort: the engine never waits on, or fails because of,
/// a consumer.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "event_type", content = "data")]
pub enum EngineEvent {
    #[serde(rename = "trade")]
    Trade(TradeNotice),

    #[serde(rename = "started")]
    Started { symbol: String },

    #[serde(rename = "stopped")]
    Stopped { symbol: String },

    #[serde(rename = "error")]
    Error { symbol: String, message: String },
}

/// Human-readable fill notification.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TradeNotice {
    /// Free-form labels identifying the grid instance (exchange, strategy).
    pub labels: Vec<String>,
    pub symbol: String,
    pub side: OrderSide,
    pub price: Decimal,
    pub amount: Decimal,
    pub total: Decimal,
    /// Realized profit for sell fills; zero for buys.
    pub profit: Decimal,
}
