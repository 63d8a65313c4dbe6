use anyhow::{Context, Result};
use chrono::Local;
use csv::Writer;
use rust_decimal::Decimal;
use serde::Serialize;
use std::fs::{create_dir_all, OpenOptions};
use std::path::Path;
use std::sync::{Arc, Mutex};
use tracing::error;

#[derive(Debug, Serialize, Clone)]
pub struct OrderRecord {
    pub timestamp: String,
    pub symbol: String,
    pub record_type: String, // REQ, FILL, CANCEL
    pub side: String,
    pub price: Decimal,
    pub amount: Decimal,
    pub client_order_id: Option<String>,
    pub order_id: Option<String>,
    pub profit: Option<Decimal>,
}

/// Append-only CSV audit trail of every order request and observed fill.
#[derive(Clone)]
pub struct OrderAuditLogger {
    writer: Arc<Mutex<Writer<std::fs::File>>>,
}

impl OrderAuditLogger {
    pub fn new(log_dir: &str) -> Result<Self> {
        let dir = Path::new(log_dir);
        create_dir_all(dir).context("Failed to create log directory")?;

        let file_path = dir.join("trades.csv");
        let file_exists = file_path.exists();

        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&file_path)
            .context("Failed to open trades.csv")?;

        let writer = csv::WriterBuilder::new()
            .has_headers(!file_exists)
            .from_writer(file);

        Ok(Self {
            writer: Arc::new(Mutex::new(writer)),
        })
    }

    pub fn log(&self, record: OrderRecord) {
        if let Ok(mut w) = self.writer.lock() {
            if let Err(e) = w.serialize(record) {
                error!("Failed to write order audit log: {}", e);
            } else {
                let _ = w.flush();
            }
        }
    }

    pub fn log_request(
        &self,
        symbol: &str,
        side: &str,
        price: Decimal,
        amount: Decimal,
        client_order_id: &str,
    ) {
        self.log(OrderRecord {
            timestamp: Local::now().to_rfc3339(),
            symbol: symbol.to_string(),
            record_type: "REQ".to_string(),
            side: side.to_string(),
            price,
            amount,
            client_order_id: Some(client_order_id.to_string()),
            order_id: None,
            profit: None,
        });
    }

    pub fn log_fill(
        &self,
        symbol: &str,
        side: &str,
        price: Decimal,
        amount: Decimal,
        order_id: &str,
        profit: Decimal,
    ) {
        self.log(OrderRecord {
            timestamp: Local::now().to_rfc3339(),
            symbol: symbol.to_string(),
            record_type: "FILL".to_string(),
            side: side.to_string(),
            price,
            amount,
            client_order_id: None,
            order_id: Some(order_id.to_string()),
            profit: Some(profit),
        });
    }

    pub fn log_cancel(&self, symbol: &str, order_id: &str) {
        self.log(OrderRecord {
            timestamp: Local::now().to_rfc3339(),
            symbol: symbol.to_string(),
            record_type: "CANCEL".to_string(),
            side: String::new(),
            price: Decimal::ZERO,
            amount: Decimal::ZERO,
            client_order_id: None,
            order_id: Some(order_id.to_string()),
            profit: None,
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn writes_rows_to_csv() {
        let dir = tempfile::tempdir().unwrap();
        let logger = OrderAuditLogger::new(dir.path().to_str().unwrap()).unwrap();

        logger.log_request("BTC/USDT", "Buy", dec!(95), dec!(0.5), "grid-0-1-1");
        logger.log_fill("BTC/USDT", "Sell", dec!(100), dec!(0.5), "paper-1", dec!(2.5));

        let content = std::fs::read_to_string(dir.path().join("trades.csv")).unwrap();
        assert!(content.contains("REQ"));
        assert!(content.contains("FILL"));
        assert!(content.contains("grid-0-1-1"));
    }
}
