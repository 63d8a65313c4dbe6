//! Durable key-addressed persistence.
//!
//! The engine treats the store as a crash-safe map keyed by
//! `(exchange, label, symbol)`. All writes are upserts; repeated saves of the
//! same logical record converge to one entry.

use crate::error::GridResult;
use serde::de::DeserializeOwned;
use serde::Serialize;

pub mod file;

pub use file::FileStore;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct StoreKey {
    pub exchange: String,
    pub label: String,
    pub symbol: String,
}

impl StoreKey {
    pub fn new(
        exchange: impl Into<String>,
        label: impl Into<String>,
        symbol: impl Into<String>,
    ) -> Self {
        Self {
            exchange: exchange.into(),
            label: label.into(),
            symbol: symbol.into(),
        }
    }
}

pub trait Store: Send + Sync {
    fn get(&self, key: &StoreKey) -> GridResult<Option<Vec<u8>>>;
    fn set(&self, key: &StoreKey, value: &[u8]) -> GridResult<()>;
    fn delete(&self, key: &StoreKey) -> GridResult<()>;
}

pub fn get_json<T: DeserializeOwned>(store: &dyn Store, key: &StoreKey) -> GridResult<Option<T>> {
    match store.get(key)? {
        Some(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
        None => Ok(None),
    }
}

pub fn set_json<T: Serialize>(store: &dyn Store, key: &StoreKey, value: &T) -> GridResult<()> {
    let bytes = serde_json::to_vec_pretty(value)?;
    store.set(key, &bytes)
}
