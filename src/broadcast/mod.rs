pub mod types;

pub use types::{EngineEvent, TradeNotice};

use crate::constants::BROADCAST_CAPACITY;
use tokio::sync::broadcast;

/// Fire-and-forget fan-out of engine events.
#[derive(Clone)]
pub struct TradeBroadcaster {
    sender: broadcast::Sender<EngineEvent>,
}

impl TradeBroadcaster {
    pub fn new() -> Self {
        let (sender, _) = broadcast::channel(BROADCAST_CAPACITY);
        Self { sender }
    }

    pub fn send(&self, event: EngineEvent) {
        // No subscribers is fine; the engine must never fail on this path.
        let _ = self.sender.send(event);
    }

    pub fn subscribe(&self) -> broadcast::Receiver<EngineEvent> {
        self.sender.subscribe()
    }
}

impl Default for TradeBroadcaster {
    fn default() -> Self {
        Self::new()
    }
}
