use crate::broadcast::{EngineEvent, TradeNotice};
use crate::config::broadcast::TelegramConfig;
use anyhow::Result;
use teloxide::prelude::*;
use tokio::sync::broadcast;
use tokio_stream::wrappers::BroadcastStream;
use tokio_stream::StreamExt;
use tracing::{error, info, warn};

/// Forwards engine events to a Telegram chat.
///
/// Strictly observational: send failures are logged and swallowed, and a
/// lagging consumer only drops its own messages.
pub struct TelegramReporter {
    bot: Bot,
    chat_id: ChatId,
    receiver: broadcast::Receiver<EngineEvent>,
}

impl TelegramReporter {
    pub fn new(receiver: broadcast::Receiver<EngineEvent>, config: TelegramConfig) -> Result<Self> {
        let bot = Bot::new(config.bot_token);
        let chat_id = ChatId(config.chat_id.parse::<i64>()?);
        Ok(Self {
            bot,
            chat_id,
            receiver,
        })
    }

    pub async fn run(self) {
        info!("Telegram reporter started.");
        let mut stream = BroadcastStream::new(self.receiver);
        while let Some(msg) = stream.next().await {
            match msg {
                Ok(event) => {
                    if let Some(text) = render_event(&event) {
                        if let Err(e) = self
                            .bot
                            .send_message(self.chat_id, text)
                            .parse_mode(teloxide::types::ParseMode::Html)
                            .await
                        {
                            error!("Failed to send Telegram notification: {}", e);
                        }
                    }
                }
                Err(e) => {
                    warn!("Telegram broadcast stream lagged: {}", e);
                }
            }
        }
        info!("Telegram reporter stopped.");
    }
}

fn render_event(event: &EngineEvent) -> Option<String> {
    match event {
        EngineEvent::Trade(notice) => Some(render_trade(notice)),
        EngineEvent::Started { symbol } => Some(format!("▶️ Grid started for <b>{}</b>", symbol)),
        EngineEvent::Stopped { symbol } => Some(format!("⏹ Grid stopped for <b>{}</b>", symbol)),
        EngineEvent::Error { symbol, message } => Some(format!(
            "⚠️ <b>{}</b>\n<code>{}</code>",
            symbol, message
        )),
    }
}

fn render_trade(notice: &TradeNotice) -> String {
    let icon = if notice.side.is_buy() { "🟢" } else { "🔴" };
    format!(
        "{} <b>{} Filled</b> [{}]\nSymbol: <code>{}</code>\nPrice: <code>{}</code>\nAmount: <code>{}</code>\nTotal: <code>{}</code>\nProfit: <code>{}</code>",
        icon,
        notice.side,
        notice.labels.join("/"),
        notice.symbol,
        notice.price,
        notice.amount,
        notice.total,
        notice.profit
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::OrderSide;
    use rust_decimal_macros::dec;

    #[test]
    fn renders_trade_notice() {
        let text = render_trade(&TradeNotice {
            labels: vec!["paper".to_string(), "grid".to_string()],
            symbol: "BTC/USDT".to_string(),
            side: OrderSide::Sell,
            price: dec!(94.87),
            amount: dec!(0.5270),
            total: dec!(49.99),
            profit: dec!(1.23),
        });
        assert!(text.contains("Sell Filled"));
        assert!(text.contains("paper/grid"));
        assert!(text.contains("94.87"));
    }
}
