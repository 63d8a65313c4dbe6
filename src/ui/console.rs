//! Console renderer for grid status output.

use crate::grid::engine::GridStatus;
use crate::grid::state::GridRecord;

pub struct ConsoleRenderer;

impl ConsoleRenderer {
    /// Render a live status snapshot to stdout.
    pub fn render_status(status: &GridStatus) {
        println!();
        println!("{}", "=".repeat(60));
        println!(" GRID STATUS: {}", status.symbol);
        println!("{}", "=".repeat(60));
        println!("Running:     {}", status.running);
        println!("Base Index:  {} / {}", status.base, status.level_count.saturating_sub(1));
        println!("Last Price:  {}", status.last_price);
        println!();
        if status.open_orders.is_empty() {
            println!("No resting orders.");
        } else {
            println!("RESTING ORDERS");
            println!("{}", "-".repeat(60));
            for order in &status.open_orders {
                println!(
                    "  [{}] {:<4} {:>12} x {:<10} ({})",
                    order.level, order.side.to_string(), order.price, order.amount, order.order_id
                );
            }
        }
        println!("{}", "=".repeat(60));
        println!();
    }

    /// Render a persisted record to stdout, marking the base level and any
    /// tracked order ids.
    pub fn render_record(record: &GridRecord) {
        println!();
        println!("{}", "=".repeat(60));
        println!(" PERSISTED GRID: {}", record.symbol);
        println!("{}", "=".repeat(60));
        println!(
            "{:>4}  {:>12}  {:>12}  {:>12}  {}",
            "lvl", "price", "buy", "sell", "order"
        );
        println!("{}", "-".repeat(60));
        for level in &record.levels {
            let marker = if level.id == record.base { "*" } else { " " };
            let order = level
                .order_id
                .as_ref()
                .map(|id| id.0.as_str())
                .unwrap_or("-");
            println!(
                "{}{:>3}  {:>12}  {:>12}  {:>12}  {}",
                marker, level.id, level.price, level.amount_buy, level.amount_sell, order
            );
        }
        println!("{}", "-".repeat(60));
        println!("Base Index:  {}", record.base);
        println!("{}", "=".repeat(60));
        println!();
    }
}
