pub mod order_audit;

pub use order_audit::OrderAuditLogger;
