pub mod broadcast;
pub mod config;
pub mod constants;
pub mod error;
pub mod exchange;
pub mod grid;
pub mod logging;
pub mod model;
pub mod reporter;
pub mod store;
pub mod ui;
