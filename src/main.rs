use anyhow::Result;
use clap::Parser;
use gridbot::broadcast::TradeBroadcaster;
use gridbot::config::broadcast::load_telegram_config;
use gridbot::config::load_config;
use gridbot::exchange::{ExchangeAdapter, PaperExchange};
use gridbot::grid::{GridManager, OrderIdSequencer, PersistenceGateway};
use gridbot::logging::OrderAuditLogger;
use gridbot::reporter::TelegramReporter;
use gridbot::store::file::FileStore;
use gridbot::store::Store;
use gridbot::ui::ConsoleRenderer;
use std::sync::Arc;
use tracing::{error, info};

#[derive(Parser, Debug)]
#[command(author, version, about = "Grid Trading Bot", long_about = None)]
struct Args {
    /// Path to the TOML configuration file
    #[arg(short, long, default_value = "config.toml")]
    config: String,

    /// Print the persisted grid state for a symbol and exit
    #[arg(long)]
    status: Option<String>,

    /// Cancel tracked orders, delete persisted state for a symbol and exit
    #[arg(long)]
    clear: Option<String>,

    /// Trade against the built-in paper exchange seeded from [paper]
    #[arg(long)]
    dry_run: bool,
}

use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::Layer;

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    let file_appender = tracing_appender::rolling::daily("logs", "application.log");
    let (non_blocking, _guard) = tracing_appender::non_blocking(file_appender);

    let console_layer = tracing_subscriber::fmt::layer()
        .with_target(false)
        .with_level(true)
        .with_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into())
                .add_directive("gridbot=debug".parse().unwrap()),
        );

    let file_layer = tracing_subscriber::fmt::layer()
        .with_ansi(false)
        .with_writer(non_blocking)
        .with_target(false)
        .with_filter(tracing_subscriber::EnvFilter::new("info,gridbot=debug"));

    tracing_subscriber::registry()
        .with(console_layer)
        .with(file_layer)
        .init();

    let args = Args::parse();

    info!("Loading config from: {}", args.config);
    let config = load_config(&args.config)?;

    let store: Arc<dyn Store> = Arc::new(FileStore::new(&config.exchange.data_dir)?);
    let exchange_label = if args.dry_run {
        "paper".to_string()
    } else {
        config.exchange.name.clone()
    };
    let gateway = PersistenceGateway::new(store.clone(), exchange_label.clone());

    if let Some(symbol) = args.status {
        match gateway.load(&symbol)? {
            Some(record) => ConsoleRenderer::render_record(&record),
            None => println!("No persisted grid state for {}", symbol),
        }
        return Ok(());
    }

    let exchange: Arc<dyn ExchangeAdapter> =
        if args.dry_run || config.exchange.name == "paper" {
            Arc::new(PaperExchange::from_config(&config.paper))
        } else {
            anyhow::bail!(
                "unknown exchange '{}' (only 'paper' is built in)",
                config.exchange.name
            );
        };

    let audit_logger = match OrderAuditLogger::new("logs") {
        Ok(l) => Some(l),
        Err(e) => {
            error!("Failed to initialize order audit logger: {}", e);
            None
        }
    };

    let sequencer = Arc::new(OrderIdSequencer::new(store, &exchange_label));
    let broadcaster = TradeBroadcaster::new();
    let mut manager = GridManager::new(
        exchange_label,
        exchange,
        gateway,
        sequencer,
        broadcaster.clone(),
        audit_logger,
    );

    if let Some(symbol) = args.clear {
        manager.clear(&symbol).await?;
        return Ok(());
    }

    let mut reporter_handle = None;
    match load_telegram_config() {
        Ok(Some(telegram_config)) => {
            match TelegramReporter::new(broadcaster.subscribe(), telegram_config) {
                Ok(reporter) => {
                    info!("Telegram reporter initialized, spawning background task");
                    reporter_handle = Some(tokio::spawn(reporter.run()));
                }
                Err(e) => error!("Failed to initialize Telegram reporter: {}", e),
            }
        }
        Ok(None) => {}
        Err(e) => {
            error!("Failed to load Telegram config: {}", e);
            std::process::exit(1);
        }
    }

    if args.dry_run {
        info!("Running against the paper exchange");
    }
    for grid in config.grids.clone() {
        info!("Starting grid for {}", grid.symbol);
        manager.start(grid)?;
    }

    tokio::signal::ctrl_c().await?;
    info!("Shutdown signal received, stopping grids");
    for symbol in manager.running_symbols() {
        if let Some(status) = manager.status(&symbol) {
            ConsoleRenderer::render_status(&status);
        }
    }
    let shutdown = manager.shutdown().await;

    // Give the reporter a moment to flush the stop notices. Dropping every
    // sender ends its stream.
    if let Some(handle) = reporter_handle {
        drop(manager);
        drop(broadcaster);
        let _ = tokio::time::timeout(std::time::Duration::from_secs(10), handle).await;
    }

    shutdown?;
    Ok(())
}
