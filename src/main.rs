use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::info;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::EnvFilter;

use shopwatch::models::partition_rules;
use shopwatch::plugins::NotificationDispatcher;
use shopwatch::scheduler::CycleScheduler;
use shopwatch::scraper::ChromePageProvider;
use shopwatch::storage::{JsonFile, RuleSource};
use shopwatch::{AppConfig, ListingExtractor, ListingMonitor};

#[derive(Parser)]
#[command(name = "shopwatch", version, about = "Watches storefronts and alerts on new listings")]
struct Cli {
    /// Configuration file; defaults to config/{default,$RUN_MODE,local}
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Check stores on a fixed interval
    Run {
        /// Run a single cycle and exit
        #[arg(long)]
        once: bool,
    },
    /// Validate the configuration and extraction rules
    CheckConfig,
    /// Print the configured stores
    ListStores,
}

fn init_tracing(config: &AppConfig) -> Result<Option<WorkerGuard>> {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&config.logging.level))
        .context("invalid log filter")?;

    match &config.logging.directory {
        Some(dir) => {
            let appender = tracing_appender::rolling::daily(dir, "shopwatch.log");
            let (writer, guard) = tracing_appender::non_blocking(appender);
            tracing_subscriber::fmt()
                .with_env_filter(filter)
                .with_writer(writer)
                .with_ansi(false)
                .init();
            Ok(Some(guard))
        }
        None => {
            tracing_subscriber::fmt().with_env_filter(filter).init();
            Ok(None)
        }
    }
}

fn load_config(path: Option<&PathBuf>) -> Result<AppConfig> {
    let config = match path {
        Some(path) => AppConfig::from_file(path),
        None => AppConfig::from_env(),
    };
    config.context("failed to load configuration")
}

fn check_rules(config: &AppConfig) -> Result<bool> {
    let source = JsonFile::new(&config.storage.rules_path);
    let rules = source
        .load_rules()
        .with_context(|| format!("failed to read {}", source.path().display()))?;
    let (valid, rejected) = partition_rules(rules);

    for rule in &valid {
        println!("ok       {:<24} {}", rule.store_name, rule.entry_url);
    }
    for rule in &rejected {
        println!("invalid  {:<24} {}", rule.store_name, rule.reason);
    }
    println!("{} usable, {} rejected", valid.len(), rejected.len());
    Ok(rejected.is_empty())
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();
    let config = load_config(cli.config.as_ref())?;
    let _guard = init_tracing(&config)?;

    match cli.command {
        Command::CheckConfig => {
            let ok = check_rules(&config)?;
            let channels = NotificationDispatcher::from_config(&config.notifications).list_notifier_types();
            println!("channels: {}", if channels.is_empty() { "none".to_string() } else { channels.join(", ") });
            if !ok {
                std::process::exit(1);
            }
        }
        Command::ListStores => {
            check_rules(&config)?;
        }
        Command::Run { once } => run(config, once).await?,
    }

    Ok(())
}

async fn run(config: AppConfig, once: bool) -> Result<()> {
    info!("Starting Shopwatch...");

    if config.metrics.enabled {
        metrics_exporter_prometheus::PrometheusBuilder::new()
            .with_http_listener(([0, 0, 0, 0], config.metrics.port))
            .install()
            .context("failed to start metrics exporter")?;
        info!("Metrics exporter listening on port {}", config.metrics.port);
    }

    let provider = ChromePageProvider::new(config.scraper.clone()).context("failed to start browser")?;
    let extractor = ListingExtractor::new(
        Arc::new(provider),
        Duration::from_secs(config.scraper.render_timeout),
    );
    let dispatcher = NotificationDispatcher::from_config(&config.notifications);
    info!("Notification channels: {:?}", dispatcher.list_notifier_types());

    let monitor = ListingMonitor::new(
        Arc::new(JsonFile::new(&config.storage.rules_path)),
        Arc::new(JsonFile::new(&config.storage.snapshot_path)),
        extractor,
        dispatcher,
    )
    .with_max_concurrent_stores(config.scraper.max_concurrent_stores);

    let scheduler = CycleScheduler::new(
        Arc::new(monitor),
        Duration::from_secs(config.scheduler.interval_secs),
    );

    if once {
        scheduler.run_once().await;
    } else {
        // Listen from the start so Ctrl-C during the first cycle is caught too
        let (stop_tx, stop_rx) = tokio::sync::oneshot::channel::<()>();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                info!("Ctrl-C received, stopping after the current cycle");
            }
            let _ = stop_tx.send(());
        });

        scheduler
            .run_until(async {
                let _ = stop_rx.await;
            })
            .await;
    }

    info!("Shutting down...");
    Ok(())
}
