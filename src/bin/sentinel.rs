use std::sync::Arc;
use std::time::Duration;

use api_sentinel::{
    config::{Config, read_config_file},
    coordinator::{CycleTrigger, MonitoringCoordinator},
    inventory::NewEndpoint,
    storage::{open_backend, schema::HttpMethod},
};
use clap::{Parser, Subcommand};
use serde::Serialize;
use tracing::{debug, error, info, level_filters::LevelFilter, trace};
use tracing_subscriber::{filter, layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Debug, Clone, Parser)]
#[command(version, about = "Monitor HTTP endpoints and raise alerts on threshold breaches")]
struct Args {
    /// Config file (JSON); defaults are used when omitted
    #[arg(short, long)]
    file: Option<String>,

    /// Increase log verbosity (-v debug, -vv trace)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Clone, Subcommand)]
enum Command {
    /// Serve the REST API and run periodic monitoring cycles
    Serve,

    /// Run one monitoring cycle over every active endpoint
    Run,

    /// Check a single endpoint now
    Test { endpoint_id: i64 },

    /// Print aggregate statistics
    Stats {
        /// Window size in hours
        #[arg(long, default_value_t = 24)]
        hours: i64,
    },

    /// Register (or update) an endpoint
    Register {
        service_name: String,
        base_url: String,
        path: String,

        #[arg(short, long, default_value = "GET")]
        method: HttpMethod,

        #[arg(short, long)]
        description: Option<String>,
    },
}

fn init(verbose: u8) {
    let level = match verbose {
        0 => LevelFilter::INFO,
        1 => LevelFilter::DEBUG,
        _ => LevelFilter::TRACE,
    };
    let filter = filter::Targets::new().with_targets(vec![
        ("api_sentinel", level),
        ("sentinel", level),
        ("tower_http", LevelFilter::DEBUG.min(level)),
    ]);
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(std::io::stderr)
                .compact()
                .with_ansi(false),
        )
        .with(filter)
        .init();
}

fn print_json<T: Serialize>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv::dotenv().ok();

    let args = Args::parse();
    init(args.verbose);
    trace!("started with args: {args:?}");

    let config = match &args.file {
        Some(file) => read_config_file(file)?,
        None => Config::default(),
    }
    .apply_env();

    let storage = open_backend(&config.storage).await?;
    let coordinator = Arc::new(MonitoringCoordinator::from_config(storage.clone(), &config)?);

    let outcome = match args.command {
        Command::Serve => serve(coordinator, &config).await,
        Command::Run => {
            let summary = coordinator.run_cycle(CycleTrigger::Manual).await?;
            print_json(&summary)
        }
        Command::Test { endpoint_id } => {
            let result = coordinator.test_one(endpoint_id).await?;
            print_json(&result)
        }
        Command::Stats { hours } => {
            let stats = coordinator.stats(hours).await?;
            print_json(&stats)
        }
        Command::Register {
            service_name,
            base_url,
            path,
            method,
            description,
        } => {
            let mut endpoint = NewEndpoint::new(service_name, base_url, path, method);
            endpoint.description = description;
            endpoint.discovery_source = Some("manual".to_string());

            let id = storage.register_endpoint(endpoint).await?;
            println!("{id}");
            Ok(())
        }
    };

    storage.close().await?;
    outcome
}

#[cfg(feature = "api")]
async fn serve(coordinator: Arc<MonitoringCoordinator>, config: &Config) -> anyhow::Result<()> {
    use api_sentinel::api::{ApiConfig, ApiState, spawn_api_server};

    let api_config = ApiConfig::try_from(&config.api)?;
    let addr = spawn_api_server(api_config, ApiState::new(coordinator.clone())).await?;
    info!("serving on http://{addr}");

    run_periodic(coordinator, config).await
}

#[cfg(not(feature = "api"))]
async fn serve(coordinator: Arc<MonitoringCoordinator>, config: &Config) -> anyhow::Result<()> {
    info!("built without the api feature, only periodic monitoring runs");
    run_periodic(coordinator, config).await
}

/// Trigger a periodic cycle on every tick until Ctrl-C
async fn run_periodic(
    coordinator: Arc<MonitoringCoordinator>,
    config: &Config,
) -> anyhow::Result<()> {
    let period = Duration::from_secs(config.monitoring.periodic_interval_seconds.max(1));
    let mut ticker = tokio::time::interval(period);
    ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

    debug!("periodic monitoring every {}s", period.as_secs());

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                let coordinator = coordinator.clone();
                tokio::spawn(async move {
                    match coordinator.run_cycle(CycleTrigger::Periodic).await {
                        Ok(summary) => debug!("periodic cycle: {}", summary.message),
                        Err(e) => error!("periodic cycle failed: {e}"),
                    }
                });
            }
            _ = tokio::signal::ctrl_c() => {
                info!("shutting down");
                return Ok(());
            }
        }
    }
}
