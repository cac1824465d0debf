//! market-dash - query-execution backend for the market analytics dashboard.

use market_dash::cli::Cli;
use market_dash::config::Config;
use market_dash::dashboard;
use market_dash::error::{DashError, Result};
use market_dash::logging;
use market_dash::query::QueryClient;
use market_dash::service;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();

    let cli = Cli::parse_args();
    logging::init_stderr_logging(cli.verbose);

    match run(cli).await {
        Ok(true) => {}
        Ok(false) => std::process::exit(1),
        Err(e) => {
            error!("{}: {}", e.category(), e);
            std::process::exit(1);
        }
    }
}

/// Runs the requested dashboard queries and prints the JSON response.
///
/// Returns `Ok(false)` when a query failed; its error body has already
/// been printed in place of the records.
async fn run(cli: Cli) -> Result<bool> {
    let config = resolve_config(&cli)?;
    info!("Query service: {}", config.service.display_string());

    let service = service::connect(&config.service, cli.mock)?;
    let client = QueryClient::from_config(service, &config);

    let cancel = CancellationToken::new();
    let interrupt = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupted, abandoning in-flight queries");
            interrupt.cancel();
        }
    });

    let results = dashboard::run_all(&client, &cli.query.queries(), &cancel).await;
    let (response, all_ok) = dashboard::render_response(results)
        .map_err(|e| DashError::internal(format!("Failed to serialize response: {e}")))?;

    let json = if cli.pretty {
        serde_json::to_string_pretty(&response)
    } else {
        serde_json::to_string(&response)
    }
    .map_err(|e| DashError::internal(format!("Failed to serialize response: {e}")))?;
    println!("{json}");

    Ok(all_ok)
}

/// Builds the effective configuration.
///
/// Precedence, highest first:
/// 1. CLI arguments
/// 2. Environment variables (including `.env`)
/// 3. Config file
/// 4. Built-in defaults
fn resolve_config(cli: &Cli) -> Result<Config> {
    let config_path = cli.config_path();
    info!("Loading config from: {}", config_path.display());

    let mut config = Config::load_from_file(&config_path)?;
    config.service.apply_env();
    cli.apply_overrides(&mut config);
    config.validate()?;

    Ok(config)
}
