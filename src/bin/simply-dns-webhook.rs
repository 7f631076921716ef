mod cli;

use std::{net::SocketAddr, process::ExitCode, sync::Arc, time::Duration};

use clap::Parser;

use env_logger::Builder;
use log::{error, info, trace};
use tokio::task;

use simply_dns_webhook::{
    config,
    provider::{Provider, SimplyProvider, SimplyProviderConfig},
    webhook::{self, AppState},
};

use cli::Cli;

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    Builder::new().filter_level(cli.loglevel.into()).init();

    if cli.dry_run {
        info!("Running in dry-run mode, no changes to the DNS provider will be made");
    }

    trace!("Starting bootstrap thread");
    let job_cfg = cli.clone();
    let state = match task::spawn_blocking(move || bootstrap(&job_cfg)).await {
        Ok(Ok(state)) => state,
        Ok(Err(e)) => {
            error!("{}", e);
            return ExitCode::FAILURE;
        }
        Err(_) => {
            error!("Bootstrap panicked, aborting...");
            return ExitCode::FAILURE;
        }
    };

    let addr = SocketAddr::new(cli.listen_address, cli.port);
    match webhook::serve(addr, state).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("Unable to serve webhook on {}: {}", addr, e);
            ExitCode::FAILURE
        }
    }
}

// Connect to Simply.com and settle on the managed domains. Blocking, as it talks to the API
fn bootstrap(cli: &Cli) -> Result<AppState, String> {
    let provider = SimplyProvider::from_config(&SimplyProviderConfig {
        account_name: &cli.account_name,
        api_key: &cli.api_key,
        api_url: &cli.api_url,
        timeout: Duration::from_secs(cli.request_timeout),
        dry_run: cli.dry_run,
    })
    .map_err(|e| format!("Unable to create provider: {}", e))?;
    info!("Created Simply.com provider");

    let available = provider
        .list_domains()
        .map_err(|e| format!("Could not retrieve domains from provider: {}", e))?;
    info!("Provider hosts {} domains", available.len());

    let domains = config::resolve_domain_filter(&available, &cli.domain_filter)
        .map_err(|e| format!("Invalid domain filter: {}", e))?;

    Ok(AppState {
        provider: Arc::from(provider),
        domains,
        default_ttl: cli.default_ttl,
    })
}
