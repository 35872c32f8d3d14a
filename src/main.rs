use std::sync::Arc;
use std::time::Duration;

use anyhow::{Result, bail};
use clap::Parser;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use bulkapply::cli::{Cli, Command, RunArgs};
use bulkapply::collaborators::simulated::{SimulatedJobSource, SimulatedSubmitter, SimulatedTailor};
use bulkapply::collaborators::{
    HttpApplicationSubmitter, HttpDocumentTailor, HttpEndpoint, HttpJobSource, ProxyPool,
};
use bulkapply::config::BulkApplyConfig;
use bulkapply::rate_limit::RateLimiter;
use bulkapply::store::{self, ApplicationStore, JsonFileStore, MemoryStore};
use bulkapply::ui::{self, RunProgress};
use bulkapply::{
    ApplicationParameters, BatchOrchestrator, Collaborators, SearchCriteria, StatusReport,
    telemetry,
};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => BulkApplyConfig::load_from(path)?,
        None => BulkApplyConfig::load()?,
    };
    let level = if cli.verbose {
        "debug"
    } else {
        config.log_level.as_str()
    };
    telemetry::init(level)?;

    match cli.command {
        Command::Run(args) => run(args, &config).await,
        Command::Status { json } => status(&config, json).await,
        Command::Abandon { jobs } => abandon(&config, &jobs).await,
        Command::Demo {
            postings,
            batch_size,
        } => demo(&config, postings, batch_size).await,
    }
}

async fn run(args: RunArgs, config: &BulkApplyConfig) -> Result<()> {
    let params = args.into_parameters(config)?;
    let collaborators = http_collaborators(config)?;
    let store = Arc::new(JsonFileStore::open(&config.state_path).await?);
    let limiter = Arc::new(RateLimiter::new(config.rate_policies(), store.clone()));
    let orchestrator = BatchOrchestrator::new(
        collaborators,
        limiter,
        store,
        config.orchestrator_settings(),
    );
    execute(&orchestrator, &params).await
}

async fn status(config: &BulkApplyConfig, json: bool) -> Result<()> {
    let store = JsonFileStore::open(&config.state_path).await?;
    let report = StatusReport::from_records(store.list().await?);
    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        ui::print_status(&report);
    }
    Ok(())
}

async fn abandon(config: &BulkApplyConfig, jobs: &[String]) -> Result<()> {
    let state = JsonFileStore::open(&config.state_path).await?;
    let abandoned = store::abandon_pending(&state, jobs).await?;
    info!(count = abandoned.len(), "abandoned pending applications");
    ui::print_abandoned(&abandoned);
    Ok(())
}

async fn demo(config: &BulkApplyConfig, postings: usize, batch_size: Option<usize>) -> Result<()> {
    let collaborators = Collaborators {
        source: Arc::new(SimulatedJobSource { postings }),
        tailor: Arc::new(SimulatedTailor),
        submitter: Arc::new(SimulatedSubmitter),
    };
    let limiter = Arc::new(RateLimiter::in_memory(config.rate_policies()));
    let orchestrator = BatchOrchestrator::new(
        collaborators,
        limiter,
        Arc::new(MemoryStore::new()),
        config.orchestrator_settings(),
    );

    let mut params = ApplicationParameters::new(
        SearchCriteria {
            keywords: "Rust Engineer".into(),
            location: Some("Remote".into()),
            ..Default::default()
        },
        "demo-resume",
    );
    params.min_salary = Some(100_000);
    params.max_applications = config.max_applications;
    params.batch_size = batch_size;

    info!(postings, "starting demo run");
    execute(&orchestrator, &params).await?;
    println!();
    ui::print_status(&orchestrator.status().await?);
    Ok(())
}

// Runs with Ctrl-C wired to cooperative cancellation.
async fn execute(orchestrator: &BatchOrchestrator, params: &ApplicationParameters) -> Result<()> {
    let cancel = CancellationToken::new();
    let watcher = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("interrupt received, letting in-flight applications settle");
            watcher.cancel();
        }
    });

    let progress = RunProgress::start(&params.criteria.keywords);
    match orchestrator.run_until_cancelled(params, cancel).await {
        Ok(result) => {
            progress.finish(&result);
            Ok(())
        }
        Err(err) => {
            progress.abort(&err.to_string());
            Err(err.into())
        }
    }
}

fn http_collaborators(config: &BulkApplyConfig) -> Result<Collaborators> {
    let endpoints = &config.endpoints;
    let (Some(search_url), Some(tailor_url), Some(submit_url)) = (
        endpoints.search_url.as_deref(),
        endpoints.tailor_url.as_deref(),
        endpoints.submit_url.as_deref(),
    ) else {
        bail!(
            "collaborator endpoints are not configured; set [endpoints] in bulkapply.toml or try `bulkapply demo`"
        );
    };

    let proxies = proxy_pool(config).map(Arc::new);
    let endpoint = |url: &str| -> Result<HttpEndpoint> {
        let endpoint = HttpEndpoint::with_timeout(url, &config.api_token, config.call_timeout())?;
        Ok(match &proxies {
            Some(pool) => endpoint.with_proxies(pool.clone()),
            None => endpoint,
        })
    };

    Ok(Collaborators {
        source: Arc::new(HttpJobSource(endpoint(search_url)?)),
        tailor: Arc::new(HttpDocumentTailor(endpoint(tailor_url)?)),
        submitter: Arc::new(HttpApplicationSubmitter(endpoint(submit_url)?)),
    })
}

fn proxy_pool(config: &BulkApplyConfig) -> Option<ProxyPool> {
    let proxy = &config.proxy;
    match &proxy.list_url {
        Some(url) => Some(ProxyPool::remote(
            url.clone(),
            Duration::from_secs(proxy.refresh_secs),
            proxy.proxies.clone(),
        )),
        None if !proxy.proxies.is_empty() => Some(ProxyPool::fixed(proxy.proxies.clone())),
        None => None,
    }
}
