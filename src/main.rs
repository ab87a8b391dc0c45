use rollup_coordinator::{
    Collaborators,
    api::{AppState, Server},
    batch::{LocalAggregator, LocalRollupBuilder, PipelineControl, PublishTimeManager, RollupPipeline},
    config::Config,
    oracle::{BridgeRegistry, FeeSchedule},
    pool::PendingPool,
    registry::{RegistryPublisher, RollupRegistry},
};
use chrono::Utc;
use std::sync::Arc;
use tracing::{error, info};

/// The main entry point for the rollup coordinator service.
///
/// This function initializes logging, loads the configuration, wires the
/// coordinator's collaborators, starts the rollup pipeline in the background
/// and serves the API until ctrl-c.
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt::init();

    // Config path may be given as the first argument
    let path = std::env::args()
        .nth(1)
        .unwrap_or_else(|| "config/default.toml".to_string());
    let config = Config::load(&path)?;
    info!("Coordinator starting with config: {:?}", config);

    let registry = Arc::new(RollupRegistry::connect(&config.database.url).await?);
    let next_rollup_id = registry.last_rollup_id().await? + 1;
    info!("Next rollup id is {}", next_rollup_id);

    let deadlines = Arc::new(PublishTimeManager::new(config.timeouts.base_timeout_secs));
    match deadlines.next_timeouts_at(Utc::now()).base_timeout {
        Some(next) => info!(
            "Next publish deadline at {} (block {})",
            next.deadline, next.block_number
        ),
        None => info!("Publish deadlines disabled"),
    }

    // Oracles and proof stand-ins
    let bridges = Arc::new(BridgeRegistry::new(&config.bridge_defaults, &config.bridges));
    let costs = Arc::new(FeeSchedule::new(config.costs.clone(), bridges.clone()));
    let collaborators = Collaborators {
        costs: costs.clone(),
        bridges,
        builder: Arc::new(LocalRollupBuilder::new(costs)),
        aggregator: Arc::new(LocalAggregator::new(next_rollup_id)),
        publisher: Arc::new(RegistryPublisher::new(registry.clone())),
        deadlines,
    };

    // Pool and pipeline control are shared between the API and the pipeline
    let pool = Arc::new(PendingPool::new());
    let control = Arc::new(PipelineControl::new());

    let pipeline = RollupPipeline::new(
        pool.clone(),
        config.coordinator.clone(),
        collaborators,
        control.clone(),
        config.pipeline.clone(),
    );
    let pipeline_task = tokio::spawn(async move {
        if let Err(e) = pipeline.start().await {
            error!("Rollup pipeline error: {:?}", e);
        }
    });
    info!("Rollup pipeline started");

    let server = Server::new(config.api.clone(), AppState::new(pool, control.clone(), registry));
    tokio::select! {
        result = server.start() => result?,
        _ = tokio::signal::ctrl_c() => info!("Shutdown requested"),
    }

    control.shutdown();
    pipeline_task.await?;
    Ok(())
}
