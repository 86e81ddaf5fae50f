pub mod arguments;
pub mod artifact;
pub mod chain;
pub mod config;
pub mod domain;
pub mod error;
pub mod observe;
pub mod orchestrator;
pub mod signer;
pub mod store;
pub mod traits;

pub use {
    domain::{DeploymentRecord, DeploymentRequest, DeploymentStatus},
    error::Error,
    orchestrator::Orchestrator,
};
use {
    anyhow::Context,
    arguments::{Arguments, Command},
    artifact::HardhatArtifacts,
    std::{path::Path, sync::Arc},
    traits::ArtifactStore,
};

/// What a command produced.
#[derive(Debug)]
pub enum Output {
    /// A confirmed deployment.
    Deployed(DeploymentRecord),
    /// Deployments waiting for their confirmation.
    Pending(Vec<DeploymentRecord>),
}

/// Runs the command described by the arguments.
pub async fn run(args: &Arguments) -> anyhow::Result<Output> {
    let networks = args.networks().await?;
    let store: Arc<dyn ArtifactStore> = match &args.db_url {
        Some(url) => Arc::new(store::Postgres::connect_lazy(url.as_str())?),
        None => Arc::new(
            store::JsonLines::open(&args.records_path)
                .await
                .context("failed to open deployment records")?,
        ),
    };
    let orchestrator = Orchestrator::connect(
        &networks,
        Arc::new(HardhatArtifacts::new(&args.artifacts_dir)),
        store,
    )?;

    match args.command.clone().unwrap_or(Command::Deploy) {
        Command::Deploy => {
            let request = DeploymentRequest::new(
                &args.artifact_name,
                &args.artifact_version,
                args.constructor_args.clone(),
                args.network_name.as_str(),
            );
            let record = orchestrator.deploy(&request).await?;
            Ok(Output::Deployed(record))
        }
        Command::Reconcile { request_id } => {
            let record = orchestrator
                .reconcile(request_id, args.confirmation_timeout)
                .await?;
            match record.status {
                DeploymentStatus::Confirmed => Ok(Output::Deployed(record)),
                _ => anyhow::bail!(
                    "deployment {request_id} failed: {}",
                    record.error.as_deref().unwrap_or("unknown error")
                ),
            }
        }
        Command::Pending => Ok(Output::Pending(orchestrator.pending().await?)),
    }
}

/// Writes every metric collected so far to `path`.
pub async fn export_metrics(path: &Path) -> anyhow::Result<()> {
    let metrics = ::observe::metrics::encode(::observe::metrics::get_registry())
        .context("failed to encode metrics")?;
    tokio::fs::write(path, metrics)
        .await
        .with_context(|| format!("failed to write metrics to {path:?}"))
}
