//! Events that are meaningful to a deployment. Each function logs the event
//! and updates the metrics if the event is worth measuring.

use {
    crate::{
        domain::{DeploymentRecord, DeploymentRequest},
        error::Error,
        store::StoreError,
    },
    std::time::Duration,
};

pub mod metrics;

/// Observe that a deployment is about to start.
pub fn deploying(request: &DeploymentRequest) {
    tracing::info!(
        request_id = %request.id(),
        artifact = request.artifact_name(),
        version = request.artifact_version(),
        network = %request.target_network(),
        args = ?request.constructor_args(),
        "deploying"
    );
}

/// Observe that a deployment stopped before anything was broadcast.
pub fn aborted(request: &DeploymentRequest, err: &Error) {
    tracing::warn!(request_id = %request.id(), ?err, "deployment aborted");
    metrics::get()
        .deployments
        .with_label_values(&[request.target_network().as_str(), "aborted"])
        .inc();
}

/// Observe that the network refused the deployment transaction.
pub fn rejected(record: &DeploymentRecord, err: &anyhow::Error) {
    tracing::warn!(
        request_id = %record.request_id,
        network = %record.network,
        ?err,
        "deployment rejected"
    );
    metrics::get()
        .deployments
        .with_label_values(&[record.network.as_str(), "rejected"])
        .inc();
}

/// Observe that the deployment transaction was broadcast.
pub fn submitted(record: &DeploymentRecord) {
    tracing::info!(
        request_id = %record.request_id,
        network = %record.network,
        deployer = ?record.deployer,
        tx_hash = ?record.transaction_hash,
        "deployment submitted"
    );
}

/// Observe that a pending deployment is being resolved again.
pub fn reconciling(record: &DeploymentRecord) {
    tracing::info!(
        request_id = %record.request_id,
        network = %record.network,
        tx_hash = ?record.transaction_hash,
        "reconciling pending deployment"
    );
}

/// Observe a confirmed deployment.
pub fn confirmed(record: &DeploymentRecord, elapsed: Duration) {
    tracing::info!(
        request_id = %record.request_id,
        network = %record.network,
        address = ?record.deployed_address,
        block = ?record.block_number,
        ?elapsed,
        "deployment confirmed"
    );
    let metrics = metrics::get();
    metrics
        .deployments
        .with_label_values(&[record.network.as_str(), "confirmed"])
        .inc();
    metrics
        .confirmation_seconds
        .with_label_values(&[record.network.as_str()])
        .observe(elapsed.as_secs_f64());
}

/// Observe a deployment that was included but did not create the contract.
pub fn failed(record: &DeploymentRecord, err: &anyhow::Error) {
    tracing::warn!(
        request_id = %record.request_id,
        network = %record.network,
        tx_hash = ?record.transaction_hash,
        ?err,
        "deployment failed"
    );
    metrics::get()
        .deployments
        .with_label_values(&[record.network.as_str(), "failed"])
        .inc();
}

/// Observe that waiting for the confirmation was given up.
pub fn timed_out(record: &DeploymentRecord, timeout: Duration) {
    tracing::warn!(
        request_id = %record.request_id,
        network = %record.network,
        tx_hash = ?record.transaction_hash,
        ?timeout,
        "deployment not confirmed in time, the transaction may still be included"
    );
    metrics::get()
        .deployments
        .with_label_values(&[record.network.as_str(), "timeout"])
        .inc();
}

/// Observe that a record could not be persisted.
pub fn store_failed(record: &DeploymentRecord, err: &StoreError) {
    tracing::error!(
        request_id = %record.request_id,
        network = %record.network,
        tx_hash = ?record.transaction_hash,
        ?err,
        "failed to persist deployment record"
    );
    metrics::get()
        .deployments
        .with_label_values(&[record.network.as_str(), "store_failed"])
        .inc();
}
