//! Trait definitions for external system boundaries.
//!
//! These traits abstract key material, the blockchain node, the artifact
//! build outputs and the record storage so the orchestrator can be unit
//! tested with mocks.

use {
    crate::{
        artifact::{Artifact, ArtifactError},
        domain::{DeploymentRecord, Inclusion, SignedTransaction},
        signer::SigningError,
        store::StoreError,
    },
    alloy::{
        primitives::{Address, TxHash},
        rpc::types::TransactionRequest,
    },
    anyhow::Result,
    std::time::Duration,
    uuid::Uuid,
};

/// Holds the private key of the deploying account.
#[cfg_attr(any(test, feature = "test-util"), mockall::automock)]
#[async_trait::async_trait]
pub trait Signer: Send + Sync {
    /// Address of the account that pays for and owns the deployment.
    fn address(&self) -> Address;

    /// Signs a fully prepared transaction.
    async fn sign(&self, tx: TransactionRequest) -> Result<SignedTransaction, SigningError>;
}

#[derive(Debug, thiserror::Error)]
pub enum InclusionError {
    #[error("transaction was not included within {0:?}")]
    Timeout(Duration),
    /// The network gave a definitive answer that the deployment did not
    /// succeed, e.g. the transaction reverted.
    #[error(transparent)]
    Failed(#[from] anyhow::Error),
}

/// Abstracts the node of one network.
#[cfg_attr(any(test, feature = "test-util"), mockall::automock)]
#[async_trait::async_trait]
pub trait ChainClient: Send + Sync {
    /// Fills in everything the node decides: chain id, nonce, fees and gas.
    async fn prepare(&self, tx: TransactionRequest) -> Result<TransactionRequest>;

    /// Broadcasts the transaction and returns its hash as soon as the node
    /// accepted it.
    async fn submit(&self, tx: &SignedTransaction) -> Result<TxHash>;

    /// Waits until the transaction is included and `confirmations` blocks
    /// exist on top of (and including) its block.
    async fn wait_for_inclusion(
        &self,
        tx_hash: TxHash,
        confirmations: u64,
        timeout: Duration,
    ) -> Result<Inclusion, InclusionError>;
}

/// Durable, append-only storage of deployment records.
#[cfg_attr(any(test, feature = "test-util"), mockall::automock)]
#[async_trait::async_trait]
pub trait ArtifactStore: Send + Sync {
    /// Stores a new record. Fails if a record with the same id exists.
    async fn save(&self, record: &DeploymentRecord) -> Result<(), StoreError>;

    /// Resolves a pending record. Fails unless the stored record is pending
    /// and the new one is terminal.
    async fn update(&self, record: &DeploymentRecord) -> Result<(), StoreError>;

    async fn fetch(&self, request_id: Uuid) -> Result<Option<DeploymentRecord>, StoreError>;

    /// All records still waiting for confirmation, oldest first.
    async fn pending(&self) -> Result<Vec<DeploymentRecord>, StoreError>;
}

/// Provides compiled contracts.
#[cfg_attr(any(test, feature = "test-util"), mockall::automock)]
#[async_trait::async_trait]
pub trait ArtifactSource: Send + Sync {
    async fn load(&self, name: &str, version: &str) -> Result<Artifact, ArtifactError>;
}
