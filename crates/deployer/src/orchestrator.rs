//! Drives a deployment from the request to a persisted terminal record.
//!
//! The orchestrator never retries. Once a transaction was broadcast a
//! pending record is stored before the confirmation is awaited, so a crash
//! while waiting leaves a record that [`Orchestrator::reconcile`] can resolve
//! later without broadcasting again.

use {
    crate::{
        chain::Rpc,
        config::{ConfigurationError, NetworkConfig, NetworkName, Networks},
        domain::{DeploymentRecord, DeploymentRequest},
        error::Error,
        observe,
        signer::Wallet,
        store::StoreError,
        traits::{ArtifactSource, ArtifactStore, ChainClient, InclusionError, Signer},
    },
    alloy::{
        network::TransactionBuilder,
        primitives::{Address, TxHash},
        rpc::types::TransactionRequest,
    },
    std::{collections::HashMap, sync::Arc, time::Duration},
    tokio::time::Instant,
    uuid::Uuid,
};

/// A network the orchestrator can deploy to, with its collaborators.
#[derive(Clone)]
pub struct Network {
    pub name: NetworkName,
    pub confirmations: u64,
    pub confirmation_timeout: Duration,
    pub signer: Arc<dyn Signer>,
    pub chain: Arc<dyn ChainClient>,
}

impl Network {
    pub fn new(
        config: &NetworkConfig,
        signer: Arc<dyn Signer>,
        chain: Arc<dyn ChainClient>,
    ) -> Self {
        Self {
            name: config.name.clone(),
            confirmations: config.confirmations,
            confirmation_timeout: config.confirmation_timeout,
            signer,
            chain,
        }
    }
}

pub struct Orchestrator {
    networks: HashMap<NetworkName, Network>,
    artifacts: Arc<dyn ArtifactSource>,
    store: Arc<dyn ArtifactStore>,
}

impl Orchestrator {
    pub fn new(
        networks: impl IntoIterator<Item = Network>,
        artifacts: Arc<dyn ArtifactSource>,
        store: Arc<dyn ArtifactStore>,
    ) -> Self {
        Self {
            networks: networks
                .into_iter()
                .map(|network| (network.name.clone(), network))
                .collect(),
            artifacts,
            store,
        }
    }

    /// Creates the orchestrator with a local key signer and a JSON-RPC client
    /// for every configured network.
    pub fn connect(
        networks: &Networks,
        artifacts: Arc<dyn ArtifactSource>,
        store: Arc<dyn ArtifactStore>,
    ) -> Result<Self, Error> {
        let networks = networks
            .iter()
            .map(|config| {
                let signer = Wallet::from_private_key(&config.private_key)?;
                Ok(Network::new(
                    config,
                    Arc::new(signer),
                    Arc::new(Rpc::new(config)),
                ))
            })
            .collect::<Result<Vec<_>, Error>>()?;
        Ok(Self::new(networks, artifacts, store))
    }

    /// Deploys the requested artifact and waits for the network's default
    /// confirmation timeout.
    ///
    /// A returned record is always confirmed. Failures after the transaction
    /// was handed to the network carry the persisted failed record.
    pub async fn deploy(&self, request: &DeploymentRequest) -> Result<DeploymentRecord, Error> {
        self.observed(request, self.try_deploy(request, None)).await
    }

    /// Like [`Self::deploy`] but gives up waiting for the confirmation after
    /// `timeout`. The broadcast transaction is not cancelled.
    pub async fn deploy_with_timeout(
        &self,
        request: &DeploymentRequest,
        timeout: Duration,
    ) -> Result<DeploymentRecord, Error> {
        self.observed(request, self.try_deploy(request, Some(timeout)))
            .await
    }

    /// Resolves a record that was left pending, e.g. because the process
    /// stopped while waiting. Only waits for the already broadcast
    /// transaction, never submits a new one. Resolved records are returned
    /// as they are.
    pub async fn reconcile(
        &self,
        request_id: Uuid,
        timeout: Duration,
    ) -> Result<DeploymentRecord, Error> {
        let record = self
            .store
            .fetch(request_id)
            .await?
            .ok_or(Error::UnknownRecord(request_id))?;
        if record.status.is_terminal() {
            return Ok(record);
        }
        let network = self.network(&record.network)?;
        let tx_hash = record.transaction_hash.ok_or(StoreError::Invalid(
            request_id,
            "pending record without transaction hash",
        ))?;

        observe::reconciling(&record);
        self.await_confirmation(network, record, tx_hash, timeout)
            .await
    }

    /// Records that were broadcast but never resolved, oldest first.
    pub async fn pending(&self) -> Result<Vec<DeploymentRecord>, Error> {
        Ok(self.store.pending().await?)
    }

    async fn observed(
        &self,
        request: &DeploymentRequest,
        deployment: impl Future<Output = Result<DeploymentRecord, Error>>,
    ) -> Result<DeploymentRecord, Error> {
        let result = deployment.await;
        // Store failures are observed where they happen.
        if let Some(err) = result.as_ref().err().filter(|err| err.is_abort()) {
            observe::aborted(request, err);
        }
        result
    }

    async fn try_deploy(
        &self,
        request: &DeploymentRequest,
        timeout: Option<Duration>,
    ) -> Result<DeploymentRecord, Error> {
        request.validate()?;
        let network = self.network(request.target_network())?;
        let timeout = timeout.unwrap_or(network.confirmation_timeout);

        observe::deploying(request);
        let artifact = self
            .artifacts
            .load(request.artifact_name(), request.artifact_version())
            .await?;
        let code = artifact.deploy_code(request.constructor_args())?;

        let deployer = network.signer.address();
        let tx = TransactionRequest::default()
            .with_from(deployer)
            .with_deploy_code(code);
        // The node refusing to fill in the transaction, e.g. because the
        // constructor reverts during gas estimation, counts as a rejection.
        let tx = match network.chain.prepare(tx).await {
            Ok(tx) => tx,
            Err(err) => return Err(self.reject(request, deployer, err).await),
        };
        let signed = network.signer.sign(tx).await?;
        let tx_hash = match network.chain.submit(&signed).await {
            Ok(tx_hash) => tx_hash,
            Err(err) => return Err(self.reject(request, deployer, err).await),
        };

        let record = DeploymentRecord::pending(request, deployer, tx_hash);
        if let Err(err) = self.store.save(&record).await {
            observe::store_failed(&record, &err);
            return Err(err.into());
        }
        observe::submitted(&record);

        self.await_confirmation(network, record, tx_hash, timeout)
            .await
    }

    fn network(&self, name: &NetworkName) -> Result<&Network, ConfigurationError> {
        self.networks
            .get(name)
            .ok_or_else(|| ConfigurationError::UnknownNetwork(name.clone()))
    }

    /// Persists a failed record for a transaction the network refused.
    async fn reject(
        &self,
        request: &DeploymentRequest,
        deployer: Address,
        err: anyhow::Error,
    ) -> Error {
        let record = DeploymentRecord::rejected(request, deployer, &format!("{err:#}"));
        observe::rejected(&record, &err);
        if let Err(err) = self.store.save(&record).await {
            observe::store_failed(&record, &err);
            return err.into();
        }
        Error::Submission {
            record: Box::new(record),
            source: err,
        }
    }

    async fn await_confirmation(
        &self,
        network: &Network,
        mut record: DeploymentRecord,
        tx_hash: TxHash,
        timeout: Duration,
    ) -> Result<DeploymentRecord, Error> {
        let start = Instant::now();
        let inclusion = tokio::time::timeout(
            timeout,
            network
                .chain
                .wait_for_inclusion(tx_hash, network.confirmations, timeout),
        )
        .await
        .unwrap_or_else(|_| Err(InclusionError::Timeout(timeout)));

        let result = match inclusion {
            Ok(inclusion) => {
                record.confirm(inclusion);
                Ok(())
            }
            Err(InclusionError::Timeout(_)) => {
                record.fail(&format!(
                    "not confirmed within {}",
                    humantime::format_duration(timeout)
                ));
                Err(None)
            }
            Err(InclusionError::Failed(err)) => {
                record.fail(&format!("{err:#}"));
                Err(Some(err))
            }
        };
        if let Err(err) = self.store.update(&record).await {
            observe::store_failed(&record, &err);
            return Err(err.into());
        }

        match result {
            Ok(()) => {
                observe::confirmed(&record, start.elapsed());
                Ok(record)
            }
            Err(None) => {
                observe::timed_out(&record, timeout);
                Err(Error::ConfirmationTimeout {
                    record: Box::new(record),
                    timeout,
                })
            }
            Err(Some(err)) => {
                observe::failed(&record, &err);
                Err(Error::Submission {
                    record: Box::new(record),
                    source: err,
                })
            }
        }
    }
}
