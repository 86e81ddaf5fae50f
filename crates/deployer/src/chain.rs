use {
    crate::{
        config::{NetworkConfig, NetworkName},
        domain::{Inclusion, SignedTransaction},
        traits::{ChainClient, InclusionError},
    },
    alloy::{
        network::{ReceiptResponse, TransactionBuilder},
        primitives::TxHash,
        providers::{DynProvider, Provider, ProviderBuilder},
        rpc::{client::ClientBuilder, types::TransactionRequest},
    },
    anyhow::{Context, Result, anyhow},
    std::time::Duration,
    tokio::time::MissedTickBehavior,
};

/// [`ChainClient`] talking JSON-RPC over HTTP to the node of one network.
#[derive(Debug, Clone)]
pub struct Rpc {
    network: NetworkName,
    provider: DynProvider,
    chain_id: Option<u64>,
    poll_interval: Duration,
}

impl Rpc {
    /// Creates the client. No request is sent until the client is used.
    pub fn new(config: &NetworkConfig) -> Self {
        let client = ClientBuilder::default().http(config.rpc_url.clone());
        Self::with_provider(
            config,
            ProviderBuilder::new()
                .disable_recommended_fillers()
                .connect_client(client)
                .erased(),
        )
    }

    pub fn with_provider(config: &NetworkConfig, provider: DynProvider) -> Self {
        Self {
            network: config.name.clone(),
            provider,
            chain_id: config.chain_id,
            poll_interval: config.poll_interval,
        }
    }

    async fn poll_inclusion(
        &self,
        tx_hash: TxHash,
        confirmations: u64,
    ) -> Result<Inclusion, InclusionError> {
        let mut interval = tokio::time::interval(self.poll_interval);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
        loop {
            interval.tick().await;

            // Errors while polling are not final: the transaction is out and
            // the node might just be flaky. The caller's timeout bounds this.
            let receipt = match self.provider.get_transaction_receipt(tx_hash).await {
                Ok(Some(receipt)) => receipt,
                Ok(None) => continue,
                Err(err) => {
                    tracing::warn!(network = %self.network, ?tx_hash, ?err, "failed to fetch receipt");
                    continue;
                }
            };
            let Some(block_number) = receipt.block_number() else {
                continue;
            };
            if !receipt.status() {
                return Err(anyhow!("transaction reverted in block {block_number}").into());
            }
            let Some(contract_address) = receipt.contract_address() else {
                return Err(anyhow!("transaction did not create a contract").into());
            };

            let head = match self.provider.get_block_number().await {
                Ok(head) => head,
                Err(err) => {
                    tracing::warn!(network = %self.network, ?err, "failed to fetch block number");
                    continue;
                }
            };
            // The block containing the transaction is the first confirmation.
            let confirmed = head.saturating_sub(block_number).saturating_add(1);
            if confirmed >= confirmations {
                return Ok(Inclusion {
                    block_number,
                    contract_address,
                });
            }
            tracing::debug!(
                network = %self.network,
                ?tx_hash,
                confirmed,
                confirmations,
                "waiting for more confirmations"
            );
        }
    }
}

#[async_trait::async_trait]
impl ChainClient for Rpc {
    async fn prepare(&self, tx: TransactionRequest) -> Result<TransactionRequest> {
        let from = tx.from.context("transaction has no sender")?;
        let chain_id = self
            .provider
            .get_chain_id()
            .await
            .context("failed to fetch chain id")?;
        if let Some(expected) = self.chain_id {
            anyhow::ensure!(
                chain_id == expected,
                "node reports chain id {chain_id} but network {} is configured for {expected}",
                self.network
            );
        }
        let nonce = self
            .provider
            .get_transaction_count(from)
            .await
            .context("failed to fetch nonce")?;
        let fees = self
            .provider
            .estimate_eip1559_fees()
            .await
            .context("failed to estimate fees")?;

        let tx = tx
            .with_chain_id(chain_id)
            .with_nonce(nonce)
            .with_max_fee_per_gas(fees.max_fee_per_gas)
            .with_max_priority_fee_per_gas(fees.max_priority_fee_per_gas);
        let gas = self
            .provider
            .estimate_gas(tx.clone())
            .await
            .context("failed to estimate gas")?;
        Ok(tx.with_gas_limit(gas))
    }

    async fn submit(&self, tx: &SignedTransaction) -> Result<TxHash> {
        let pending = self
            .provider
            .send_raw_transaction(&tx.raw)
            .await
            .context("node rejected transaction")?;
        Ok(*pending.tx_hash())
    }

    async fn wait_for_inclusion(
        &self,
        tx_hash: TxHash,
        confirmations: u64,
        timeout: Duration,
    ) -> Result<Inclusion, InclusionError> {
        tokio::time::timeout(timeout, self.poll_inclusion(tx_hash, confirmations))
            .await
            .map_err(|_| InclusionError::Timeout(timeout))?
    }
}
