use {
    crate::{config::NetworkName, error::Error},
    alloy::primitives::{Address, Bytes, TxHash},
    chrono::{DateTime, Utc},
    serde::{Deserialize, Serialize},
    std::fmt::Display,
    uuid::Uuid,
};

/// A request to publish one artifact to one network. Every request gets its
/// own id, so submitting the same artifact twice yields two records.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DeploymentRequest {
    id: Uuid,
    artifact_name: String,
    artifact_version: String,
    constructor_args: Vec<String>,
    target_network: NetworkName,
}

impl DeploymentRequest {
    pub fn new(
        artifact_name: impl Into<String>,
        artifact_version: impl Into<String>,
        constructor_args: Vec<String>,
        target_network: impl Into<NetworkName>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            artifact_name: artifact_name.into(),
            artifact_version: artifact_version.into(),
            constructor_args,
            target_network: target_network.into(),
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn artifact_name(&self) -> &str {
        &self.artifact_name
    }

    pub fn artifact_version(&self) -> &str {
        &self.artifact_version
    }

    /// Constructor arguments in declaration order, as text. They are coerced
    /// into the types of the constructor's ABI when the artifact is loaded.
    pub fn constructor_args(&self) -> &[String] {
        &self.constructor_args
    }

    pub fn target_network(&self) -> &NetworkName {
        &self.target_network
    }

    pub(crate) fn validate(&self) -> Result<(), Error> {
        let fields = [
            ("artifact name", self.artifact_name.as_str()),
            ("artifact version", self.artifact_version.as_str()),
            ("target network", self.target_network.as_str()),
        ];
        match fields.iter().find(|(_, value)| value.trim().is_empty()) {
            Some((field, _)) => Err(Error::InvalidRequest(*field)),
            None => Ok(()),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeploymentStatus {
    Pending,
    Confirmed,
    Failed,
}

impl DeploymentStatus {
    pub fn is_terminal(self) -> bool {
        !matches!(self, Self::Pending)
    }
}

/// Audit record of a deployment.
///
/// Created when the transaction is broadcast (or rejected) and resolved at
/// most once afterwards.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeploymentRecord {
    pub request_id: Uuid,
    pub artifact_name: String,
    pub artifact_version: String,
    pub network: NetworkName,
    pub deployer: Address,
    pub deployed_address: Option<Address>,
    /// `None` only when the network refused the transaction outright.
    pub transaction_hash: Option<TxHash>,
    pub block_number: Option<u64>,
    /// Time of the last state change.
    pub timestamp: DateTime<Utc>,
    pub status: DeploymentStatus,
    pub error: Option<String>,
}

impl DeploymentRecord {
    pub(crate) fn pending(request: &DeploymentRequest, deployer: Address, tx_hash: TxHash) -> Self {
        Self {
            request_id: request.id,
            artifact_name: request.artifact_name.clone(),
            artifact_version: request.artifact_version.clone(),
            network: request.target_network.clone(),
            deployer,
            deployed_address: None,
            transaction_hash: Some(tx_hash),
            block_number: None,
            timestamp: Utc::now(),
            status: DeploymentStatus::Pending,
            error: None,
        }
    }

    pub(crate) fn rejected(
        request: &DeploymentRequest,
        deployer: Address,
        error: &impl Display,
    ) -> Self {
        Self {
            request_id: request.id,
            artifact_name: request.artifact_name.clone(),
            artifact_version: request.artifact_version.clone(),
            network: request.target_network.clone(),
            deployer,
            deployed_address: None,
            transaction_hash: None,
            block_number: None,
            timestamp: Utc::now(),
            status: DeploymentStatus::Failed,
            error: Some(error.to_string()),
        }
    }

    pub(crate) fn confirm(&mut self, inclusion: Inclusion) {
        self.deployed_address = Some(inclusion.contract_address);
        self.block_number = Some(inclusion.block_number);
        self.timestamp = Utc::now();
        self.status = DeploymentStatus::Confirmed;
    }

    pub(crate) fn fail(&mut self, error: &impl Display) {
        self.timestamp = Utc::now();
        self.status = DeploymentStatus::Failed;
        self.error = Some(error.to_string());
    }
}

/// A transaction ready to be broadcast.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SignedTransaction {
    pub hash: TxHash,
    /// EIP-2718 encoded envelope.
    pub raw: Bytes,
}

/// Where a deployment transaction ended up.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Inclusion {
    pub block_number: u64,
    pub contract_address: Address,
}
