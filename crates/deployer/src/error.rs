use {
    crate::{
        artifact::ArtifactError,
        config::ConfigurationError,
        domain::DeploymentRecord,
        signer::SigningError,
        store::StoreError,
    },
    std::time::Duration,
    uuid::Uuid,
};

/// Everything that can stop a deployment.
///
/// Variants up to and including [`Error::Signing`] happen before anything is
/// broadcast and leave no record behind. [`Error::Submission`] and
/// [`Error::ConfirmationTimeout`] carry the failed record that was persisted
/// before the error was returned.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("invalid deployment request: {0} must not be empty")]
    InvalidRequest(&'static str),
    #[error(transparent)]
    Configuration(#[from] ConfigurationError),
    #[error(transparent)]
    Artifact(#[from] ArtifactError),
    #[error(transparent)]
    Signing(#[from] SigningError),
    #[error("deployment {} failed on {}", .record.request_id, .record.network)]
    Submission {
        record: Box<DeploymentRecord>,
        #[source]
        source: anyhow::Error,
    },
    #[error(
        "deployment {} was not confirmed within {timeout:?}; transaction {} was broadcast and may \
         still be included later",
        .record.request_id,
        .record.transaction_hash.map(|hash| hash.to_string()).unwrap_or_default()
    )]
    ConfirmationTimeout {
        record: Box<DeploymentRecord>,
        timeout: Duration,
    },
    #[error("no deployment record with id {0}")]
    UnknownRecord(Uuid),
    #[error(transparent)]
    Store(#[from] StoreError),
}

impl Error {
    /// The persisted record, for errors raised after a transaction was
    /// handed to the network.
    pub fn record(&self) -> Option<&DeploymentRecord> {
        match self {
            Self::Submission { record, .. } | Self::ConfirmationTimeout { record, .. } => {
                Some(&**record)
            }
            _ => None,
        }
    }

    /// Whether the deployment stopped before a transaction was handed to the
    /// network.
    pub fn is_abort(&self) -> bool {
        matches!(
            self,
            Self::InvalidRequest(_)
                | Self::Configuration(_)
                | Self::Artifact(_)
                | Self::Signing(_)
                | Self::UnknownRecord(_)
        )
    }
}
