//! Durable storage of deployment records.
//!
//! Records are written once when a deployment is broadcast (or rejected) and
//! resolved at most once afterwards. All stores enforce that a record only
//! ever moves from pending to a terminal status.

mod json_lines;
mod memory;
mod postgres;

pub use self::{json_lines::JsonLines, memory::InMemory, postgres::Postgres};
use {
    crate::domain::{DeploymentRecord, DeploymentStatus},
    std::path::PathBuf,
    uuid::Uuid,
};

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("deployment record {0} already exists")]
    Duplicate(Uuid),
    #[error("deployment record {0} does not exist")]
    Unknown(Uuid),
    #[error("deployment record {0} was already resolved")]
    NotPending(Uuid),
    #[error("deployment record {0} can only be resolved to confirmed or failed")]
    NotTerminal(Uuid),
    #[error("stored deployment record {0} is invalid: {1}")]
    Invalid(Uuid, &'static str),
    #[error("failed to access {path:?}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("corrupt deployment record on line {line}")]
    Corrupt {
        line: usize,
        #[source]
        source: serde_json::Error,
    },
    #[error("failed to encode deployment record")]
    Encode(#[source] serde_json::Error),
    #[error(transparent)]
    Database(#[from] sqlx::Error),
}

/// Checks that `new` may replace `current`.
fn check_transition(
    current: Option<&DeploymentRecord>,
    new: &DeploymentRecord,
) -> Result<(), StoreError> {
    if !new.status.is_terminal() {
        return Err(StoreError::NotTerminal(new.request_id));
    }
    match current {
        None => Err(StoreError::Unknown(new.request_id)),
        Some(current) if current.status != DeploymentStatus::Pending => {
            Err(StoreError::NotPending(new.request_id))
        }
        Some(_) => Ok(()),
    }
}

/// Pending records, oldest first.
fn pending<'a>(records: impl Iterator<Item = &'a DeploymentRecord>) -> Vec<DeploymentRecord> {
    let mut pending: Vec<_> = records
        .filter(|record| record.status == DeploymentStatus::Pending)
        .cloned()
        .collect();
    pending.sort_by_key(|record| record.timestamp);
    pending
}

#[cfg(test)]
pub(crate) mod tests {
    use {
        super::*,
        crate::domain::{DeploymentRequest, Inclusion},
        alloy::primitives::{Address, TxHash},
    };

    pub fn pending_record() -> DeploymentRecord {
        let request = DeploymentRequest::new("DiplomaNFT", "1.0.0", vec![], "amoy");
        DeploymentRecord::pending(&request, Address::repeat_byte(1), TxHash::repeat_byte(2))
    }

    pub fn confirmed(record: &DeploymentRecord) -> DeploymentRecord {
        let mut record = record.clone();
        record.confirm(Inclusion {
            block_number: 100,
            contract_address: Address::repeat_byte(3),
        });
        record
    }

    #[test]
    fn transitions() {
        let pending = pending_record();
        let confirmed = confirmed(&pending);
        let mut failed = pending.clone();
        failed.fail(&"reverted");

        assert!(check_transition(Some(&pending), &confirmed).is_ok());
        assert!(check_transition(Some(&pending), &failed).is_ok());
        assert!(matches!(
            check_transition(Some(&pending), &pending),
            Err(StoreError::NotTerminal(_))
        ));
        assert!(matches!(
            check_transition(None, &confirmed),
            Err(StoreError::Unknown(_))
        ));
        assert!(matches!(
            check_transition(Some(&confirmed), &failed),
            Err(StoreError::NotPending(_))
        ));
    }
}
