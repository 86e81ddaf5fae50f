use {
    super::StoreError,
    crate::{
        domain::{DeploymentRecord, DeploymentStatus},
        traits::ArtifactStore,
    },
    alloy::primitives::{Address, TxHash},
    database::deployment_records as db,
    sqlx::PgPool,
    uuid::Uuid,
};

/// Stores records in the `deployment_records` table.
#[derive(Clone, Debug)]
pub struct Postgres {
    pool: PgPool,
}

impl Postgres {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Creates the pool without connecting. Connection errors surface on
    /// first use.
    pub fn connect_lazy(url: &str) -> Result<Self, StoreError> {
        Ok(Self::new(PgPool::connect_lazy(url)?))
    }
}

#[async_trait::async_trait]
impl ArtifactStore for Postgres {
    async fn save(&self, record: &DeploymentRecord) -> Result<(), StoreError> {
        let row = into_row(record)?;
        let mut ex = self.pool.acquire().await?;
        match db::insert(&mut ex, &row).await {
            Err(sqlx::Error::Database(err)) if err.is_unique_violation() => {
                Err(StoreError::Duplicate(record.request_id))
            }
            result => Ok(result?),
        }
    }

    async fn update(&self, record: &DeploymentRecord) -> Result<(), StoreError> {
        if !record.status.is_terminal() {
            return Err(StoreError::NotTerminal(record.request_id));
        }
        let row = into_row(record)?;
        let mut ex = self.pool.acquire().await?;
        if db::resolve(&mut ex, &row).await? {
            return Ok(());
        }
        match db::fetch(&mut ex, record.request_id).await? {
            Some(_) => Err(StoreError::NotPending(record.request_id)),
            None => Err(StoreError::Unknown(record.request_id)),
        }
    }

    async fn fetch(&self, request_id: Uuid) -> Result<Option<DeploymentRecord>, StoreError> {
        let mut ex = self.pool.acquire().await?;
        db::fetch(&mut ex, request_id)
            .await?
            .map(from_row)
            .transpose()
    }

    async fn pending(&self) -> Result<Vec<DeploymentRecord>, StoreError> {
        let mut ex = self.pool.acquire().await?;
        db::pending(&mut ex).await?.into_iter().map(from_row).collect()
    }
}

fn into_row(record: &DeploymentRecord) -> Result<db::DeploymentRecord, StoreError> {
    let block_number = record
        .block_number
        .map(i64::try_from)
        .transpose()
        .map_err(|_| StoreError::Invalid(record.request_id, "block number out of range"))?;
    Ok(db::DeploymentRecord {
        request_id: record.request_id,
        artifact_name: record.artifact_name.clone(),
        artifact_version: record.artifact_version.clone(),
        network: record.network.to_string(),
        deployer: record.deployer.to_vec(),
        deployed_address: record.deployed_address.map(|address| address.to_vec()),
        tx_hash: record.transaction_hash.map(|hash| hash.to_vec()),
        block_number,
        recorded_at: record.timestamp,
        status: match record.status {
            DeploymentStatus::Pending => db::DeploymentStatus::Pending,
            DeploymentStatus::Confirmed => db::DeploymentStatus::Confirmed,
            DeploymentStatus::Failed => db::DeploymentStatus::Failed,
        },
        error: record.error.clone(),
    })
}

fn from_row(row: db::DeploymentRecord) -> Result<DeploymentRecord, StoreError> {
    let invalid = |reason| StoreError::Invalid(row.request_id, reason);
    let address = |bytes: &[u8]| Address::try_from(bytes).map_err(|_| invalid("bad address"));
    Ok(DeploymentRecord {
        request_id: row.request_id,
        deployer: address(&row.deployer)?,
        deployed_address: row.deployed_address.as_deref().map(address).transpose()?,
        transaction_hash: row
            .tx_hash
            .as_deref()
            .map(TxHash::try_from)
            .transpose()
            .map_err(|_| invalid("bad transaction hash"))?,
        block_number: row
            .block_number
            .map(u64::try_from)
            .transpose()
            .map_err(|_| invalid("negative block number"))?,
        timestamp: row.recorded_at,
        status: match row.status {
            db::DeploymentStatus::Pending => DeploymentStatus::Pending,
            db::DeploymentStatus::Confirmed => DeploymentStatus::Confirmed,
            db::DeploymentStatus::Failed => DeploymentStatus::Failed,
        },
        artifact_name: row.artifact_name,
        artifact_version: row.artifact_version,
        network: row.network.into(),
        error: row.error,
    })
}
