use {
    chrono::{DateTime, Utc},
    sqlx::PgConnection,
    uuid::Uuid,
};

#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, Hash, sqlx::Type)]
#[sqlx(type_name = "DeploymentStatus")]
#[sqlx(rename_all = "lowercase")]
pub enum DeploymentStatus {
    /// The transaction was broadcast and is waiting for inclusion.
    #[default]
    Pending,
    /// The contract exists on chain.
    Confirmed,
    /// The deployment was rejected, reverted or timed out.
    Failed,
}

/// One row per deployment request. Rows are never deleted.
#[derive(Clone, Debug, PartialEq, Eq, sqlx::FromRow)]
pub struct DeploymentRecord {
    pub request_id: Uuid,
    pub artifact_name: String,
    pub artifact_version: String,
    pub network: String,
    pub deployer: Vec<u8>,
    pub deployed_address: Option<Vec<u8>>,
    pub tx_hash: Option<Vec<u8>>,
    pub block_number: Option<i64>,
    pub recorded_at: DateTime<Utc>,
    pub status: DeploymentStatus,
    pub error: Option<String>,
}

pub async fn insert(ex: &mut PgConnection, record: &DeploymentRecord) -> Result<(), sqlx::Error> {
    const QUERY: &str = r#"
INSERT INTO deployment_records (
    request_id,
    artifact_name,
    artifact_version,
    network,
    deployer,
    deployed_address,
    tx_hash,
    block_number,
    recorded_at,
    status,
    error
)
VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
    ;"#;
    sqlx::query(QUERY)
        .bind(record.request_id)
        .bind(&record.artifact_name)
        .bind(&record.artifact_version)
        .bind(&record.network)
        .bind(&record.deployer)
        .bind(&record.deployed_address)
        .bind(&record.tx_hash)
        .bind(record.block_number)
        .bind(record.recorded_at)
        .bind(record.status)
        .bind(&record.error)
        .execute(ex)
        .await?;
    Ok(())
}

/// Moves a pending record into its terminal state.
///
/// Returns `false` if no pending row with that id exists, i.e. the record is
/// unknown or was already resolved.
pub async fn resolve(ex: &mut PgConnection, record: &DeploymentRecord) -> Result<bool, sqlx::Error> {
    const QUERY: &str = r#"
UPDATE deployment_records
SET deployed_address = $2, block_number = $3, recorded_at = $4, status = $5, error = $6
WHERE request_id = $1 AND status = 'pending'
    ;"#;
    let result = sqlx::query(QUERY)
        .bind(record.request_id)
        .bind(&record.deployed_address)
        .bind(record.block_number)
        .bind(record.recorded_at)
        .bind(record.status)
        .bind(&record.error)
        .execute(ex)
        .await?;
    Ok(result.rows_affected() == 1)
}

pub async fn fetch(
    ex: &mut PgConnection,
    request_id: Uuid,
) -> Result<Option<DeploymentRecord>, sqlx::Error> {
    const QUERY: &str = r#"SELECT * FROM deployment_records WHERE request_id = $1"#;
    sqlx::query_as(QUERY)
        .bind(request_id)
        .fetch_optional(ex)
        .await
}

pub async fn pending(ex: &mut PgConnection) -> Result<Vec<DeploymentRecord>, sqlx::Error> {
    const QUERY: &str = r#"
SELECT * FROM deployment_records
WHERE status = 'pending'
ORDER BY recorded_at
    ;"#;
    sqlx::query_as(QUERY).fetch_all(ex).await
}
