use {
    super::StoreError,
    crate::{domain::DeploymentRecord, traits::ArtifactStore},
    std::{
        collections::{HashMap, hash_map::Entry},
        sync::Arc,
    },
    tokio::sync::RwLock,
    uuid::Uuid,
};

/// Keeps records for the lifetime of the process. Clones share the same
/// records.
#[derive(Clone, Debug, Default)]
pub struct InMemory(Arc<RwLock<HashMap<Uuid, DeploymentRecord>>>);

impl InMemory {
    /// All stored records in no particular order.
    pub async fn records(&self) -> Vec<DeploymentRecord> {
        self.0.read().await.values().cloned().collect()
    }
}

#[async_trait::async_trait]
impl ArtifactStore for InMemory {
    async fn save(&self, record: &DeploymentRecord) -> Result<(), StoreError> {
        match self.0.write().await.entry(record.request_id) {
            Entry::Occupied(_) => Err(StoreError::Duplicate(record.request_id)),
            Entry::Vacant(entry) => {
                entry.insert(record.clone());
                Ok(())
            }
        }
    }

    async fn update(&self, record: &DeploymentRecord) -> Result<(), StoreError> {
        let mut records = self.0.write().await;
        super::check_transition(records.get(&record.request_id), record)?;
        records.insert(record.request_id, record.clone());
        Ok(())
    }

    async fn fetch(&self, request_id: Uuid) -> Result<Option<DeploymentRecord>, StoreError> {
        Ok(self.0.read().await.get(&request_id).cloned())
    }

    async fn pending(&self) -> Result<Vec<DeploymentRecord>, StoreError> {
        Ok(super::pending(self.0.read().await.values()))
    }
}
