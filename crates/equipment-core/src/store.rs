use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::aggregate::aggregate;
use crate::error::{EquipmentError, Result};
use crate::schema::{Dataset, DatasetId, DatasetRecord, NewDataset, Owner};
use crate::validator::{validate_equipment_table, Table};

/// Repository for datasets and their equipment rows.
///
/// `insert` is the transactional boundary: the record and every child row
/// become visible together or not at all.
#[async_trait]
pub trait DatasetStore: Send + Sync {
    async fn insert(&self, new: NewDataset) -> Result<Dataset>;

    async fn get(&self, id: DatasetId) -> Result<Dataset>;

    /// Newest first, at most `limit` entries.
    async fn list_by_owner(&self, owner_id: &str, limit: usize) -> Result<Vec<DatasetRecord>>;

    /// Removes the dataset and all of its rows.
    async fn delete(&self, id: DatasetId) -> Result<()>;

    /// Validate, aggregate and persist one decoded upload.
    async fn create(&self, owner: &Owner, name: &str, source_hash: String, table: Table) -> Result<Dataset> {
        let new = prepare(owner, name, source_hash, table)?;
        self.insert(new).await
    }
}

/// The CPU-bound half of `create`: schema check and aggregation.
pub fn prepare(owner: &Owner, name: &str, source_hash: String, table: Table) -> Result<NewDataset> {
    let table = validate_equipment_table(table)?;
    let agg = aggregate(table)?;
    Ok(NewDataset {
        name: name.to_string(),
        owner: owner.clone(),
        source_hash,
        summary: agg.summary,
        equipment: agg.rows,
    })
}

struct Entry {
    seq: u64,
    dataset: Dataset,
}

#[derive(Default)]
struct Inner {
    next_seq: u64,
    rows_stored: usize,
    last_created: Option<DateTime<Utc>>,
    datasets: HashMap<DatasetId, Entry>,
}

/// Process-local store. Each insert happens under a single write lock.
#[derive(Default)]
pub struct MemoryStore {
    inner: RwLock<Inner>,
    row_capacity: Option<usize>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store that refuses inserts once `rows` equipment rows are held.
    pub fn with_row_capacity(rows: usize) -> Self {
        Self { inner: RwLock::default(), row_capacity: Some(rows) }
    }

    pub async fn dataset_count(&self) -> usize {
        self.inner.read().await.datasets.len()
    }

    pub async fn row_count(&self) -> usize {
        self.inner.read().await.rows_stored
    }
}

#[async_trait]
impl DatasetStore for MemoryStore {
    async fn insert(&self, new: NewDataset) -> Result<Dataset> {
        let mut inner = self.inner.write().await;

        if let Some(cap) = self.row_capacity {
            let wanted = inner.rows_stored + new.equipment.len();
            if wanted > cap {
                return Err(EquipmentError::Storage(format!(
                    "row capacity exceeded: {wanted} rows requested, capacity {cap}"
                )));
            }
        }

        let seq = inner.next_seq;
        inner.next_seq += 1;

        // timestamps never go backwards, so time order agrees with commit order
        let now = Utc::now();
        let created_at = inner.last_created.map_or(now, |last| now.max(last));
        inner.last_created = Some(created_at);

        let record = DatasetRecord {
            id: Uuid::new_v4(),
            name: new.name,
            created_at,
            owner: new.owner,
            source_hash: new.source_hash,
            summary: new.summary,
        };
        let dataset = Dataset { record, equipment: new.equipment };

        inner.rows_stored += dataset.equipment.len();
        inner.datasets.insert(dataset.record.id, Entry { seq, dataset: dataset.clone() });
        Ok(dataset)
    }

    async fn get(&self, id: DatasetId) -> Result<Dataset> {
        let inner = self.inner.read().await;
        inner
            .datasets
            .get(&id)
            .map(|e| e.dataset.clone())
            .ok_or(EquipmentError::NotFound(id))
    }

    async fn list_by_owner(&self, owner_id: &str, limit: usize) -> Result<Vec<DatasetRecord>> {
        let inner = self.inner.read().await;
        let mut owned: Vec<&Entry> = inner
            .datasets
            .values()
            .filter(|e| e.dataset.record.owner.id == owner_id)
            .collect();
        owned.sort_by(|a, b| {
            b.dataset
                .record
                .created_at
                .cmp(&a.dataset.record.created_at)
                .then(b.seq.cmp(&a.seq))
        });
        Ok(owned.into_iter().take(limit).map(|e| e.dataset.record.clone()).collect())
    }

    async fn delete(&self, id: DatasetId) -> Result<()> {
        let mut inner = self.inner.write().await;
        let entry = inner.datasets.remove(&id).ok_or(EquipmentError::NotFound(id))?;
        inner.rows_stored -= entry.dataset.equipment.len();
        Ok(())
    }
}
