use std::sync::Arc;

use bytes::Bytes;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::error::{EquipmentError, Result};
use crate::retention::RetentionPolicy;
use crate::schema::{source_hash, DatasetId, Owner};
use crate::store::{prepare, DatasetStore};
use crate::validator::Table;
use crate::views::{brief, full, BriefView, FullView};

pub const DEFAULT_HISTORY_LIMIT: usize = 5;

/// What `fetch` does when the caller is not the dataset's owner.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FetchPolicy {
    /// Any caller may read any dataset by id.
    #[default]
    Advisory,
    /// Datasets of other owners are reported as not found.
    Strict,
}

impl std::str::FromStr for FetchPolicy {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "advisory" => Ok(Self::Advisory),
            "strict" => Ok(Self::Strict),
            other => Err(format!("unknown fetch policy '{other}' (expected advisory or strict)")),
        }
    }
}

/// Entry points used by the HTTP layer.
#[derive(Clone)]
pub struct EquipmentService {
    store: Arc<dyn DatasetStore>,
    retention: RetentionPolicy,
    fetch_policy: FetchPolicy,
}

impl EquipmentService {
    pub fn new(store: Arc<dyn DatasetStore>) -> Self {
        Self { store, retention: RetentionPolicy::default(), fetch_policy: FetchPolicy::default() }
    }

    pub fn with_retention(mut self, retention: RetentionPolicy) -> Self {
        self.retention = retention;
        self
    }

    pub fn with_fetch_policy(mut self, policy: FetchPolicy) -> Self {
        self.fetch_policy = policy;
        self
    }

    /// Decode, validate, aggregate and persist one upload, then trim the
    /// owner's history. Parsing runs on the blocking pool.
    pub async fn ingest(&self, owner: &Owner, filename: &str, raw: Bytes) -> Result<FullView> {
        let owner_for_parse = owner.clone();
        let name = filename.to_string();
        let new = tokio::task::spawn_blocking(move || {
            let hash = source_hash(&raw);
            let table = Table::from_csv(&raw)?;
            prepare(&owner_for_parse, &name, hash, table)
        })
        .await
        .map_err(|e| EquipmentError::storage(format!("ingest task failed: {e}")))??;

        let dataset = self.store.insert(new).await?;
        info!(
            owner=%owner.id,
            dataset_id=%dataset.record.id,
            rows=dataset.record.summary.total_count,
            "ingest: dataset created"
        );

        if let Err(e) = self.retention.enforce(self.store.as_ref(), &owner.id).await {
            warn!(owner=%owner.id, "retention: could not list history: {e}");
        }

        Ok(full(&dataset))
    }

    pub async fn fetch(&self, id: DatasetId, caller: Option<&str>) -> Result<FullView> {
        let dataset = self.store.get(id).await?;
        if let Some(caller) = caller {
            if caller != dataset.record.owner.id {
                match self.fetch_policy {
                    FetchPolicy::Advisory => {
                        debug!(dataset_id=%id, caller=%caller, owner=%dataset.record.owner.id, "fetch: cross-owner read");
                    }
                    FetchPolicy::Strict => return Err(EquipmentError::NotFound(id)),
                }
            }
        }
        Ok(full(&dataset))
    }

    pub async fn history(&self, owner_id: &str, limit: usize) -> Result<Vec<BriefView>> {
        let records = self.store.list_by_owner(owner_id, limit).await?;
        Ok(records.iter().map(brief).collect())
    }
}
