use tracing::{info, warn};

use crate::error::Result;
use crate::store::DatasetStore;

pub const DEFAULT_KEEP: usize = 5;

#[derive(Clone, Copy, Debug)]
pub struct RetentionPolicy {
    pub keep: usize,
}

impl Default for RetentionPolicy {
    fn default() -> Self {
        Self { keep: DEFAULT_KEEP }
    }
}

impl RetentionPolicy {
    pub fn new(keep: usize) -> Self {
        Self { keep }
    }

    /// Delete everything beyond the `keep` newest datasets of `owner_id`,
    /// oldest first. Returns how many were evicted.
    ///
    /// A failed delete is logged and skipped; only a failure to list the
    /// owner's history is returned as an error.
    pub async fn enforce(&self, store: &dyn DatasetStore, owner_id: &str) -> Result<usize> {
        let history = store.list_by_owner(owner_id, usize::MAX).await?;
        if history.len() <= self.keep {
            return Ok(0);
        }

        let mut evicted = 0;
        for record in history.iter().skip(self.keep).rev() {
            match store.delete(record.id).await {
                Ok(()) => {
                    evicted += 1;
                    info!(owner=%owner_id, dataset_id=%record.id, name=%record.name, "retention: evicted dataset");
                }
                Err(e) => {
                    warn!(owner=%owner_id, dataset_id=%record.id, "retention: delete failed: {e}");
                }
            }
        }
        Ok(evicted)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::Owner;
    use crate::store::MemoryStore;
    use crate::validator::Table;

    async fn ingest(store: &MemoryStore, owner: &str, name: &str) {
        let csv = "Equipment Name,Type,Flowrate,Pressure,Temperature\nP1,Pump,1,2,3\n";
        let table = Table::from_csv(csv.as_bytes()).unwrap();
        store.create(&Owner::named(owner), name, String::new(), table).await.unwrap();
    }

    #[tokio::test]
    async fn evicts_oldest_beyond_keep() {
        let store = MemoryStore::new();
        for i in 0..7 {
            ingest(&store, "alice", &format!("upload-{i}.csv")).await;
        }

        let evicted = RetentionPolicy::new(5).enforce(&store, "alice").await.unwrap();
        assert_eq!(evicted, 2);

        let names: Vec<_> = store
            .list_by_owner("alice", 100)
            .await
            .unwrap()
            .into_iter()
            .map(|r| r.name)
            .collect();
        assert_eq!(names, vec!["upload-6.csv", "upload-5.csv", "upload-4.csv", "upload-3.csv", "upload-2.csv"]);
    }

    #[tokio::test]
    async fn other_owners_are_untouched() {
        let store = MemoryStore::new();
        for _ in 0..3 {
            ingest(&store, "bob", "b.csv").await;
        }
        for _ in 0..3 {
            ingest(&store, "alice", "a.csv").await;
        }

        let evicted = RetentionPolicy::new(1).enforce(&store, "alice").await.unwrap();
        assert_eq!(evicted, 2);
        assert_eq!(store.list_by_owner("bob", 100).await.unwrap().len(), 3);
    }

    #[tokio::test]
    async fn under_limit_is_noop() {
        let store = MemoryStore::new();
        ingest(&store, "alice", "a.csv").await;
        assert_eq!(RetentionPolicy::default().enforce(&store, "alice").await.unwrap(), 0);
    }
}
