use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use tokio::sync::Mutex;
use trackflow_core::{ExpenseId, QueuedExpense};

use crate::{QueueStore, StoreError, check_version};

/// Ephemeral queue store. Nothing survives the process.
///
/// Also stands in for a restricted device in tests: [`with_quota`](Self::with_quota)
/// caps the number of records and [`set_available`](Self::set_available)
/// makes every operation fail as if storage were blocked.
#[derive(Debug, Default)]
pub struct MemoryStore {
    records: Mutex<Vec<QueuedExpense>>,
    quota: Option<usize>,
    unavailable: AtomicBool,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store that refuses new records once `limit` are held.
    pub fn with_quota(limit: usize) -> Self {
        Self {
            quota: Some(limit),
            ..Self::default()
        }
    }

    pub fn set_available(&self, available: bool) {
        self.unavailable.store(!available, Ordering::SeqCst);
    }

    fn ensure_available(&self) -> Result<(), StoreError> {
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable("storage access blocked".into()));
        }
        Ok(())
    }
}

#[async_trait]
impl QueueStore for MemoryStore {
    async fn enqueue(&self, record: &QueuedExpense) -> Result<(), StoreError> {
        self.ensure_available()?;
        check_version(record)?;
        let mut records = self.records.lock().await;
        if let Some(existing) = records.iter_mut().find(|r| r.id() == record.id()) {
            *existing = record.clone();
            return Ok(());
        }
        if let Some(limit) = self.quota {
            if records.len() >= limit {
                return Err(StoreError::QuotaExceeded(format!(
                    "record limit of {limit} reached"
                )));
            }
        }
        records.push(record.clone());
        Ok(())
    }

    async fn list_all(&self) -> Result<Vec<QueuedExpense>, StoreError> {
        self.ensure_available()?;
        Ok(self.records.lock().await.clone())
    }

    async fn remove(&self, id: ExpenseId) -> Result<(), StoreError> {
        self.ensure_available()?;
        self.records.lock().await.retain(|r| r.id() != id);
        Ok(())
    }

    async fn clear(&self) -> Result<(), StoreError> {
        self.ensure_available()?;
        self.records.lock().await.clear();
        Ok(())
    }

    async fn count(&self) -> Result<usize, StoreError> {
        self.ensure_available()?;
        Ok(self.records.lock().await.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{categories, record};

    #[tokio::test]
    async fn keeps_insertion_order() {
        let store = MemoryStore::new();
        for category in ["Travel", "Meals", "Hotel"] {
            store.enqueue(&record(category, 10.0)).await.unwrap();
        }
        let all = store.list_all().await.unwrap();
        assert_eq!(categories(&all), ["Travel", "Meals", "Hotel"]);
        assert_eq!(store.count().await.unwrap(), 3);
    }

    #[tokio::test]
    async fn enqueue_same_id_is_idempotent() {
        let store = MemoryStore::new();
        let a = record("Travel", 100.0);
        let b = record("Meals", 20.0);
        store.enqueue(&a).await.unwrap();
        store.enqueue(&b).await.unwrap();
        store.enqueue(&a).await.unwrap();

        let all = store.list_all().await.unwrap();
        assert_eq!(all.len(), 2);
        assert_eq!(all[0].id(), a.id());
    }

    #[tokio::test]
    async fn remove_absent_is_noop() {
        let store = MemoryStore::new();
        let a = record("Travel", 100.0);
        store.enqueue(&a).await.unwrap();
        store.remove(ExpenseId::new()).await.unwrap();
        assert_eq!(store.list_all().await.unwrap(), vec![a]);
    }

    #[tokio::test]
    async fn quota_rejects_new_but_allows_overwrite() {
        let store = MemoryStore::with_quota(1);
        let a = record("Travel", 100.0);
        store.enqueue(&a).await.unwrap();
        store.enqueue(&a).await.unwrap();
        let err = store.enqueue(&record("Meals", 20.0)).await.unwrap_err();
        assert!(matches!(err, StoreError::QuotaExceeded(_)));
    }

    #[tokio::test]
    async fn unavailable_store_errors() {
        let store = MemoryStore::new();
        store.set_available(false);
        let err = store.enqueue(&record("Travel", 1.0)).await.unwrap_err();
        assert!(matches!(err, StoreError::Unavailable(_)));
        store.set_available(true);
        assert_eq!(store.count().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn clear_empties_store() {
        let store = MemoryStore::new();
        store.enqueue(&record("Travel", 1.0)).await.unwrap();
        store.enqueue(&record("Meals", 2.0)).await.unwrap();
        store.clear().await.unwrap();
        assert!(store.list_all().await.unwrap().is_empty());
    }
}
