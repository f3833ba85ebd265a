//! DuckDB-backed queue store.

use std::path::Path;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use duckdb::{Connection, params};
use tracing::{info, warn};
use trackflow_core::expense::QUEUED_EXPENSE_VERSION;
use trackflow_core::{ExpenseId, QueuedExpense};

use crate::{QueueStore, StoreError, check_version};

const SCHEMA: &str = "
    CREATE SEQUENCE IF NOT EXISTS pending_expenses_seq;
    CREATE TABLE IF NOT EXISTS pending_expenses (
        id      VARCHAR PRIMARY KEY,
        seq     BIGINT NOT NULL DEFAULT nextval('pending_expenses_seq'),
        version INTEGER NOT NULL,
        body    VARCHAR NOT NULL
    );
";

/// DuckDB store for the offline queue.
///
/// One row per queued expense in `pending_expenses`; `seq` comes from a
/// sequence so rows come back in insertion order, and an upsert on `id`
/// keeps the original `seq`. Queries run on the blocking thread pool.
///
/// Use [`open`](Self::open) for in-memory and [`open_persistent`](Self::open_persistent)
/// for file-backed storage that survives across process restarts.
pub struct DuckStore {
    conn: Arc<Mutex<Connection>>,
}

impl DuckStore {
    /// Open an in-memory DuckDB database.
    pub fn open() -> Result<Self, StoreError> {
        Self::init(Connection::open_in_memory()?)
    }

    /// Open or create a persistent DuckDB database at the given path.
    pub fn open_persistent(path: &Path) -> Result<Self, StoreError> {
        let store = Self::init(Connection::open(path)?)?;
        info!(path = %path.display(), "opened offline queue database");
        Ok(store)
    }

    fn init(conn: Connection) -> Result<Self, StoreError> {
        conn.execute_batch(SCHEMA)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    async fn with_conn<T, F>(&self, f: F) -> Result<T, StoreError>
    where
        F: FnOnce(&Connection) -> Result<T, StoreError> + Send + 'static,
        T: Send + 'static,
    {
        let conn = Arc::clone(&self.conn);
        tokio::task::spawn_blocking(move || {
            let conn = conn
                .lock()
                .map_err(|_| StoreError::Other("duckdb connection lock poisoned".into()))?;
            f(&conn)
        })
        .await
        .map_err(|e| StoreError::Other(format!("duckdb task failed: {e}")))?
    }
}

#[async_trait]
impl QueueStore for DuckStore {
    async fn enqueue(&self, record: &QueuedExpense) -> Result<(), StoreError> {
        check_version(record)?;
        let id = record.id().to_string();
        let version = record.version();
        let body = serde_json::to_string(record)?;
        self.with_conn(move |conn| {
            conn.execute(
                "INSERT INTO pending_expenses (id, version, body) VALUES (?, ?, ?)
                 ON CONFLICT (id) DO UPDATE SET version = excluded.version, body = excluded.body",
                params![id, version, body],
            )?;
            Ok(())
        })
        .await
    }

    async fn list_all(&self) -> Result<Vec<QueuedExpense>, StoreError> {
        let bodies = self
            .with_conn(|conn| {
                let mut stmt = conn.prepare("SELECT body FROM pending_expenses ORDER BY seq")?;
                let bodies = stmt
                    .query_map([], |row| row.get::<_, String>(0))?
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(bodies)
            })
            .await?;

        let mut records = Vec::with_capacity(bodies.len());
        for body in &bodies {
            let record: QueuedExpense = serde_json::from_str(body)?;
            match check_version(&record) {
                Ok(()) => records.push(record),
                Err(e) => warn!(error = %e, "skipping record"),
            }
        }
        Ok(records)
    }

    async fn remove(&self, id: ExpenseId) -> Result<(), StoreError> {
        let id = id.to_string();
        self.with_conn(move |conn| {
            conn.execute("DELETE FROM pending_expenses WHERE id = ?", params![id])?;
            Ok(())
        })
        .await
    }

    async fn clear(&self) -> Result<(), StoreError> {
        self.with_conn(|conn| {
            conn.execute_batch("DELETE FROM pending_expenses")?;
            Ok(())
        })
        .await
    }

    async fn count(&self) -> Result<usize, StoreError> {
        let count: i64 = self
            .with_conn(|conn| {
                Ok(conn.query_row(
                    "SELECT count(*)::BIGINT FROM pending_expenses WHERE version <= ?",
                    params![QUEUED_EXPENSE_VERSION],
                    |row| row.get(0),
                )?)
            })
            .await?;
        Ok(count as usize)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{categories, record};

    #[tokio::test]
    async fn in_memory_round_trip_in_order() {
        let store = DuckStore::open().unwrap();
        let a = record("Travel", 100.0);
        let b = record("Meals", 20.0);
        store.enqueue(&a).await.unwrap();
        store.enqueue(&b).await.unwrap();
        store.enqueue(&a).await.unwrap();

        let all = store.list_all().await.unwrap();
        assert_eq!(categories(&all), ["Travel", "Meals"]);
        assert_eq!(store.count().await.unwrap(), 2);
    }

    #[tokio::test]
    async fn remove_absent_is_noop() {
        let store = DuckStore::open().unwrap();
        let a = record("Travel", 100.0);
        store.enqueue(&a).await.unwrap();
        store.remove(ExpenseId::new()).await.unwrap();
        assert_eq!(store.list_all().await.unwrap(), vec![a]);
    }

    #[tokio::test]
    async fn newer_schema_version_is_skipped() {
        let store = DuckStore::open().unwrap();
        let a = record("Travel", 1.0);
        let mut json = serde_json::to_value(&a).unwrap();
        json["version"] = serde_json::json!(99);
        let body = json.to_string();
        let id = a.id().to_string();
        store
            .with_conn(move |conn| {
                conn.execute(
                    "INSERT INTO pending_expenses (id, version, body) VALUES (?, 99, ?)",
                    params![id, body],
                )?;
                Ok(())
            })
            .await
            .unwrap();
        let b = record("Meals", 2.0);
        store.enqueue(&b).await.unwrap();

        assert_eq!(store.list_all().await.unwrap(), vec![b]);
        assert_eq!(store.count().await.unwrap(), 1);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn persistent_survives_reopen() {
        let tmp = tempfile::TempDir::new().unwrap();
        let db_path = tmp.path().join("queue.duckdb");
        let a = record("Travel", 100.0);

        let store = DuckStore::open_persistent(&db_path).unwrap();
        store.enqueue(&a).await.unwrap();
        drop(store);

        let store = DuckStore::open_persistent(&db_path).unwrap();
        assert_eq!(store.list_all().await.unwrap(), vec![a]);
        store.clear().await.unwrap();
        assert_eq!(store.count().await.unwrap(), 0);
    }
}
