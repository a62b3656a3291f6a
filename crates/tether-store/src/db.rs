//! SQLite persistence layer (embedded, no external dependencies)
//!
//! One edge table per relation kind plus the target-entity tables
//! (`items`, `users`) carrying the denormalized counter columns. The
//! counter update is an atomic in-database delta so concurrent toggles
//! cannot lose updates.

use anyhow::{Context, Result as AnyResult};
use async_trait::async_trait;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::SqlitePool;
use std::sync::Arc;
use tether_core::{
    ActorDirectory, ActorId, CounterStore, Edge, EdgeStore, RelationKind, Result, TargetId,
    TetherError, ME_ALIAS,
};

pub struct Database {
    pool: Arc<SqlitePool>,
}

impl Database {
    pub async fn new(database_path: &str) -> AnyResult<Self> {
        Self::with_pool_size(database_path, 5).await
    }

    pub async fn from_config(config: &crate::config::StoreConfig) -> AnyResult<Self> {
        Self::with_pool_size(&config.database_path, config.max_connections).await
    }

    pub async fn with_pool_size(database_path: &str, max_connections: u32) -> AnyResult<Self> {
        tracing::info!("Opening SQLite database at: {}", database_path);

        if let Some(parent) = std::path::Path::new(database_path).parent() {
            tokio::fs::create_dir_all(parent).await.with_context(|| {
                format!("Failed to create database directory: {}", parent.display())
            })?;
        }

        let options = SqliteConnectOptions::new()
            .filename(database_path)
            .create_if_missing(true)
            .journal_mode(sqlx::sqlite::SqliteJournalMode::Wal)
            .synchronous(sqlx::sqlite::SqliteSynchronous::Normal);

        let pool = SqlitePoolOptions::new()
            .max_connections(max_connections)
            .connect_with(options)
            .await
            .with_context(|| {
                format!("Failed to connect to SQLite database at: {}", database_path)
            })?;

        Self::run_migrations(&pool)
            .await
            .context("Failed to run database migrations")?;

        tracing::info!("Database initialization complete");

        Ok(Self {
            pool: Arc::new(pool),
        })
    }

    async fn run_migrations(pool: &SqlitePool) -> AnyResult<()> {
        // Target entities. Counter columns are the denormalized mirrors
        // of the edge tables below; they start at zero and are only
        // written by the toggle coordinator.
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS items (
                id TEXT PRIMARY KEY,
                bookmark_count INTEGER NOT NULL DEFAULT 0,
                dislike_count INTEGER NOT NULL DEFAULT 0,
                created_at DATETIME DEFAULT CURRENT_TIMESTAMP
            )
            "#,
        )
        .execute(pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS users (
                id TEXT PRIMARY KEY,
                follower_count INTEGER NOT NULL DEFAULT 0,
                created_at DATETIME DEFAULT CURRENT_TIMESTAMP
            )
            "#,
        )
        .execute(pool)
        .await?;

        // Edge tables. The composite primary key enforces at most one
        // edge per (actor, target) pair.
        for kind in RelationKind::all() {
            sqlx::query(&format!(
                r#"
                CREATE TABLE IF NOT EXISTS {table} (
                    actor TEXT NOT NULL,
                    target TEXT NOT NULL,
                    created_at DATETIME DEFAULT CURRENT_TIMESTAMP,
                    PRIMARY KEY (actor, target)
                )
                "#,
                table = kind.edge_table()
            ))
            .execute(pool)
            .await?;

            sqlx::query(&format!(
                "CREATE INDEX IF NOT EXISTS idx_{table}_target ON {table} (target)",
                table = kind.edge_table()
            ))
            .execute(pool)
            .await?;
        }

        Ok(())
    }

    /// Edge store for one relation kind
    pub fn edge_store(&self, kind: RelationKind) -> SqliteEdgeStore {
        SqliteEdgeStore {
            pool: self.pool.clone(),
            kind,
        }
    }

    /// Counter store for one relation kind
    pub fn counter_store(&self, kind: RelationKind) -> SqliteCounterStore {
        SqliteCounterStore {
            pool: self.pool.clone(),
            kind,
        }
    }

    /// Actor existence oracle backed by the users table
    pub fn directory(&self) -> SqliteDirectory {
        SqliteDirectory {
            pool: self.pool.clone(),
        }
    }

    // Target-entity fixtures. Relationship toggling never creates the
    // entities it links; embedders (and tests) seed them here.

    pub async fn create_item(&self, id: Option<&str>) -> AnyResult<String> {
        let id = id
            .map(str::to_string)
            .unwrap_or_else(|| uuid::Uuid::new_v4().to_string());

        sqlx::query("INSERT INTO items (id) VALUES (?1)")
            .bind(&id)
            .execute(&*self.pool)
            .await?;

        Ok(id)
    }

    pub async fn create_user(&self, id: Option<&str>) -> AnyResult<String> {
        let id = id
            .map(str::to_string)
            .unwrap_or_else(|| uuid::Uuid::new_v4().to_string());

        sqlx::query("INSERT INTO users (id) VALUES (?1)")
            .bind(&id)
            .execute(&*self.pool)
            .await?;

        Ok(id)
    }

    pub async fn delete_item(&self, id: &str) -> AnyResult<()> {
        sqlx::query("DELETE FROM items WHERE id = ?1")
            .bind(id)
            .execute(&*self.pool)
            .await?;

        Ok(())
    }

    pub async fn delete_user(&self, id: &str) -> AnyResult<()> {
        sqlx::query("DELETE FROM users WHERE id = ?1")
            .bind(id)
            .execute(&*self.pool)
            .await?;

        Ok(())
    }
}

fn store_err(err: sqlx::Error) -> TetherError {
    TetherError::unavailable(err)
}

pub struct SqliteEdgeStore {
    pool: Arc<SqlitePool>,
    kind: RelationKind,
}

#[async_trait]
impl EdgeStore for SqliteEdgeStore {
    async fn exists(&self, actor: &ActorId, target: &TargetId) -> Result<bool> {
        let row: Option<i64> = sqlx::query_scalar(&format!(
            "SELECT 1 FROM {} WHERE actor = ?1 AND target = ?2",
            self.kind.edge_table()
        ))
        .bind(actor.as_str())
        .bind(target.as_str())
        .fetch_optional(&*self.pool)
        .await
        .map_err(store_err)?;

        Ok(row.is_some())
    }

    async fn count_by_target(&self, target: &TargetId) -> Result<u64> {
        let count: i64 = sqlx::query_scalar(&format!(
            "SELECT COUNT(*) FROM {} WHERE target = ?1",
            self.kind.edge_table()
        ))
        .bind(target.as_str())
        .fetch_one(&*self.pool)
        .await
        .map_err(store_err)?;

        Ok(count as u64)
    }

    async fn create(&self, actor: &ActorId, target: &TargetId) -> Result<Edge> {
        let result = sqlx::query(&format!(
            "INSERT INTO {} (actor, target) VALUES (?1, ?2)",
            self.kind.edge_table()
        ))
        .bind(actor.as_str())
        .bind(target.as_str())
        .execute(&*self.pool)
        .await;

        match result {
            Ok(_) => Ok(Edge::new(actor.clone(), target.clone())),
            Err(sqlx::Error::Database(db))
                if matches!(db.kind(), sqlx::error::ErrorKind::UniqueViolation) =>
            {
                Err(TetherError::DuplicateEdge)
            }
            Err(err) => Err(store_err(err)),
        }
    }

    async fn remove(&self, actor: &ActorId, target: &TargetId) -> Result<bool> {
        let result = sqlx::query(&format!(
            "DELETE FROM {} WHERE actor = ?1 AND target = ?2",
            self.kind.edge_table()
        ))
        .bind(actor.as_str())
        .bind(target.as_str())
        .execute(&*self.pool)
        .await
        .map_err(store_err)?;

        Ok(result.rows_affected() > 0)
    }

    async fn list_by_actor(&self, actor: &ActorId) -> Result<Vec<Edge>> {
        let rows: Vec<(String, String)> = sqlx::query_as(&format!(
            "SELECT actor, target FROM {} WHERE actor = ?1 ORDER BY created_at DESC",
            self.kind.edge_table()
        ))
        .bind(actor.as_str())
        .fetch_all(&*self.pool)
        .await
        .map_err(store_err)?;

        Ok(rows
            .into_iter()
            .map(|(actor, target)| Edge::new(ActorId(actor), TargetId(target)))
            .collect())
    }

    async fn list_by_target(&self, target: &TargetId) -> Result<Vec<Edge>> {
        let rows: Vec<(String, String)> = sqlx::query_as(&format!(
            "SELECT actor, target FROM {} WHERE target = ?1 ORDER BY created_at DESC",
            self.kind.edge_table()
        ))
        .bind(target.as_str())
        .fetch_all(&*self.pool)
        .await
        .map_err(store_err)?;

        Ok(rows
            .into_iter()
            .map(|(actor, target)| Edge::new(ActorId(actor), TargetId(target)))
            .collect())
    }
}

pub struct SqliteCounterStore {
    pool: Arc<SqlitePool>,
    kind: RelationKind,
}

#[async_trait]
impl CounterStore for SqliteCounterStore {
    async fn read_count(&self, target: &TargetId) -> Result<u64> {
        let count: Option<i64> = sqlx::query_scalar(&format!(
            "SELECT {col} FROM {table} WHERE id = ?1",
            col = self.kind.counter_column(),
            table = self.kind.target_table()
        ))
        .bind(target.as_str())
        .fetch_optional(&*self.pool)
        .await
        .map_err(store_err)?;

        count
            .map(|c| c.max(0) as u64)
            .ok_or_else(|| TetherError::TargetNotFound(target.clone()))
    }

    async fn write_count(&self, target: &TargetId, value: u64) -> Result<()> {
        let result = sqlx::query(&format!(
            "UPDATE {table} SET {col} = ?1 WHERE id = ?2",
            col = self.kind.counter_column(),
            table = self.kind.target_table()
        ))
        .bind(value as i64)
        .bind(target.as_str())
        .execute(&*self.pool)
        .await
        .map_err(store_err)?;

        if result.rows_affected() == 0 {
            return Err(TetherError::TargetNotFound(target.clone()));
        }

        Ok(())
    }

    async fn apply_delta(&self, target: &TargetId, delta: i64) -> Result<u64> {
        // Single in-database read-modify-write, floored at zero. Two
        // concurrent deltas on the same row serialize inside SQLite.
        let count: Option<i64> = sqlx::query_scalar(&format!(
            "UPDATE {table} SET {col} = MAX({col} + ?1, 0) WHERE id = ?2 RETURNING {col}",
            col = self.kind.counter_column(),
            table = self.kind.target_table()
        ))
        .bind(delta)
        .bind(target.as_str())
        .fetch_optional(&*self.pool)
        .await
        .map_err(store_err)?;

        count
            .map(|c| c.max(0) as u64)
            .ok_or_else(|| TetherError::TargetNotFound(target.clone()))
    }
}

pub struct SqliteDirectory {
    pool: Arc<SqlitePool>,
}

#[async_trait]
impl ActorDirectory for SqliteDirectory {
    async fn resolve(&self, raw: &str, current: Option<&ActorId>) -> Result<ActorId> {
        if raw == ME_ALIAS {
            return current
                .cloned()
                .ok_or_else(|| TetherError::ActorNotFound(raw.to_string()));
        }

        let row: Option<i64> = sqlx::query_scalar("SELECT 1 FROM users WHERE id = ?1")
            .bind(raw)
            .fetch_optional(&*self.pool)
            .await
            .map_err(store_err)?;

        match row {
            Some(_) => Ok(ActorId::new(raw)),
            None => Err(TetherError::ActorNotFound(raw.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn test_db() -> (tempfile::TempDir, Database) {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("tether.db");
        let db = Database::new(path.to_str().unwrap()).await.unwrap();
        (dir, db)
    }

    #[tokio::test]
    async fn test_edge_uniqueness_enforced() {
        let (_dir, db) = test_db().await;
        let edges = db.edge_store(RelationKind::Bookmark);
        let alice = ActorId::new("alice");
        let item = TargetId::new("item-1");

        edges.create(&alice, &item).await.unwrap();
        let err = edges.create(&alice, &item).await.unwrap_err();
        assert!(matches!(err, TetherError::DuplicateEdge));
        assert_eq!(edges.count_by_target(&item).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_remove_is_noop_when_absent() {
        let (_dir, db) = test_db().await;
        let edges = db.edge_store(RelationKind::Follow);
        let alice = ActorId::new("alice");
        let bob = TargetId::new("bob");

        assert!(!edges.remove(&alice, &bob).await.unwrap());
        edges.create(&alice, &bob).await.unwrap();
        assert!(edges.remove(&alice, &bob).await.unwrap());
        assert!(!edges.exists(&alice, &bob).await.unwrap());
    }

    #[tokio::test]
    async fn test_kinds_are_isolated() {
        let (_dir, db) = test_db().await;
        let alice = ActorId::new("alice");
        let item = TargetId::new("item-1");

        db.edge_store(RelationKind::Bookmark)
            .create(&alice, &item)
            .await
            .unwrap();

        assert!(!db
            .edge_store(RelationKind::Dislike)
            .exists(&alice, &item)
            .await
            .unwrap());
    }

    #[tokio::test]
    async fn test_counter_delta_atomic_floor() {
        let (_dir, db) = test_db().await;
        let counters = db.counter_store(RelationKind::Bookmark);
        let id = db.create_item(Some("item-1")).await.unwrap();
        let item = TargetId::new(id);

        assert_eq!(counters.read_count(&item).await.unwrap(), 0);
        assert_eq!(counters.apply_delta(&item, 1).await.unwrap(), 1);
        assert_eq!(counters.apply_delta(&item, 1).await.unwrap(), 2);
        // Floored at zero
        assert_eq!(counters.apply_delta(&item, -5).await.unwrap(), 0);

        counters.write_count(&item, 9).await.unwrap();
        assert_eq!(counters.read_count(&item).await.unwrap(), 9);
    }

    #[tokio::test]
    async fn test_counter_missing_target() {
        let (_dir, db) = test_db().await;
        let counters = db.counter_store(RelationKind::Follow);
        let ghost = TargetId::new("ghost");

        assert!(matches!(
            counters.read_count(&ghost).await.unwrap_err(),
            TetherError::TargetNotFound(_)
        ));
        assert!(matches!(
            counters.apply_delta(&ghost, 1).await.unwrap_err(),
            TetherError::TargetNotFound(_)
        ));
        assert!(matches!(
            counters.write_count(&ghost, 1).await.unwrap_err(),
            TetherError::TargetNotFound(_)
        ));
    }

    #[tokio::test]
    async fn test_directory_resolution() {
        let (_dir, db) = test_db().await;
        let directory = db.directory();
        let id = db.create_user(None).await.unwrap();
        let alice = ActorId::new(id.clone());

        assert_eq!(directory.resolve(&id, None).await.unwrap(), alice);
        assert_eq!(directory.resolve("me", Some(&alice)).await.unwrap(), alice);
        assert!(matches!(
            directory.resolve("me", None).await.unwrap_err(),
            TetherError::ActorNotFound(_)
        ));
        assert!(matches!(
            directory.resolve("ghost", None).await.unwrap_err(),
            TetherError::ActorNotFound(_)
        ));
    }
}
