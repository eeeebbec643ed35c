//! SQLite connection factory, migration runner, and the `db` core module.

use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use async_trait::async_trait;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use sqlx::Executor;

use bookshelf_kernel::settings::DatabaseSettings;
use bookshelf_kernel::{InitCtx, Migration, Module};

pub use sqlx::sqlite::SqlitePool as Pool;

const LEDGER_TABLE: &str = "_bookshelf_migrations";

/// Open a pool for `settings.url`, creating the database file if needed.
///
/// In-memory databases live inside a single connection, so their pool is
/// pinned to one connection that is never recycled.
pub async fn connect(settings: &DatabaseSettings) -> anyhow::Result<SqlitePool> {
    let options = SqliteConnectOptions::from_str(&settings.url)
        .with_context(|| format!("invalid database url '{}'", settings.url))?
        .create_if_missing(true)
        .foreign_keys(true);

    let mut pool_options = SqlitePoolOptions::new()
        .acquire_timeout(Duration::from_millis(settings.acquire_timeout_ms));

    pool_options = if settings.is_in_memory() {
        pool_options
            .max_connections(1)
            .min_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
    } else {
        pool_options.max_connections(settings.max_connections.max(1))
    };

    let pool = pool_options
        .connect_with(options)
        .await
        .with_context(|| format!("failed to connect to '{}'", settings.url))?;

    tracing::info!(target: "bookshelf-db", url = %settings.url, "database pool ready");
    Ok(pool)
}

/// Apply every migration not yet recorded in the ledger table. Each
/// migration runs in its own transaction together with its ledger row.
///
/// Returns the number of migrations applied by this call.
pub async fn run_migrations(
    pool: &SqlitePool,
    migrations: &[(String, Migration)],
) -> anyhow::Result<usize> {
    let create_ledger = format!(
        "CREATE TABLE IF NOT EXISTS {LEDGER_TABLE} (
            module TEXT NOT NULL,
            id TEXT NOT NULL,
            applied_at TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP,
            PRIMARY KEY (module, id)
        )"
    );
    pool.execute(create_ledger.as_str())
        .await
        .context("failed to create migration ledger")?;

    let already_applied = format!("SELECT COUNT(*) FROM {LEDGER_TABLE} WHERE module = ? AND id = ?");
    let record_applied = format!("INSERT INTO {LEDGER_TABLE} (module, id) VALUES (?, ?)");

    let mut applied = 0;
    for (module, migration) in migrations {
        let seen: i64 = sqlx::query_scalar(&already_applied)
            .bind(module.as_str())
            .bind(migration.id)
            .fetch_one(pool)
            .await
            .with_context(|| format!("failed to read ledger for {}/{}", module, migration.id))?;
        if seen > 0 {
            continue;
        }

        let mut tx = pool.begin().await.context("failed to open transaction")?;
        (&mut *tx)
            .execute(migration.up)
            .await
            .with_context(|| format!("migration {}/{} failed", module, migration.id))?;
        sqlx::query(&record_applied)
            .bind(module.as_str())
            .bind(migration.id)
            .execute(&mut *tx)
            .await
            .with_context(|| format!("failed to record migration {}/{}", module, migration.id))?;
        tx.commit()
            .await
            .with_context(|| format!("failed to commit migration {}/{}", module, migration.id))?;

        tracing::info!(
            target: "bookshelf-db",
            module = %module,
            migration = migration.id,
            "migration applied"
        );
        applied += 1;
    }

    Ok(applied)
}

/// Core module owning the pool's lifecycle.
pub struct DatabaseModule {
    pool: SqlitePool,
}

impl DatabaseModule {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl Module for DatabaseModule {
    fn name(&self) -> &'static str {
        "db"
    }

    async fn init(&self, _ctx: &InitCtx<'_>) -> anyhow::Result<()> {
        sqlx::query("SELECT 1")
            .execute(&self.pool)
            .await
            .context("database is not reachable")?;
        tracing::info!(module = self.name(), "database reachable");
        Ok(())
    }

    async fn stop(&self) -> anyhow::Result<()> {
        self.pool.close().await;
        tracing::info!(module = self.name(), "database pool closed");
        Ok(())
    }
}

pub fn create_module(pool: SqlitePool) -> Arc<dyn Module> {
    Arc::new(DatabaseModule::new(pool))
}

#[cfg(test)]
mod tests {
    use super::*;
    use bookshelf_kernel::settings::Settings;

    fn shelf_migrations() -> Vec<(String, Migration)> {
        vec![
            (
                "shelf".to_string(),
                Migration {
                    id: "001_init",
                    up: "CREATE TABLE shelf (id INTEGER PRIMARY KEY, label TEXT NOT NULL);
                         CREATE INDEX shelf_label ON shelf (label);",
                },
            ),
            (
                "shelf".to_string(),
                Migration {
                    id: "002_seed",
                    up: "INSERT INTO shelf (label) VALUES ('fiction');",
                },
            ),
        ]
    }

    #[tokio::test]
    async fn in_memory_pool_keeps_state_between_queries() {
        let pool = connect(&DatabaseSettings::sqlite_in_memory()).await.unwrap();
        pool.execute("CREATE TABLE probe (n INTEGER)").await.unwrap();
        pool.execute("INSERT INTO probe VALUES (7)").await.unwrap();

        let n: i64 = sqlx::query_scalar("SELECT n FROM probe")
            .fetch_one(&pool)
            .await
            .unwrap();
        assert_eq!(n, 7);
    }

    #[tokio::test]
    async fn migrations_apply_once() {
        let pool = connect(&DatabaseSettings::sqlite_in_memory()).await.unwrap();
        let migrations = shelf_migrations();

        assert_eq!(run_migrations(&pool, &migrations).await.unwrap(), 2);
        assert_eq!(run_migrations(&pool, &migrations).await.unwrap(), 0);

        let rows: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM shelf")
            .fetch_one(&pool)
            .await
            .unwrap();
        assert_eq!(rows, 1);
    }

    #[tokio::test]
    async fn failed_migration_is_not_recorded() {
        let pool = connect(&DatabaseSettings::sqlite_in_memory()).await.unwrap();
        let broken = vec![(
            "shelf".to_string(),
            Migration {
                id: "001_broken",
                up: "CREATE TABLE shelf (id INTEGER); CREATE TABLE shelf (id INTEGER);",
            },
        )];

        let err = run_migrations(&pool, &broken).await.unwrap_err();
        assert_eq!(err.to_string(), "migration shelf/001_broken failed");

        let recorded: i64 = sqlx::query_scalar(&format!("SELECT COUNT(*) FROM {LEDGER_TABLE}"))
            .fetch_one(&pool)
            .await
            .unwrap();
        assert_eq!(recorded, 0);
    }

    #[tokio::test]
    async fn module_probes_and_closes_pool() {
        let pool = connect(&DatabaseSettings::sqlite_in_memory()).await.unwrap();
        let module = DatabaseModule::new(pool.clone());
        let settings = Settings::default();
        let ctx = InitCtx {
            settings: &settings,
        };

        module.init(&ctx).await.unwrap();
        module.stop().await.unwrap();
        assert!(pool.is_closed());
    }
}
