//! Application bootstrap: pick the book store, register modules and drive
//! the kernel lifecycle around the HTTP server.

use std::sync::Arc;

use anyhow::Context;
use axum::Router;

use bookshelf_authz::TokenAuthority;
use bookshelf_db::Pool;
use bookshelf_kernel::settings::{Settings, StoreBackend};
use bookshelf_kernel::{InitCtx, ModuleRegistry};

use crate::modules::{
    self,
    books::{BookStore, MemoryBookStore, SqliteBookStore},
};

/// A fully registered set of modules plus the resources they share.
pub struct Application {
    settings: Settings,
    registry: ModuleRegistry,
    pool: Option<Pool>,
}

impl Application {
    /// Open the configured store and register every module over it.
    pub async fn build(settings: Settings) -> anyhow::Result<Self> {
        let mut registry = ModuleRegistry::new();

        let (store, pool): (Arc<dyn BookStore>, Option<Pool>) = match settings.database.backend {
            StoreBackend::Memory => {
                tracing::info!("using in-memory book store");
                (Arc::new(MemoryBookStore::new()), None)
            }
            StoreBackend::Sqlite => {
                let pool = bookshelf_db::connect(&settings.database).await?;
                registry.register_core(bookshelf_db::create_module(pool.clone()));
                (Arc::new(SqliteBookStore::new(pool.clone())), Some(pool))
            }
        };

        let authority = Arc::new(TokenAuthority::from_settings(&settings.auth));
        modules::register_all(&mut registry, store, authority);

        tracing::info!(
            core = registry.core_module_count(),
            custom = registry.custom_module_count(),
            "modules registered"
        );

        Ok(Self {
            settings,
            registry,
            pool,
        })
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn registry(&self) -> &ModuleRegistry {
        &self.registry
    }

    pub fn router(&self) -> Router {
        bookshelf_http::build_router(&self.registry, &self.settings)
    }

    /// Apply outstanding migrations. A memory-backed application has no
    /// schema and applies nothing.
    pub async fn migrate(&self) -> anyhow::Result<usize> {
        let Some(pool) = &self.pool else {
            tracing::debug!("no database configured; skipping migrations");
            return Ok(0);
        };

        let migrations = self.registry.collect_migrations();
        let applied = bookshelf_db::run_migrations(pool, &migrations).await?;
        tracing::info!(applied, total = migrations.len(), "migrations complete");
        Ok(applied)
    }

    /// Init every module, migrate, then start them: core before custom.
    pub async fn start(&self) -> anyhow::Result<()> {
        let ctx = InitCtx {
            settings: &self.settings,
        };

        self.registry.init_core_modules(&ctx).await?;
        self.registry.init_custom_modules(&ctx).await?;
        self.migrate().await?;
        self.registry.start_core_modules(&ctx).await?;
        self.registry.start_custom_modules(&ctx).await?;
        Ok(())
    }

    /// Stop custom modules, then core modules.
    pub async fn stop(&self) -> anyhow::Result<()> {
        self.registry.stop_custom_modules().await?;
        self.registry.stop_core_modules().await?;
        Ok(())
    }
}

/// Build, start and serve until shutdown is signalled.
pub async fn run(settings: Settings) -> anyhow::Result<()> {
    let app = Application::build(settings)
        .await
        .context("failed to build application")?;
    app.start().await.context("failed to start modules")?;

    let served = bookshelf_http::start_server(&app.registry, &app.settings).await;

    if let Err(err) = app.stop().await {
        tracing::error!(error = %err, "module shutdown failed");
    }
    served
}
