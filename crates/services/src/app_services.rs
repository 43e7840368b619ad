use std::sync::Arc;

use storage::repository::Storage;
use storage::sqlite::SqliteOptions;

use crate::Clock;
use crate::catalog::CatalogShapeResolver;
use crate::config::ProgressConfig;
use crate::error::AppServicesError;
use crate::progress_service::ProgressService;

/// Assembles app-facing services over one storage backend.
#[derive(Clone)]
pub struct AppServices {
    progress: Arc<ProgressService>,
}

impl AppServices {
    /// Build services backed by `SQLite` storage. `SQLite` lock waits are
    /// bounded by the configured store timeout.
    ///
    /// # Errors
    ///
    /// Returns `AppServicesError` if storage initialization fails.
    pub async fn new_sqlite(
        db_url: &str,
        clock: Clock,
        catalog: Arc<dyn CatalogShapeResolver>,
        config: ProgressConfig,
    ) -> Result<Self, AppServicesError> {
        let storage =
            Storage::sqlite(db_url, SqliteOptions::bounded_by(config.store_timeout())).await?;
        Ok(Self::from_storage(&storage, clock, catalog, config))
    }

    /// Build services over an already-constructed storage bundle.
    #[must_use]
    pub fn from_storage(
        storage: &Storage,
        clock: Clock,
        catalog: Arc<dyn CatalogShapeResolver>,
        config: ProgressConfig,
    ) -> Self {
        let progress = Arc::new(ProgressService::with_config(
            clock,
            Arc::clone(&storage.progress),
            catalog,
            config,
        ));
        Self { progress }
    }

    #[must_use]
    pub fn progress(&self) -> Arc<ProgressService> {
        Arc::clone(&self.progress)
    }
}
