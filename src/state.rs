use std::sync::Arc;

use tracing::{info, warn};

use crate::{
    config::AppConfig,
    store::{Document, DocumentStore, MemoryStore, PgStore, Repo},
};

#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn DocumentStore>,
    pub config: Arc<AppConfig>,
}

impl AppState {
    /// Reads the environment and opens the document store. Without
    /// `DATABASE_URL` the data lives in memory for the life of the process.
    pub async fn init() -> anyhow::Result<Self> {
        let config = Arc::new(AppConfig::from_env()?);

        let store: Arc<dyn DocumentStore> = match &config.database_url {
            Some(url) => {
                let pg = PgStore::connect(url).await?;
                if let Err(e) = pg.migrate().await {
                    warn!(error = %e, "migration failed; continuing");
                }
                info!("using postgres document store");
                Arc::new(pg)
            }
            None => {
                warn!("DATABASE_URL not set; using in-memory document store");
                Arc::new(MemoryStore::new())
            }
        };

        Ok(Self { store, config })
    }

    pub fn from_parts(store: Arc<dyn DocumentStore>, config: Arc<AppConfig>) -> Self {
        Self { store, config }
    }

    pub fn in_memory(config: AppConfig) -> Self {
        Self::from_parts(Arc::new(MemoryStore::new()), Arc::new(config))
    }

    pub fn repo<T: Document>(&self) -> Repo<T> {
        Repo::new(self.store.clone())
    }
}
