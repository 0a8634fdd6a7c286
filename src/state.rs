use std::sync::Arc;

use r2d2::Pool;
use r2d2_sqlite::SqliteConnectionManager;

use crate::auth::{CacheStore, JwtKeys, Mailer, MemoryCache};
use crate::config::Config;
use crate::media::MediaStore;

pub type DbPool = Pool<SqliteConnectionManager>;

#[derive(Clone)]
pub struct AppState {
    pub db: DbPool,
    pub config: Config,
    pub jwt: Arc<JwtKeys>,
    pub cache: Arc<dyn CacheStore>,
    pub mailer: Arc<dyn Mailer>,
    pub media: MediaStore,
}

impl AppState {
    /// Wire up shared collaborators. Verification codes live in an
    /// in-process cache.
    pub fn new(db: DbPool, config: Config, mailer: Arc<dyn Mailer>) -> Self {
        Self {
            jwt: Arc::new(JwtKeys::from_config(&config.auth)),
            cache: Arc::new(MemoryCache::new()),
            media: MediaStore::new(config.media_path()),
            mailer,
            db,
            config,
        }
    }
}
