//! Connection pool setup, grounded directly on `hugefs`'s
//! `Filesystem::open`: an `r2d2` pool of `r2d2_sqlite::SqliteConnectionManager`
//! with `with_init` enabling foreign keys and WAL, then a schema migration
//! run once against a connection pulled from the pool.

use std::sync::Arc;

use r2d2_sqlite::SqliteConnectionManager;
use tracing::info;

use agentfs_types::error::Result;

use crate::config::{Config, PoolConfig};
use crate::schema;

/// A pooled connection handle shared by the filesystem facade, the KV
/// store, and the tool-call log. Cheaply cloneable: cloning shares the
/// same underlying pool.
#[derive(Clone)]
pub struct Handle {
    pool: Arc<r2d2::Pool<SqliteConnectionManager>>,
}

impl Handle {
    /// Open (creating if absent) the database named by `config`, running
    /// schema migrations, and return a handle wrapping its connection pool.
    pub fn open(config: &Config) -> Result<Self> {
        let path = config.resolve_path()?;
        info!(path = %path.display(), "opening database");

        let manager = SqliteConnectionManager::file(&path).with_init(|c| {
            c.pragma_update(None, "foreign_keys", "1")?;
            c.pragma_update(Some(rusqlite::DatabaseName::Main), "journal_mode", "wal")?;
            Ok(())
        });

        let pool = build_pool(manager, config.pool())?;

        {
            let mut conn = pool.get()?;
            schema::migrate(&mut conn, config.chunk_size())?;
        }

        Ok(Handle { pool: Arc::new(pool) })
    }

    /// Acquire a pooled connection, blocking until one is available.
    pub fn get(&self) -> Result<r2d2::PooledConnection<SqliteConnectionManager>> {
        Ok(self.pool.get()?)
    }
}

fn build_pool(
    manager: SqliteConnectionManager,
    cfg: &PoolConfig,
) -> Result<r2d2::Pool<SqliteConnectionManager>> {
    let mut builder = r2d2::Pool::builder();
    if let Some(max_open) = cfg.max_open {
        builder = builder.max_size(max_open);
    }
    if let Some(max_idle) = cfg.max_idle {
        builder = builder.min_idle(Some(max_idle));
    }
    if let Some(lifetime) = cfg.conn_max_lifetime {
        builder = builder.max_lifetime(Some(lifetime));
    }
    if let Some(idle_timeout) = cfg.conn_max_idle_time {
        builder = builder.idle_timeout(Some(idle_timeout));
    }
    Ok(builder.build(manager)?)
}
