//! Configuration surface for opening a filesystem: where the database file
//! lives, chunking, caching, pool sizing, and the `atime` update policy.
//! A builder, not a struct-literal, since most fields have sane defaults
//! and only `path`/`id` is ever mandatory.

use std::path::PathBuf;
use std::time::Duration;

use agentfs_types::error::{FsError, Result};
use agentfs_types::types::DEFAULT_CHUNK_SIZE;

/// Whether `atime` is bumped on every read or left untouched.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AtimePolicy {
    /// Update `atime` on every `read`/`readdir`. The default: an agent
    /// filesystem is read-heavy within a session, and a stale `atime` is
    /// more surprising than the extra write it costs.
    Always,
    /// Never update `atime` after creation.
    Never,
}

impl Default for AtimePolicy {
    fn default() -> Self {
        AtimePolicy::Always
    }
}

/// Path cache tuning knobs.
#[derive(Debug, Clone)]
pub struct CacheConfig {
    /// Whether the path cache is consulted at all. Default: off, matching
    /// the distilled spec's own stated default.
    pub enabled: bool,
    /// Maximum number of cached path -> inode entries.
    pub max_entries: usize,
    /// Entry lifetime. `None` means entries never expire on their own.
    pub ttl: Option<Duration>,
}

impl Default for CacheConfig {
    fn default() -> Self {
        CacheConfig {
            enabled: false,
            max_entries: 10_000,
            ttl: None,
        }
    }
}

/// Connection pool tuning knobs, mapped directly onto `r2d2::Builder`.
#[derive(Debug, Clone, Default)]
pub struct PoolConfig {
    /// Maximum number of open connections. `None` lets `r2d2` pick its
    /// default.
    pub max_open: Option<u32>,
    /// Maximum number of idle connections kept around between uses.
    pub max_idle: Option<u32>,
    /// Maximum lifetime of a single connection before it is recycled.
    pub conn_max_lifetime: Option<Duration>,
    /// Maximum time a connection may sit idle before being recycled.
    pub conn_max_idle_time: Option<Duration>,
}

/// Where the database file for a filesystem instance lives.
#[derive(Debug, Clone)]
pub enum Location {
    /// An explicit path to the database file.
    Path(PathBuf),
    /// An agent identifier, resolved to `<home>/.agentfs/<id>.db`.
    Id(String),
}

/// Full configuration for opening a [`crate::facade::Filesystem`].
#[derive(Debug, Clone)]
pub struct Config {
    location: Location,
    chunk_size: u64,
    cache: CacheConfig,
    pool: PoolConfig,
    atime_policy: AtimePolicy,
}

impl Config {
    /// Start building a configuration rooted at an explicit database path.
    pub fn with_path(path: impl Into<PathBuf>) -> ConfigBuilder {
        ConfigBuilder::new(Location::Path(path.into()))
    }

    /// Start building a configuration rooted at an agent identifier,
    /// resolved to `<home>/.agentfs/<id>.db`. Validated against
    /// `^[A-Za-z0-9_-]+$` at build time.
    pub fn with_id(id: impl Into<String>) -> ConfigBuilder {
        ConfigBuilder::new(Location::Id(id.into()))
    }

    /// Resolve this configuration's location to a concrete file path,
    /// creating the parent directory (mode `0o755`) if absent.
    pub fn resolve_path(&self) -> Result<PathBuf> {
        let path = match &self.location {
            Location::Path(p) => p.clone(),
            Location::Id(id) => {
                let home = dirs::home_dir()
                    .ok_or_else(|| FsError::Invalid("no home directory to resolve agent id against"))?;
                home.join(".agentfs").join(format!("{id}.db"))
            }
        };
        if let Some(parent) = path.parent() {
            create_dir_all_0755(parent)?;
        }
        Ok(path)
    }

    /// Chunk size to use only if the database has never been initialized.
    pub fn chunk_size(&self) -> u64 {
        self.chunk_size
    }

    /// Path cache tuning.
    pub fn cache(&self) -> &CacheConfig {
        &self.cache
    }

    /// Connection pool tuning.
    pub fn pool(&self) -> &PoolConfig {
        &self.pool
    }

    /// Configured `atime` update policy.
    pub fn atime_policy(&self) -> AtimePolicy {
        self.atime_policy
    }
}

#[cfg(unix)]
fn create_dir_all_0755(dir: &std::path::Path) -> Result<()> {
    use std::os::unix::fs::DirBuilderExt;
    std::fs::DirBuilder::new()
        .recursive(true)
        .mode(0o755)
        .create(dir)?;
    Ok(())
}

#[cfg(not(unix))]
fn create_dir_all_0755(dir: &std::path::Path) -> Result<()> {
    std::fs::create_dir_all(dir)?;
    Ok(())
}

/// Builder for [`Config`]. Obtained from [`Config::with_path`] or
/// [`Config::with_id`].
#[derive(Debug, Clone)]
pub struct ConfigBuilder {
    location: Location,
    chunk_size: u64,
    cache: CacheConfig,
    pool: PoolConfig,
    atime_policy: AtimePolicy,
}

impl ConfigBuilder {
    fn new(location: Location) -> Self {
        ConfigBuilder {
            location,
            chunk_size: DEFAULT_CHUNK_SIZE,
            cache: CacheConfig::default(),
            pool: PoolConfig::default(),
            atime_policy: AtimePolicy::default(),
        }
    }

    /// Override the chunk size used only at first initialization; ignored
    /// once the database already records one.
    pub fn chunk_size(mut self, chunk_size: u64) -> Self {
        self.chunk_size = chunk_size;
        self
    }

    /// Enable the path cache with the given bound and optional TTL.
    pub fn cache(mut self, cache: CacheConfig) -> Self {
        self.cache = cache;
        self
    }

    /// Override connection pool sizing.
    pub fn pool(mut self, pool: PoolConfig) -> Self {
        self.pool = pool;
        self
    }

    /// Override the `atime` update policy.
    pub fn atime_policy(mut self, policy: AtimePolicy) -> Self {
        self.atime_policy = policy;
        self
    }

    /// Validate and finalize the configuration.
    pub fn build(self) -> Result<Config> {
        if let Location::Id(id) = &self.location {
            let valid = !id.is_empty()
                && id
                    .chars()
                    .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-');
            if !valid {
                return Err(FsError::Invalid(
                    "agent id must match ^[A-Za-z0-9_-]+$",
                ));
            }
        }
        if self.chunk_size == 0 {
            return Err(FsError::Invalid("chunk_size must be positive"));
        }
        Ok(Config {
            location: self.location,
            chunk_size: self.chunk_size,
            cache: self.cache,
            pool: self.pool,
            atime_policy: self.atime_policy,
        })
    }
}
