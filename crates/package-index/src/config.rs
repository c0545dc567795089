//! Index configuration.
//!
//! The deployed configuration file is JSON:
//!
//! ```text
//! {
//!   "nuget": { "packages": "/srv/packages", "makeReadonly": false, "debounceMs": 1000 },
//!   "cache": { "type": "lazy-ttl-cache", "duration": 86400 }
//! }
//! ```

use std::fmt;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use serde::Deserialize;

use crate::error::{io_error_at, IndexError, Result};

/// Default sliding expiration of the TTL cache (24 hours).
pub const DEFAULT_CACHE_DURATION_SECS: u64 = 24 * 3600;

/// Default delay between the last filesystem change and the rebuild.
pub const DEFAULT_DEBOUNCE: Duration = Duration::from_millis(1000);

/// How package content is held in memory.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CacheKind {
    #[default]
    EagerAll,
    LazyNoCache,
    LazyTtlCache,
}

impl CacheKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::EagerAll => "eager-all",
            Self::LazyNoCache => "lazy-no-cache",
            Self::LazyTtlCache => "lazy-ttl-cache",
        }
    }
}

impl fmt::Display for CacheKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for CacheKind {
    type Err = IndexError;

    fn from_str(value: &str) -> Result<Self> {
        let normalized = value.trim().to_ascii_lowercase();
        match normalized.as_str() {
            "eager-all" | "nocacheloadall" => Ok(Self::EagerAll),
            "lazy-no-cache" | "nocacheloadnothing" => Ok(Self::LazyNoCache),
            "lazy-ttl-cache" | "cache" => Ok(Self::LazyTtlCache),
            _ => Err(IndexError::Config(format!("unknown cache type {value:?}"))),
        }
    }
}

/// Content strategy selected once at startup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheStrategy {
    pub kind: CacheKind,
    /// Idle time after which a cached archive is dropped (TTL strategy only).
    pub sliding_expiration: Duration,
}

impl CacheStrategy {
    pub fn eager_all() -> Self {
        Self {
            kind: CacheKind::EagerAll,
            sliding_expiration: Duration::from_secs(DEFAULT_CACHE_DURATION_SECS),
        }
    }

    pub fn lazy_no_cache() -> Self {
        Self {
            kind: CacheKind::LazyNoCache,
            ..Self::eager_all()
        }
    }

    pub fn lazy_ttl_cache(sliding_expiration: Duration) -> Self {
        Self {
            kind: CacheKind::LazyTtlCache,
            sliding_expiration,
        }
    }
}

impl Default for CacheStrategy {
    fn default() -> Self {
        Self::eager_all()
    }
}

/// Everything the index needs from its environment.
#[derive(Debug, Clone)]
pub struct IndexConfig {
    /// Root directory scanned recursively for archives.
    pub packages: PathBuf,
    /// Mark every indexed archive read-only after a scan (Unix only).
    pub make_readonly: bool,
    pub cache: CacheStrategy,
    /// Quiet period after the last change before a rebuild runs.
    pub debounce: Duration,
    /// Whether to watch the root for changes at all.
    pub watch: bool,
}

impl IndexConfig {
    pub fn new(packages: impl Into<PathBuf>) -> Self {
        Self {
            packages: packages.into(),
            make_readonly: false,
            cache: CacheStrategy::default(),
            debounce: DEFAULT_DEBOUNCE,
            watch: true,
        }
    }

    pub fn with_cache(mut self, cache: CacheStrategy) -> Self {
        self.cache = cache;
        self
    }

    pub fn with_make_readonly(mut self, make_readonly: bool) -> Self {
        self.make_readonly = make_readonly;
        self
    }

    pub fn with_debounce(mut self, debounce: Duration) -> Self {
        self.debounce = debounce;
        self
    }

    pub fn with_watch(mut self, watch: bool) -> Self {
        self.watch = watch;
        self
    }

    /// Loads the configuration from a JSON file.
    ///
    /// A relative `packages` path is resolved against the file's directory.
    pub fn load(path: &Path) -> Result<Self> {
        let data = std::fs::read_to_string(path).map_err(|error| {
            IndexError::Config(format!(
                "failed to read configuration {}: {error}",
                path.display()
            ))
        })?;
        let mut config = Self::from_json(&data).map_err(|error| match error {
            IndexError::Config(message) => {
                IndexError::Config(format!("{}: {message}", path.display()))
            }
            other => other,
        })?;

        if config.packages.is_relative() {
            if let Some(base) = path.parent() {
                config.packages = base.join(&config.packages);
            }
        }
        Ok(config)
    }

    pub fn from_json(data: &str) -> Result<Self> {
        let file: ConfigFile = serde_json::from_str(data)
            .map_err(|error| IndexError::Config(format!("failed to parse configuration: {error}")))?;
        file.try_into()
    }

    /// Checks that the packages root is an existing directory.
    pub fn validate(&self) -> Result<()> {
        let metadata = std::fs::metadata(&self.packages).map_err(|error| match error.kind() {
            ErrorKind::NotFound => IndexError::PathNotFound(self.packages.clone()),
            _ => io_error_at("access packages root", &self.packages, error),
        })?;
        if !metadata.is_dir() {
            return Err(IndexError::InvalidInput(format!(
                "packages root is not a directory: {}",
                self.packages.display()
            )));
        }
        Ok(())
    }
}

#[derive(Debug, Deserialize)]
struct ConfigFile {
    nuget: NugetSection,
    #[serde(default)]
    cache: Option<CacheSection>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct NugetSection {
    packages: PathBuf,
    #[serde(default)]
    make_readonly: bool,
    #[serde(default)]
    debounce_ms: Option<u64>,
}

#[derive(Debug, Deserialize)]
struct CacheSection {
    #[serde(rename = "type")]
    kind: Option<String>,
    duration: Option<u64>,
}

impl TryFrom<ConfigFile> for IndexConfig {
    type Error = IndexError;

    fn try_from(file: ConfigFile) -> Result<Self> {
        let cache = match file.cache {
            Some(section) => {
                let kind = match section.kind.as_deref() {
                    Some(raw) => raw.parse()?,
                    None => CacheKind::default(),
                };
                CacheStrategy {
                    kind,
                    sliding_expiration: Duration::from_secs(
                        section.duration.unwrap_or(DEFAULT_CACHE_DURATION_SECS),
                    ),
                }
            }
            None => CacheStrategy::default(),
        };

        if file.nuget.packages.as_os_str().is_empty() {
            return Err(IndexError::Config("nuget.packages must not be empty".to_string()));
        }

        Ok(Self {
            packages: file.nuget.packages,
            make_readonly: file.nuget.make_readonly,
            cache,
            debounce: file
                .nuget
                .debounce_ms
                .map(Duration::from_millis)
                .unwrap_or(DEFAULT_DEBOUNCE),
            watch: true,
        })
    }
}
