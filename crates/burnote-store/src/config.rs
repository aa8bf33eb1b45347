use std::fmt;
use std::path::Path;
use std::time::Duration;

use tracing::warn;
use zeroize::{Zeroize, ZeroizeOnDrop};

use crate::error::{Error, Result};
use crate::store::crypto::KdfParams;

pub const ENV_MASTER_KEY: &str = "BURNOTE_MASTER_KEY";
pub const ENV_MASTER_KEY_FILE: &str = "BURNOTE_MASTER_KEY_FILE";
pub const ENV_SWEEP_INTERVAL_SECS: &str = "BURNOTE_SWEEP_INTERVAL_SECS";
pub const ENV_KDF_MEMORY_KIB: &str = "BURNOTE_KDF_MEMORY_KIB";
pub const ENV_KDF_ITERATIONS: &str = "BURNOTE_KDF_ITERATIONS";
pub const ENV_KDF_PARALLELISM: &str = "BURNOTE_KDF_PARALLELISM";

pub const DEFAULT_SWEEP_INTERVAL: Duration = Duration::from_secs(60);

/// TTL ceiling (seven days) for callers that accept TTLs from end users.
/// The store itself accepts any positive TTL.
pub const MAX_TTL_MINUTES: u64 = 10_080;

/// The process-wide master key. Wiped from memory on drop.
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct MasterKey(Vec<u8>);

impl MasterKey {
    pub fn new(key: impl Into<Vec<u8>>) -> Result<Self> {
        let key = key.into();
        if key.is_empty() {
            return Err(Error::InvalidInput("master key cannot be empty".into()));
        }
        Ok(Self(key))
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }
}

impl fmt::Debug for MasterKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("MasterKey([REDACTED])")
    }
}

/// Everything needed to open a [`crate::SecretStore`].
#[derive(Debug, Clone)]
pub struct StoreConfig {
    pub master_key: MasterKey,
    /// Interval of the background expiry sweep. `None` disables the sweeper;
    /// expired records are then only removed lazily or by `prune()`.
    pub sweep_interval: Option<Duration>,
    pub kdf: KdfParams,
}

impl StoreConfig {
    /// Default sweep interval and KDF cost around `master_key`.
    pub fn new(master_key: MasterKey) -> Self {
        Self {
            master_key,
            sweep_interval: Some(DEFAULT_SWEEP_INTERVAL),
            kdf: KdfParams::default(),
        }
    }

    /// Load configuration from the process environment.
    ///
    /// Fails when no master key is configured.
    pub fn from_env() -> Result<Self> {
        Self::from_vars(|name| std::env::var(name).ok())
    }

    /// Load configuration through an arbitrary variable lookup.
    pub fn from_vars<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::new(resolve_master_key(&lookup)?);

        if let Some(secs) = parse_var::<u64, _>(&lookup, ENV_SWEEP_INTERVAL_SECS)? {
            config.sweep_interval = (secs > 0).then_some(Duration::from_secs(secs));
        }

        if let Some(memory_kib) = parse_var(&lookup, ENV_KDF_MEMORY_KIB)? {
            config.kdf.memory_kib = memory_kib;
        }
        if let Some(iterations) = parse_var(&lookup, ENV_KDF_ITERATIONS)? {
            config.kdf.iterations = iterations;
        }
        if let Some(parallelism) = parse_var(&lookup, ENV_KDF_PARALLELISM)? {
            config.kdf.parallelism = parallelism;
        }

        Ok(config)
    }
}

/// Read a master key from a file, trimming surrounding whitespace.
/// Fails if the file cannot be read or is empty after trimming.
pub fn read_key_file(path: &Path) -> Result<MasterKey> {
    let content = std::fs::read_to_string(path)?;
    let key = content.trim();
    if key.is_empty() {
        return Err(Error::Config(format!(
            "key file is empty: {}",
            path.display()
        )));
    }
    MasterKey::new(key)
}

/// Resolve the master key from `BURNOTE_MASTER_KEY_FILE` (preferred) or
/// `BURNOTE_MASTER_KEY`.
fn resolve_master_key<F>(lookup: &F) -> Result<MasterKey>
where
    F: Fn(&str) -> Option<String>,
{
    if let Some(path) = lookup(ENV_MASTER_KEY_FILE) {
        let key = read_key_file(Path::new(&path)).map_err(|e| match e {
            Error::Io(io) => Error::Config(format!("read key file {path}: {io}")),
            other => other,
        })?;
        if lookup(ENV_MASTER_KEY).is_some() {
            warn!("both {ENV_MASTER_KEY} and {ENV_MASTER_KEY_FILE} are set; using file");
        }
        return Ok(key);
    }

    match lookup(ENV_MASTER_KEY) {
        Some(key) if !key.trim().is_empty() => MasterKey::new(key.trim()),
        _ => Err(Error::Config(format!(
            "{ENV_MASTER_KEY} or {ENV_MASTER_KEY_FILE} environment variable is required"
        ))),
    }
}

fn parse_var<T, F>(lookup: &F, name: &str) -> Result<Option<T>>
where
    T: std::str::FromStr,
    T::Err: fmt::Display,
    F: Fn(&str) -> Option<String>,
{
    match lookup(name) {
        None => Ok(None),
        Some(raw) => raw
            .trim()
            .parse()
            .map(Some)
            .map_err(|e| Error::Config(format!("{name}={raw:?}: {e}"))),
    }
}
