//! Ephemeral, read-once secret store.
//!
//! Payloads are encrypted at rest under a master key, optionally guarded by a
//! password, and destroyed on first successful retrieval or when their TTL
//! runs out. The store is in-memory only and lives as long as the process.

pub mod config;
pub mod error;
pub mod store;
mod sweeper;

pub use config::{MasterKey, StoreConfig, MAX_TTL_MINUTES};
pub use error::{Error, Result};
pub use store::{
    CipherEngine, Clock, ExistenceInfo, KdfParams, ManualClock, Plaintext, Retrieval,
    SecretStore, StoreStats, SystemClock,
};
