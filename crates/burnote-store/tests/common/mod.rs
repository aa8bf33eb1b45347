#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use burnote_store::{KdfParams, ManualClock, MasterKey, SecretStore, StoreConfig};

/// Cheap KDF settings so tests stay fast.
pub fn fast_kdf() -> KdfParams {
    KdfParams::new(256, 1, 1)
}

pub fn config(sweep_interval: Option<Duration>) -> StoreConfig {
    let mut config = StoreConfig::new(MasterKey::new("integration-master-key").unwrap());
    config.sweep_interval = sweep_interval;
    config.kdf = fast_kdf();
    config
}

pub fn store_with_clock(sweep_interval: Option<Duration>) -> (SecretStore, Arc<ManualClock>) {
    let clock = Arc::new(ManualClock::default());
    let store = SecretStore::open_with_clock(config(sweep_interval), clock.clone()).unwrap();
    (store, clock)
}
