//! Background expiry sweep.
//!
//! The task holds only a weak reference to the store, so it never keeps the
//! table alive on its own. It exits when told to stop, when its stop channel
//! is dropped along with the store, or when the store is gone at tick time.

use std::time::Duration;

use tokio::runtime::Handle;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{self, MissedTickBehavior};
use tracing::{debug, warn};

use crate::store::WeakSecretStore;

pub(crate) struct Sweeper {
    stop: watch::Sender<bool>,
    task: JoinHandle<()>,
}

impl Sweeper {
    pub(crate) fn spawn(runtime: &Handle, store: WeakSecretStore, interval: Duration) -> Self {
        let (stop, stop_rx) = watch::channel(false);
        let task = runtime.spawn(run(store, interval, stop_rx));
        Self { stop, task }
    }

    pub(crate) fn is_finished(&self) -> bool {
        self.task.is_finished()
    }

    /// Signal the task and wait for it to exit.
    pub(crate) async fn stop(self) {
        let _ = self.stop.send(true);
        if let Err(e) = self.task.await {
            if e.is_panic() {
                warn!(error = %e, "expiry sweeper panicked");
            }
        }
    }
}

async fn run(store: WeakSecretStore, interval: Duration, mut stop: watch::Receiver<bool>) {
    let mut ticker = time::interval(interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    ticker.tick().await; // skip first immediate tick

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                let Some(store) = store.upgrade() else {
                    break;
                };
                // Pruning can wait on a record lock held by a reader that is
                // running the KDF, so keep it off the async workers.
                match tokio::task::spawn_blocking(move || store.prune()).await {
                    Ok(removed) => debug!(removed, "expiry sweep complete"),
                    Err(e) => warn!(error = %e, "expiry sweep failed"),
                }
            }
            _ = stop.changed() => break,
        }
    }

    debug!("expiry sweeper exiting");
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::config::{MasterKey, StoreConfig};
    use crate::store::{KdfParams, ManualClock, SecretStore};

    const INTERVAL: Duration = Duration::from_secs(60);

    fn unswept_store() -> SecretStore {
        let mut config = StoreConfig::new(MasterKey::new("sweeper-key").unwrap());
        config.sweep_interval = None;
        config.kdf = KdfParams::new(256, 1, 1);
        SecretStore::open_with_clock(config, Arc::new(ManualClock::default())).unwrap()
    }

    #[tokio::test(start_paused = true)]
    async fn exits_once_store_is_dropped() {
        let store = unswept_store();
        let sweeper = Sweeper::spawn(&Handle::current(), store.downgrade(), INTERVAL);
        drop(store);

        time::sleep(INTERVAL * 2).await;
        for _ in 0..10 {
            if sweeper.is_finished() {
                break;
            }
            tokio::task::yield_now().await;
        }
        assert!(sweeper.is_finished());
    }

    #[tokio::test(start_paused = true)]
    async fn exits_when_stop_channel_drops() {
        let store = unswept_store();
        let Sweeper { stop, task } = Sweeper::spawn(&Handle::current(), store.downgrade(), INTERVAL);
        drop(stop);

        time::timeout(INTERVAL / 2, task)
            .await
            .expect("sweeper should exit before its first tick")
            .unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn keeps_running_while_store_lives() {
        let store = unswept_store();
        let sweeper = Sweeper::spawn(&Handle::current(), store.downgrade(), INTERVAL);

        time::sleep(INTERVAL * 3).await;
        assert!(!sweeper.is_finished());

        sweeper.stop().await;
    }
}
