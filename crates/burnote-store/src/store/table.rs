use std::collections::hash_map::Entry;
use std::collections::HashMap;
use std::sync::{Arc, Weak};

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use tracing::{debug, error, info, warn};

use super::clock::{Clock, SystemClock};
use super::crypto::CipherEngine;
use super::ids::{generate_id, short};
use super::model::{is_expired, ExistenceInfo, Plaintext, Retrieval, SecretRecord, StoreStats};
use crate::config::{MasterKey, StoreConfig};
use crate::error::{Error, Result};
use crate::sweeper::Sweeper;

/// One table entry. Expiry and protection flags sit outside the record lock
/// so existence checks and sweeps never wait on a decrypting reader.
///
/// Lock order is slot, then table. Nothing acquires a slot lock while
/// holding the table lock.
struct Slot {
    expires_at: Option<DateTime<Utc>>,
    requires_password: bool,
    record: Mutex<Option<SecretRecord>>,
}

impl Slot {
    /// Take the record out. Returns false if someone else already did.
    fn consume(&self) -> bool {
        self.record.lock().take().is_some()
    }
}

struct Inner {
    table: Mutex<HashMap<String, Arc<Slot>>>,
    engine: CipherEngine,
    master_key: MasterKey,
    clock: Arc<dyn Clock>,
    sweeper: Mutex<Option<Sweeper>>,
}

/// Thread-safe handle to the in-memory secret table.
///
/// Cloning is cheap; all clones share one table. The background sweeper,
/// if enabled, stops once [`SecretStore::shutdown`] is called or the last
/// handle is dropped.
#[derive(Clone)]
pub struct SecretStore {
    inner: Arc<Inner>,
}

/// Non-owning handle held by the sweeper task.
#[derive(Clone)]
pub(crate) struct WeakSecretStore {
    inner: Weak<Inner>,
}

impl WeakSecretStore {
    pub(crate) fn upgrade(&self) -> Option<SecretStore> {
        self.inner.upgrade().map(|inner| SecretStore { inner })
    }
}

impl SecretStore {
    /// Open a store using wall-clock time.
    ///
    /// When `config.sweep_interval` is set this must be called from within a
    /// tokio runtime, which will host the sweeper task.
    pub fn open(config: StoreConfig) -> Result<Self> {
        Self::open_with_clock(config, Arc::new(SystemClock))
    }

    /// Open a store that reads time from `clock`.
    pub fn open_with_clock(config: StoreConfig, clock: Arc<dyn Clock>) -> Result<Self> {
        let engine = CipherEngine::new(config.kdf)?;

        let store = Self {
            inner: Arc::new(Inner {
                table: Mutex::new(HashMap::new()),
                engine,
                master_key: config.master_key,
                clock,
                sweeper: Mutex::new(None),
            }),
        };

        if let Some(interval) = config.sweep_interval {
            if interval.is_zero() {
                return Err(Error::Config("sweep interval must be non-zero".into()));
            }
            let runtime = tokio::runtime::Handle::try_current().map_err(|_| {
                Error::Config(
                    "the expiry sweeper needs a running tokio runtime \
                     (disable it with sweep_interval = None)"
                        .into(),
                )
            })?;
            let sweeper = Sweeper::spawn(&runtime, store.downgrade(), interval);
            *store.inner.sweeper.lock() = Some(sweeper);
            info!(interval_secs = interval.as_secs(), "expiry sweeper started");
        }

        Ok(store)
    }

    pub(crate) fn downgrade(&self) -> WeakSecretStore {
        WeakSecretStore {
            inner: Arc::downgrade(&self.inner),
        }
    }

    /// Stop the background sweeper and wait for it to exit. Idempotent.
    pub async fn shutdown(&self) {
        let sweeper = self.inner.sweeper.lock().take();
        if let Some(sweeper) = sweeper {
            sweeper.stop().await;
            info!("expiry sweeper stopped");
        }
    }

    /// True while a background sweeper task is attached and running.
    pub fn is_sweeping(&self) -> bool {
        self.inner
            .sweeper
            .lock()
            .as_ref()
            .is_some_and(|s| !s.is_finished())
    }

    /// Encrypt and store `payload`, returning its identifier.
    ///
    /// An empty `password` is treated as no password. `ttl_minutes`, when
    /// given, must be positive.
    pub fn create(
        &self,
        payload: impl AsRef<[u8]>,
        password: Option<&str>,
        ttl_minutes: Option<u64>,
    ) -> Result<String> {
        let payload = payload.as_ref();
        if payload.is_empty() {
            return Err(Error::InvalidInput("payload cannot be empty".into()));
        }

        let now = self.inner.clock.now();
        let expires_at = match ttl_minutes {
            None => None,
            Some(0) => {
                return Err(Error::InvalidInput(
                    "ttl must be a positive number of minutes".into(),
                ))
            }
            Some(minutes) => Some(deadline(now, minutes)?),
        };

        let engine = &self.inner.engine;
        let ciphertext = engine.encrypt(payload, self.inner.master_key.as_bytes())?;
        let credential_hash = match password.filter(|p| !p.is_empty()) {
            Some(p) => Some(engine.hash_password(p)?),
            None => None,
        };
        let protected = credential_hash.is_some();

        let slot = Arc::new(Slot {
            expires_at,
            requires_password: protected,
            record: Mutex::new(Some(SecretRecord {
                ciphertext,
                credential_hash,
                created_at: now,
            })),
        });

        let id = {
            let mut table = self.inner.table.lock();
            loop {
                let id = generate_id();
                if let Entry::Vacant(entry) = table.entry(id.clone()) {
                    entry.insert(slot);
                    break id;
                }
                warn!("identifier collision, re-rolling");
            }
        };

        debug!(id = short(&id), protected, expires_at = ?expires_at, "stored secret");
        Ok(id)
    }

    /// Report whether `id` is live without decrypting it. An expired record
    /// is removed and reported absent.
    pub fn check_exists(&self, id: &str) -> ExistenceInfo {
        let Some(slot) = self.lookup(id) else {
            return ExistenceInfo::absent();
        };

        if is_expired(slot.expires_at, self.inner.clock.now()) {
            self.unlink(id, &slot);
            if slot.consume() {
                debug!(id = short(id), "lazy-evicted expired secret");
            }
            return ExistenceInfo::absent();
        }

        ExistenceInfo {
            exists: true,
            requires_password: slot.requires_password,
            expires_at: slot.expires_at,
        }
    }

    /// Decrypt and destroy the secret at `id`.
    ///
    /// Resolution order: absent or expired, then credential check, then
    /// decryption. Authentication failures leave the record in place.
    /// Concurrent callers racing on one identifier see exactly one
    /// [`Retrieval::Revealed`].
    pub fn retrieve_and_consume(&self, id: &str, password: Option<&str>) -> Result<Retrieval> {
        let Some(slot) = self.lookup(id) else {
            return Ok(Retrieval::NotFound);
        };

        let mut guard = slot.record.lock();
        let Some(record) = guard.as_ref() else {
            return Ok(Retrieval::NotFound);
        };

        let now = self.inner.clock.now();
        if is_expired(slot.expires_at, now) {
            self.unlink(id, &slot);
            guard.take();
            debug!(id = short(id), "lazy-evicted expired secret");
            return Ok(Retrieval::NotFound);
        }

        let engine = &self.inner.engine;
        if let Some(hash) = &record.credential_hash {
            let Some(password) = password.filter(|p| !p.is_empty()) else {
                return Ok(Retrieval::AuthenticationRequired);
            };
            let verified = engine.verify_password(password, hash).map_err(|e| {
                error!(id = short(id), error = %e, "stored credential hash is unusable");
                Error::InternalInvariantViolation(format!("credential hash unusable: {e}"))
            })?;
            if !verified {
                debug!(id = short(id), "rejected password");
                return Ok(Retrieval::AuthenticationFailed);
            }
        }

        let plaintext = engine
            .decrypt(&record.ciphertext, self.inner.master_key.as_bytes())
            .map_err(|e| {
                error!(id = short(id), error = %e, "stored secret failed to decrypt");
                Error::InternalInvariantViolation(format!("record failed to decrypt: {e}"))
            })?;
        let age = now - record.created_at;

        self.unlink(id, &slot);
        guard.take();
        debug!(
            id = short(id),
            age_secs = age.num_seconds(),
            "secret revealed and destroyed"
        );
        Ok(Retrieval::Revealed(Plaintext::new(plaintext)))
    }

    /// Remove `id` unconditionally. Returns true if a record was present.
    pub fn delete(&self, id: &str) -> bool {
        let removed = self.inner.table.lock().remove(id);
        let existed = removed.is_some_and(|slot| slot.consume());
        if existed {
            debug!(id = short(id), "deleted secret");
        }
        existed
    }

    /// Remove every expired record. Returns how many this call removed.
    pub fn prune(&self) -> usize {
        let now = self.inner.clock.now();

        let mut expired = Vec::new();
        self.inner.table.lock().retain(|_, slot| {
            if is_expired(slot.expires_at, now) {
                expired.push(Arc::clone(slot));
                false
            } else {
                true
            }
        });

        // Readers may have claimed some of these between our scan and now.
        let removed = expired.iter().filter(|slot| slot.consume()).count();
        if removed > 0 {
            info!(removed, "pruned expired secrets");
        }
        removed
    }

    pub fn stats(&self) -> StoreStats {
        let now = self.inner.clock.now();
        let table = self.inner.table.lock();
        StoreStats {
            total_records: table.len(),
            expired_pending: table
                .values()
                .filter(|slot| is_expired(slot.expires_at, now))
                .count(),
        }
    }

    fn lookup(&self, id: &str) -> Option<Arc<Slot>> {
        self.inner.table.lock().get(id).cloned()
    }

    /// Drop `id` from the table if it still maps to `slot`.
    fn unlink(&self, id: &str, slot: &Arc<Slot>) {
        let mut table = self.inner.table.lock();
        if table.get(id).is_some_and(|current| Arc::ptr_eq(current, slot)) {
            table.remove(id);
        }
    }
}

fn deadline(now: DateTime<Utc>, minutes: u64) -> Result<DateTime<Utc>> {
    i64::try_from(minutes)
        .ok()
        .and_then(chrono::Duration::try_minutes)
        .and_then(|ttl| now.checked_add_signed(ttl))
        .ok_or_else(|| Error::InvalidInput(format!("ttl of {minutes} minutes is out of range")))
}
