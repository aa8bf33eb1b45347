use std::fmt;

use chrono::{DateTime, Utc};
use serde::Serialize;
use zeroize::Zeroizing;

/// One stored secret. Immutable once inserted; never holds plaintext.
pub(crate) struct SecretRecord {
    /// Base64 `salt ‖ nonce ‖ tag ‖ ciphertext` blob.
    pub ciphertext: String,
    /// `hex(salt):hex(hash)` when the record is password-protected.
    pub credential_hash: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Shared expiry predicate for the read path, existence checks and the sweeper.
/// A record stays live up to and including `expires_at`.
pub(crate) fn is_expired(expires_at: Option<DateTime<Utc>>, now: DateTime<Utc>) -> bool {
    expires_at.is_some_and(|exp| now > exp)
}

/// Result of [`crate::SecretStore::check_exists`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ExistenceInfo {
    pub exists: bool,
    pub requires_password: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expires_at: Option<DateTime<Utc>>,
}

impl ExistenceInfo {
    pub(crate) fn absent() -> Self {
        Self {
            exists: false,
            requires_password: false,
            expires_at: None,
        }
    }
}

/// Outcome of [`crate::SecretStore::retrieve_and_consume`].
#[derive(Debug, PartialEq, Eq)]
pub enum Retrieval {
    /// Secret decrypted and destroyed.
    Revealed(Plaintext),
    /// Unknown, already consumed, deleted or expired.
    NotFound,
    /// Password-protected and no password was supplied. Record left intact.
    AuthenticationRequired,
    /// Wrong password. Record left intact.
    AuthenticationFailed,
}

impl Retrieval {
    /// True for both authentication outcomes.
    pub fn is_unauthorized(&self) -> bool {
        matches!(
            self,
            Retrieval::AuthenticationRequired | Retrieval::AuthenticationFailed
        )
    }

    pub fn into_plaintext(self) -> Option<Plaintext> {
        match self {
            Retrieval::Revealed(pt) => Some(pt),
            _ => None,
        }
    }
}

/// A revealed payload, zeroed on drop.
///
/// Debug output is redacted so the value never lands in logs by accident.
#[derive(PartialEq, Eq)]
pub struct Plaintext(Zeroizing<Vec<u8>>);

impl Plaintext {
    pub(crate) fn new(bytes: Zeroizing<Vec<u8>>) -> Self {
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    /// The payload as UTF-8, if it is valid UTF-8.
    pub fn as_str(&self) -> Option<&str> {
        std::str::from_utf8(&self.0).ok()
    }
}

impl fmt::Debug for Plaintext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("[REDACTED]")
    }
}

/// Point-in-time table statistics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct StoreStats {
    /// Records currently in the table.
    pub total_records: usize,
    /// Records past their expiry that no read or sweep has removed yet.
    pub expired_pending: usize,
}
