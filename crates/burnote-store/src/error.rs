//! Error types for the secret store.

use thiserror::Error;

/// Errors raised by the cipher engine, the store and configuration loading.
///
/// "Not found" is deliberately absent: an unknown or expired identifier is an
/// ordinary outcome and is reported through [`crate::Retrieval`] and
/// [`crate::ExistenceInfo`] instead.
#[derive(Debug, Error)]
pub enum Error {
    /// The caller supplied something unusable (empty payload, empty key,
    /// zero TTL, malformed password hash record).
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// Authenticated decryption failed. Wrong key, corrupted blob and a
    /// malformed blob are reported identically.
    #[error("authentication failed")]
    AuthenticationFailure,

    /// A stored record could not be opened even though it passed every
    /// check. Indicates corruption or a master key change under a live store.
    #[error("store invariant violated: {0}")]
    InternalInvariantViolation(String),

    #[error("key derivation failed: {0}")]
    KeyDerivation(String),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Convenience result alias for store operations.
pub type Result<T> = std::result::Result<T, Error>;
