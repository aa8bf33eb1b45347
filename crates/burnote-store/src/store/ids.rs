use rand::distributions::Alphanumeric;
use rand::Rng;

/// Identifier length in characters. 62^48 values.
pub const ID_LEN: usize = 48;

/// Generate a fresh identifier drawn uniformly from `A-Z a-z 0-9`.
pub(crate) fn generate_id() -> String {
    rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(ID_LEN)
        .map(char::from)
        .collect()
}

/// A log-safe prefix of an identifier. Full identifiers grant access and
/// must not be written to logs.
pub(crate) fn short(id: &str) -> &str {
    id.get(..6).unwrap_or(id)
}
