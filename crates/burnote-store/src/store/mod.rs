pub mod clock;
pub mod crypto;
pub mod ids;
pub mod model;
pub mod table;

pub use clock::{Clock, ManualClock, SystemClock};
pub use crypto::{CipherEngine, KdfParams};
pub use model::{ExistenceInfo, Plaintext, Retrieval, StoreStats};
pub use table::SecretStore;
pub(crate) use table::WeakSecretStore;
