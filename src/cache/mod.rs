//! Two-tier storage for city bundles: a shared key-value store in front of
//! bincode blobs on local disk.

pub mod key;
pub mod local;
pub mod shared;

pub use key::{CacheKey, SHARED_KEY_PREFIX, sanitize_name};
pub use local::{CacheError, LocalStore};
pub use shared::{RedisStore, SharedStore, SharedTier};
