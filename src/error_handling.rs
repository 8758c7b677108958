pub mod types;

pub use types::{CommitError, ConfigError, NetworkError, SessionError, StorageError};
