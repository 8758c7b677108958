use std::fmt;

#[derive(Debug)]
pub enum ConfigError {
    IoError(std::io::Error),
    TomlError(String),
    BadResendInterval(String),
    BadDiscoveryTimeout(String),
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::IoError(e) => write!(f, "IO error: {}", e),
            ConfigError::TomlError(e) => write!(f, "TOML parsing error: {}", e),
            ConfigError::BadResendInterval(e) => write!(f, "Resend interval error: {}", e),
            ConfigError::BadDiscoveryTimeout(e) => write!(f, "Discovery timeout error: {}", e),
        }
    }
}

impl std::error::Error for ConfigError {}

impl From<std::io::Error> for ConfigError {
    fn from(err: std::io::Error) -> Self {
        ConfigError::IoError(err)
    }
}

#[derive(Debug)]
pub enum NetworkError {
    BindFailed(std::io::Error),
    SendFailed(std::io::Error),
    ReceiveFailed(std::io::Error),
}

impl fmt::Display for NetworkError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NetworkError::BindFailed(e) => write!(f, "Socket bind failed: {}", e),
            NetworkError::SendFailed(e) => write!(f, "Datagram send failed: {}", e),
            NetworkError::ReceiveFailed(e) => write!(f, "Datagram receive failed: {}", e),
        }
    }
}

impl std::error::Error for NetworkError {}

/// Errors returned synchronously by the session controller.
///
/// Precondition violations (`Busy`, `MissingDestination`, `InvalidConfig`)
/// leave the controller state untouched and start no workers.
#[derive(Debug)]
pub enum SessionError {
    Busy,
    MissingDestination,
    InvalidConfig(String),
    Network(NetworkError),
}

impl fmt::Display for SessionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SessionError::Busy => write!(f, "A session is already active"),
            SessionError::MissingDestination => {
                write!(f, "No destination selected for the collected data")
            }
            SessionError::InvalidConfig(e) => write!(f, "Invalid session configuration: {}", e),
            SessionError::Network(e) => write!(f, "Session network error: {}", e),
        }
    }
}

impl std::error::Error for SessionError {}

impl From<NetworkError> for SessionError {
    fn from(err: NetworkError) -> Self {
        SessionError::Network(err)
    }
}

#[derive(Debug)]
pub enum StorageError {
    ConnectionFailed(String),
    WriteFailed(String),
}

impl fmt::Display for StorageError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StorageError::ConnectionFailed(e) => write!(f, "Storage connection failed: {}", e),
            StorageError::WriteFailed(e) => write!(f, "Storage write failed: {}", e),
        }
    }
}

impl std::error::Error for StorageError {}

impl From<sqlx::Error> for StorageError {
    fn from(err: sqlx::Error) -> Self {
        StorageError::WriteFailed(err.to_string())
    }
}

#[derive(Debug)]
pub enum CommitError {
    Staging(StorageError),
    Transfer(std::io::Error),
}

impl fmt::Display for CommitError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CommitError::Staging(e) => write!(f, "Staging store error: {}", e),
            CommitError::Transfer(e) => write!(f, "Destination transfer failed: {}", e),
        }
    }
}

impl std::error::Error for CommitError {}

impl From<StorageError> for CommitError {
    fn from(err: StorageError) -> Self {
        CommitError::Staging(err)
    }
}
