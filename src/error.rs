//! Error types for the testnet director

use thiserror::Error;

/// Result type for director operations
pub type DirectorResult<T> = Result<T, DirectorError>;

/// Errors returned by the registry, the state machine and the RPC layer
#[derive(Error, Debug)]
pub enum DirectorError {
    #[error("unregistered testnet: {0}")]
    UnregisteredTestnet(String),

    #[error("testnet not accepting new registrations: {0}")]
    NotAcceptingRegistrations(String),

    #[error("testnet not ready: {0}")]
    NotReady(String),

    #[error("no genesis for testnet: {0}")]
    NoGenesis(String),

    #[error("no address book for testnet: {0}")]
    NoAddressBook(String),

    #[error("Persistence error: {0}")]
    Persistence(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Invalid configuration: {0}")]
    Config(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl DirectorError {
    /// Stable identifier for the error kind, used in RPC error envelopes
    pub fn kind(&self) -> &'static str {
        match self {
            DirectorError::UnregisteredTestnet(_) => "unregistered_testnet",
            DirectorError::NotAcceptingRegistrations(_) => "not_accepting_registrations",
            DirectorError::NotReady(_) => "not_ready",
            DirectorError::NoGenesis(_) => "no_genesis",
            DirectorError::NoAddressBook(_) => "no_address_book",
            DirectorError::Persistence(_) => "persistence",
            DirectorError::InvalidInput(_) => "invalid_input",
            DirectorError::Serialization(_) => "serialization",
            DirectorError::Config(_) => "config",
            DirectorError::Internal(_) => "internal",
        }
    }
}

impl From<std::io::Error> for DirectorError {
    fn from(err: std::io::Error) -> Self {
        DirectorError::Internal(err.to_string())
    }
}

impl From<sled::Error> for DirectorError {
    fn from(err: sled::Error) -> Self {
        DirectorError::Persistence(err.to_string())
    }
}

impl From<bincode::Error> for DirectorError {
    fn from(err: bincode::Error) -> Self {
        DirectorError::Serialization(err.to_string())
    }
}

impl From<serde_json::Error> for DirectorError {
    fn from(err: serde_json::Error) -> Self {
        DirectorError::Serialization(err.to_string())
    }
}

impl From<toml::de::Error> for DirectorError {
    fn from(err: toml::de::Error) -> Self {
        DirectorError::Config(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = DirectorError::UnregisteredTestnet("ghost".to_string());
        assert_eq!(err.to_string(), "unregistered testnet: ghost");

        let err = DirectorError::NotAcceptingRegistrations("net2".to_string());
        assert_eq!(
            err.to_string(),
            "testnet not accepting new registrations: net2"
        );

        let err = DirectorError::NoGenesis("net2".to_string());
        assert_eq!(err.to_string(), "no genesis for testnet: net2");
    }

    #[test]
    fn test_error_kinds_are_distinct() {
        let errors = vec![
            DirectorError::UnregisteredTestnet(String::new()),
            DirectorError::NotAcceptingRegistrations(String::new()),
            DirectorError::NotReady(String::new()),
            DirectorError::NoGenesis(String::new()),
            DirectorError::NoAddressBook(String::new()),
            DirectorError::Persistence(String::new()),
            DirectorError::InvalidInput(String::new()),
            DirectorError::Serialization(String::new()),
            DirectorError::Config(String::new()),
            DirectorError::Internal(String::new()),
        ];
        let mut kinds: Vec<&str> = errors.iter().map(|e| e.kind()).collect();
        kinds.sort();
        kinds.dedup();
        assert_eq!(kinds.len(), errors.len());
    }

    #[test]
    fn test_from_bincode_error() {
        let invalid_data: &[u8] = &[0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF];
        let bincode_err = bincode::deserialize::<String>(invalid_data).unwrap_err();
        let err: DirectorError = bincode_err.into();
        assert!(matches!(err, DirectorError::Serialization(_)));
    }

    #[test]
    fn test_from_toml_error() {
        let toml_err = toml::from_str::<toml::Value>("= broken").unwrap_err();
        let err: DirectorError = toml_err.into();
        assert!(matches!(err, DirectorError::Config(_)));
        assert_eq!(err.kind(), "config");
    }

    #[test]
    fn test_from_io_error() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
        let err: DirectorError = io_err.into();
        assert!(matches!(err, DirectorError::Internal(_)));
        assert!(err.to_string().contains("file not found"));
    }
}
