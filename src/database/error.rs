// ABOUTME: Error types for data storage resolution and validation
// ABOUTME: Display strings are the operator-facing messages shown when rendering fails

use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum DatabaseError {
    #[error("credhub.data_storage.type must be set to \"mysql\", \"postgres\", or \"in-memory\".")]
    InvalidType { found: Option<String> },

    #[error("credhub.data_storage requires the following keys to be set when type is `mysql` or `postgres`: port, database, host, username, password")]
    MissingConnectionKeys { missing: Vec<String> },

    #[error("credhub.data_storage.require_tls must be set to `true` or `false`.")]
    InvalidRequireTls,

    #[error("credhub.data_storage requires the tls_ca to be set when require_tls is set to true")]
    MissingTlsCa,

    #[error("A CA must be provided at 'credhub.data_storage.tls_ca' if database TLS is required. Please add a CA or disable TLS and redeploy.")]
    MissingDatabaseCa,

    #[error("postgres `host` must be set")]
    MissingPostgresHost,
}

pub type Result<T> = std::result::Result<T, DatabaseError>;
