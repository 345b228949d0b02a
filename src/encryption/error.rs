// ABOUTME: Error types for encryption key and provider handling
// ABOUTME: Display strings are the operator-facing messages shown when rendering fails

use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum EncryptionError {
    #[error("The key `dev_key` is not supported. You must rotate to using an `encryption_password` prior to upgrading to this version.")]
    DevKeyUnsupported,

    #[error("Exactly one encryption key must be marked as active in the deployment manifest. Please update your configuration to proceed.")]
    ActiveKeyCount { found: usize },

    #[error("The provided encryption provider type is not valid. Valid provider types are \"hsm\", \"internal\", and \"kms-plugin\".")]
    InvalidProviderType { provider_type: Option<String> },

    #[error("More than one {provider_type} provider is not supported. Please update your configuration to proceed.")]
    DuplicateProviderType { provider_type: String },

    #[error("connection_properties should only be provided for providers of type \"hsm\" or \"kms-plugin\".")]
    UnexpectedConnectionProperties { provider: Option<String> },

    #[error("connection_properties for a provider of type \"kms-plugin\" must provide an \"endpoint\".")]
    MissingEndpoint { provider: Option<String> },

    #[error("`partition` and `partition_password` cannot be provided both through `connection_properties` and directly")]
    PartitionProvidedTwice { provider: Option<String> },

    #[error("`provider_name` provided for key is not in list of providers")]
    UnknownProvider { provider_name: Option<String> },

    #[error("credhub.encryption.keys[].key_properties.encryption_password is not valid (must not be empty if provided).")]
    EmptyPassword,

    #[error("The encryption_password value must be at least 20 characters in length. Please update and redeploy.")]
    PasswordTooShort { length: usize },

    #[error("`{provider_type}` providers require `{property}`")]
    MissingProperty {
        provider_type: String,
        property: String,
    },

    #[error("Data migration between encryption providers is not currently supported. Please update your manifest to use a single encryption provider.")]
    MultipleProvidersInUse { providers: Vec<String> },

    #[error("Invalid encryption {kind} entry: {reason}")]
    Malformed { kind: String, reason: String },
}

pub type Result<T> = std::result::Result<T, EncryptionError>;
