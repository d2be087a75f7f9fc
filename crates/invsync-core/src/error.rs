//! Error types for the inventory synchronization pipeline
//!
//! Every fallible operation in the workspace returns [`Error`]. The worker
//! uses [`Error::category`] to decide whether a failure stops a run.

use std::fmt;
use thiserror::Error;

/// Result type alias for synchronization operations
pub type Result<T> = std::result::Result<T, Error>;

/// Credential bundle fields, in validation order
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CredentialField {
    TenantId,
    AccountId,
    AppId,
    Secret,
    ProviderTenantId,
    SubscriptionId,
}

impl CredentialField {
    /// Field name as it appears in account records and log lines
    pub fn as_str(&self) -> &'static str {
        match self {
            CredentialField::TenantId => "tenantId",
            CredentialField::AccountId => "accountId",
            CredentialField::AppId => "appId",
            CredentialField::Secret => "key",
            CredentialField::ProviderTenantId => "azureTenantId",
            CredentialField::SubscriptionId => "subscription",
        }
    }
}

impl fmt::Display for CredentialField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Coarse classification, carried by failed sync reports and log lines
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    Credential,
    Authentication,
    Fetch,
    Persist,
    Publish,
    Configuration,
    Other,
}

/// Core error type for the synchronization pipeline
#[derive(Error, Debug)]
pub enum Error {
    /// A credential bundle field is missing or empty
    #[error("Missing credential field: {0}")]
    MissingCredentialField(CredentialField),

    /// No account record matches the tenant/account pair
    #[error("No credentials configured for tenant {tenant_id} account {account_id}")]
    CredentialNotFound {
        tenant_id: String,
        account_id: String,
    },

    /// The provider rejected the credential exchange
    #[error("Authentication failed: {0}")]
    Authentication(String),

    /// A collection listing call failed
    #[error("Failed to fetch {resource}: {message}")]
    Fetch { resource: String, message: String },

    /// Snapshot store errors
    #[error("Snapshot store error: {0}")]
    Persist(String),

    /// Notification channel errors
    #[error("Notification publish error: {0}")]
    Publish(String),

    /// No session is registered under the given key
    #[error("No provider session for key {0}")]
    SessionNotFound(String),

    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// HTTP transport errors
    #[error("HTTP error: {0}")]
    Http(String),

    /// Rate limiting reported by a remote API
    #[error("Rate limited: {0}")]
    RateLimited(String),

    /// Resource not found
    #[error("Not found: {0}")]
    NotFound(String),

    /// Invalid input
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Provider-specific error
    #[error("Provider error ({provider}): {message}")]
    Provider { provider: String, message: String },

    /// Generic error with context
    #[error("{0}")]
    Other(String),
}

impl Error {
    /// Create an authentication error
    pub fn auth(msg: impl Into<String>) -> Self {
        Self::Authentication(msg.into())
    }

    /// Create a fetch error for a resource collection
    pub fn fetch(resource: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Fetch {
            resource: resource.into(),
            message: message.into(),
        }
    }

    /// Create a snapshot store error
    pub fn persist(msg: impl Into<String>) -> Self {
        Self::Persist(msg.into())
    }

    /// Create a notification channel error
    pub fn publish(msg: impl Into<String>) -> Self {
        Self::Publish(msg.into())
    }

    /// Create a configuration error
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Create an HTTP error
    pub fn http(msg: impl Into<String>) -> Self {
        Self::Http(msg.into())
    }

    /// Create a rate limit error
    pub fn rate_limited(msg: impl Into<String>) -> Self {
        Self::RateLimited(msg.into())
    }

    /// Create a "not found" error
    pub fn not_found(msg: impl Into<String>) -> Self {
        Self::NotFound(msg.into())
    }

    /// Create an invalid input error
    pub fn invalid_input(msg: impl Into<String>) -> Self {
        Self::InvalidInput(msg.into())
    }

    /// Create a provider-specific error
    pub fn provider(provider: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Provider {
            provider: provider.into(),
            message: message.into(),
        }
    }

    /// Map the error onto the pipeline's failure taxonomy
    pub fn category(&self) -> ErrorCategory {
        match self {
            Error::MissingCredentialField(_) | Error::CredentialNotFound { .. } => {
                ErrorCategory::Credential
            }
            Error::Authentication(_) => ErrorCategory::Authentication,
            Error::Fetch { .. } | Error::SessionNotFound(_) => ErrorCategory::Fetch,
            Error::Persist(_) | Error::Io(_) => ErrorCategory::Persist,
            Error::Publish(_) => ErrorCategory::Publish,
            Error::Config(_) | Error::InvalidInput(_) => ErrorCategory::Configuration,
            _ => ErrorCategory::Other,
        }
    }
}

impl From<anyhow::Error> for Error {
    fn from(err: anyhow::Error) -> Self {
        Self::Other(err.to_string())
    }
}
