// # Credentials
//
// A credential bundle binds one platform account (tenant + account) to the
// cloud identity used to read its inventory.
//
// ## Validation
//
// Every field is required. Validation reports the first empty field in
// declaration order and happens before any call to the provider.
//
// ## Security
//
// The secret never appears in `Debug` output or log lines.

use crate::error::{CredentialField, Error, Result};

/// Resolved credentials for one platform account
#[derive(Clone, PartialEq, Eq)]
pub struct CredentialBundle {
    /// Platform tenant id (snapshot namespace)
    pub tenant_id: String,
    /// Platform account id
    pub account_id: String,
    /// Cloud application (client) id
    pub app_id: String,
    /// Cloud application secret
    /// ⚠️ NEVER log this value
    pub secret: String,
    /// Cloud directory/tenant id
    pub provider_tenant_id: String,
    /// Cloud subscription the session is scoped to
    pub subscription_id: String,
}

impl std::fmt::Debug for CredentialBundle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CredentialBundle")
            .field("tenant_id", &self.tenant_id)
            .field("account_id", &self.account_id)
            .field("app_id", &self.app_id)
            .field("secret", &"<REDACTED>")
            .field("provider_tenant_id", &self.provider_tenant_id)
            .field("subscription_id", &self.subscription_id)
            .finish()
    }
}

impl CredentialBundle {
    /// Check that every field is present
    ///
    /// # Returns
    ///
    /// - `Ok(())`: All fields are non-empty
    /// - `Err(Error::MissingCredentialField)`: Names the first empty field
    pub fn validate(&self) -> Result<()> {
        let fields = [
            (CredentialField::TenantId, &self.tenant_id),
            (CredentialField::AccountId, &self.account_id),
            (CredentialField::AppId, &self.app_id),
            (CredentialField::Secret, &self.secret),
            (CredentialField::ProviderTenantId, &self.provider_tenant_id),
            (CredentialField::SubscriptionId, &self.subscription_id),
        ];

        for (field, value) in fields {
            if value.trim().is_empty() {
                return Err(Error::MissingCredentialField(field));
            }
        }
        Ok(())
    }
}

/// Lookup of account credentials by platform tenant and account
///
/// Implementations return `Error::CredentialNotFound` when no record matches
/// and `Error::MissingCredentialField` when the record is incomplete.
pub trait CredentialResolver: Send + Sync {
    fn resolve(&self, tenant_id: &str, account_id: &str) -> Result<CredentialBundle>;

    /// All (tenant, account) pairs this resolver knows about
    fn accounts(&self) -> Vec<(String, String)>;
}
