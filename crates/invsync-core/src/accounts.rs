// # Account Credentials
//
// File-backed `CredentialResolver`.
//
// ## File Format
//
// ```json
// [
//   {
//     "tenantId": "tenant-a",
//     "accountId": "prod",
//     "appId": "00000000-0000-0000-0000-000000000000",
//     "key": "<client secret>",
//     "azureTenantId": "11111111-1111-1111-1111-111111111111",
//     "subscription": "22222222-2222-2222-2222-222222222222"
//   }
// ]
// ```
//
// Incomplete records load fine; they are rejected at resolve time so the
// operator sees which account is misconfigured.

use serde::{Deserialize, Serialize};
use std::path::Path;
use tokio::fs;

use crate::error::{Error, Result};
use crate::traits::credentials::{CredentialBundle, CredentialResolver};

/// One configured account as stored on disk
#[derive(Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct AccountRecord {
    pub tenant_id: String,
    pub account_id: String,
    pub app_id: String,
    pub key: String,
    pub azure_tenant_id: String,
    pub subscription: String,
}

impl std::fmt::Debug for AccountRecord {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AccountRecord")
            .field("tenant_id", &self.tenant_id)
            .field("account_id", &self.account_id)
            .field("app_id", &self.app_id)
            .field("key", &"<REDACTED>")
            .field("azure_tenant_id", &self.azure_tenant_id)
            .field("subscription", &self.subscription)
            .finish()
    }
}

impl From<&AccountRecord> for CredentialBundle {
    fn from(record: &AccountRecord) -> Self {
        CredentialBundle {
            tenant_id: record.tenant_id.clone(),
            account_id: record.account_id.clone(),
            app_id: record.app_id.clone(),
            secret: record.key.clone(),
            provider_tenant_id: record.azure_tenant_id.clone(),
            subscription_id: record.subscription.clone(),
        }
    }
}

/// Resolver over a fixed list of account records
#[derive(Debug, Clone, Default)]
pub struct StaticCredentialResolver {
    records: Vec<AccountRecord>,
}

impl StaticCredentialResolver {
    pub fn new(records: Vec<AccountRecord>) -> Self {
        Self { records }
    }

    /// Load account records from a JSON file
    pub async fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path).await.map_err(|e| {
            Error::config(format!(
                "Failed to read accounts file {}: {}",
                path.display(),
                e
            ))
        })?;

        let records: Vec<AccountRecord> = serde_json::from_str(&content).map_err(|e| {
            Error::config(format!(
                "Failed to parse accounts file {}: {}",
                path.display(),
                e
            ))
        })?;

        tracing::debug!("Loaded {} account record(s) from {}", records.len(), path.display());
        Ok(Self::new(records))
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

impl CredentialResolver for StaticCredentialResolver {
    fn resolve(&self, tenant_id: &str, account_id: &str) -> Result<CredentialBundle> {
        let record = self
            .records
            .iter()
            .find(|r| r.tenant_id == tenant_id && r.account_id == account_id)
            .ok_or_else(|| Error::CredentialNotFound {
                tenant_id: tenant_id.to_string(),
                account_id: account_id.to_string(),
            })?;

        let bundle = CredentialBundle::from(record);
        if let Err(e) = bundle.validate() {
            tracing::warn!(
                tenant_id,
                account_id,
                "Incomplete account configuration: {}",
                e
            );
            return Err(e);
        }
        Ok(bundle)
    }

    fn accounts(&self) -> Vec<(String, String)> {
        self.records
            .iter()
            .map(|r| (r.tenant_id.clone(), r.account_id.clone()))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::CredentialField;
    use tempfile::tempdir;

    const ACCOUNTS: &str = r#"[
        {"tenantId": "t1", "accountId": "a1", "appId": "app", "key": "s3cr3t",
         "azureTenantId": "dir", "subscription": "sub"},
        {"tenantId": "t1", "accountId": "a2", "appId": "app", "key": "",
         "azureTenantId": "dir", "subscription": "sub"}
    ]"#;

    #[tokio::test]
    async fn test_resolve_from_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("accounts.json");
        fs::write(&path, ACCOUNTS).await.unwrap();

        let resolver = StaticCredentialResolver::from_file(&path).await.unwrap();
        assert_eq!(resolver.len(), 2);

        let bundle = resolver.resolve("t1", "a1").unwrap();
        assert_eq!(bundle.secret, "s3cr3t");
        assert_eq!(bundle.provider_tenant_id, "dir");
        assert_eq!(bundle.subscription_id, "sub");

        assert_eq!(
            resolver.accounts(),
            vec![
                ("t1".to_string(), "a1".to_string()),
                ("t1".to_string(), "a2".to_string())
            ]
        );
    }

    #[tokio::test]
    async fn test_incomplete_and_missing_accounts() {
        let records: Vec<AccountRecord> = serde_json::from_str(ACCOUNTS).unwrap();
        let resolver = StaticCredentialResolver::new(records);

        assert!(matches!(
            resolver.resolve("t1", "a2"),
            Err(Error::MissingCredentialField(CredentialField::Secret))
        ));
        assert!(matches!(
            resolver.resolve("t2", "a1"),
            Err(Error::CredentialNotFound { .. })
        ));
    }

    #[tokio::test]
    async fn test_unparseable_file_is_config_error() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("accounts.json");
        fs::write(&path, "{not json").await.unwrap();

        let result = StaticCredentialResolver::from_file(&path).await;
        assert!(matches!(result, Err(Error::Config(_))));
    }
}
