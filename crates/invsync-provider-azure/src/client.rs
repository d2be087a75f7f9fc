//! Azure AD token exchange and ARM REST calls
//!
//! Every call is made exactly once. A failed call is reported to the caller
//! as is; the token is never refreshed.

use invsync_core::{CredentialBundle, Error};
use reqwest::StatusCode;
use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::debug;

use crate::wire::ArmList;

/// Provider name used in error messages
pub(crate) const PROVIDER: &str = "azure";

/// `api-version` for `Microsoft.Network` resources
pub(crate) const NETWORK_API_VERSION: &str = "2023-09-01";

/// `api-version` for `Microsoft.Compute` resources
pub(crate) const COMPUTE_API_VERSION: &str = "2023-07-01";

/// Failures of a single ARM or token call
#[derive(Debug, thiserror::Error)]
pub(crate) enum ArmError {
    #[error("HTTP request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("HTTP {status}: {body}")]
    Status { status: StatusCode, body: String },

    #[error("Failed to parse response: {0}")]
    Decode(String),

    #[error("Refusing to follow nextLink outside {0}")]
    ForeignLink(String),
}

impl From<ArmError> for Error {
    fn from(err: ArmError) -> Self {
        match err {
            ArmError::Transport(e) => Error::http(e.to_string()),
            ArmError::Status { status, body } => match status.as_u16() {
                401 | 403 => Error::auth(format!(
                    "Invalid credentials or insufficient permissions. Status: {}",
                    status
                )),
                404 => Error::not_found(body),
                429 => Error::rate_limited(format!("Status: {}", status)),
                500..=599 => Error::provider(
                    PROVIDER,
                    format!("Azure server error (transient): {} - {}", status, body),
                ),
                _ => Error::provider(PROVIDER, format!("Request failed: {} - {}", status, body)),
            },
            other => Error::provider(PROVIDER, other.to_string()),
        }
    }
}

#[derive(serde::Deserialize)]
struct TokenResponse {
    access_token: String,
}

/// Token endpoint for a directory, e.g. `https://login.microsoftonline.com/{tenant}/oauth2/v2.0/token`
pub(crate) fn token_url(authority_host: &str, directory_id: &str) -> String {
    format!(
        "{}/{}/oauth2/v2.0/token",
        authority_host.trim_end_matches('/'),
        directory_id
    )
}

/// `.default` scope for the management endpoint
pub(crate) fn management_scope(management_endpoint: &str) -> String {
    format!("{}/.default", management_endpoint.trim_end_matches('/'))
}

/// Exchange application credentials for an ARM access token
///
/// Any failure, including transport errors, is an authentication failure.
pub(crate) async fn acquire_token(
    http: &reqwest::Client,
    authority_host: &str,
    management_endpoint: &str,
    bundle: &CredentialBundle,
) -> invsync_core::Result<String> {
    let url = token_url(authority_host, &bundle.provider_tenant_id);
    let scope = management_scope(management_endpoint);
    debug!("Azure token request → {}", url);

    let form = [
        ("grant_type", "client_credentials"),
        ("client_id", bundle.app_id.as_str()),
        ("client_secret", bundle.secret.as_str()),
        ("scope", scope.as_str()),
    ];

    let response = http
        .post(&url)
        .form(&form)
        .send()
        .await
        .map_err(|e| Error::auth(format!("Token request failed: {}", e)))?;

    let status = response.status();
    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        return Err(Error::auth(format!(
            "Token endpoint returned {}: {}",
            status, body
        )));
    }

    let token: TokenResponse = response
        .json()
        .await
        .map_err(|e| Error::auth(format!("Invalid token response: {}", e)))?;

    if token.access_token.is_empty() {
        return Err(Error::auth("Token endpoint returned an empty access token"));
    }
    Ok(token.access_token)
}

/// Bearer-authenticated ARM client scoped to one management endpoint
pub(crate) struct ArmClient {
    http: reqwest::Client,
    management_endpoint: String,
    /// ⚠️ NEVER log this value
    access_token: String,
}

impl std::fmt::Debug for ArmClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ArmClient")
            .field("management_endpoint", &self.management_endpoint)
            .field("access_token", &"<REDACTED>")
            .finish()
    }
}

impl ArmClient {
    pub(crate) fn new(
        http: reqwest::Client,
        management_endpoint: &str,
        access_token: String,
    ) -> Self {
        Self {
            http,
            management_endpoint: management_endpoint.trim_end_matches('/').to_string(),
            access_token,
        }
    }

    /// Absolute URL for a resource path with its `api-version`
    pub(crate) fn url(&self, path: &str, api_version: &str) -> String {
        let separator = if path.contains('?') { '&' } else { '?' };
        format!(
            "{}{}{}api-version={}",
            self.management_endpoint, path, separator, api_version
        )
    }

    pub(crate) async fn get_json<T: DeserializeOwned>(&self, url: &str) -> Result<T, ArmError> {
        let response = self
            .http
            .get(url)
            .bearer_auth(&self.access_token)
            .send()
            .await?;
        Self::decode(response).await
    }

    pub(crate) async fn put_json<B: Serialize, T: DeserializeOwned>(
        &self,
        url: &str,
        body: &B,
    ) -> Result<T, ArmError> {
        let response = self
            .http
            .put(url)
            .bearer_auth(&self.access_token)
            .json(body)
            .send()
            .await?;
        Self::decode(response).await
    }

    /// Follow `nextLink` until the collection is exhausted
    ///
    /// A failure on any page fails the whole listing.
    pub(crate) async fn get_all_pages<T: DeserializeOwned>(
        &self,
        initial_url: &str,
    ) -> Result<Vec<T>, ArmError> {
        let mut all = Vec::new();
        let mut url = initial_url.to_string();

        loop {
            debug!("Azure paginate: {}", url);
            let page: ArmList<T> = self.get_json(&url).await?;
            all.extend(page.value);

            match page.next_link {
                Some(next) if !next.is_empty() => {
                    if !next.starts_with(&self.management_endpoint) {
                        return Err(ArmError::ForeignLink(self.management_endpoint.clone()));
                    }
                    url = next;
                }
                _ => break,
            }
        }

        Ok(all)
    }

    async fn decode<T: DeserializeOwned>(response: reqwest::Response) -> Result<T, ArmError> {
        let status = response.status();
        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "Unable to read error response".to_string());
            return Err(ArmError::Status { status, body });
        }

        response
            .json::<T>()
            .await
            .map_err(|e| ArmError::Decode(e.to_string()))
    }
}
