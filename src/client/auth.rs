//! Chained authentication credentials for the Fabric API client (§4.M).
//!
//! The upstream service authenticates via Entra ID; this crate has no
//! dependency on the `azure-identity` SDK (it is not part of the teacher's
//! or the pack's dependency stack), so the credential chain is reimplemented
//! directly on `reqwest`: a client-secret (OAuth2 client-credentials grant)
//! credential, falling back to a credential that reads a pre-minted token
//! from the environment (standing in for interactive/managed-identity
//! credentials, which require a browser or cloud metadata endpoint this CLI
//! does not have).

use std::time::{Duration, Instant};

use async_trait::async_trait;
use serde::Deserialize;
use tokio::sync::Mutex;
use tracing::{debug, info};

use crate::error::ClientError;

pub const FABRIC_SCOPE: &str = "https://api.fabric.microsoft.com/.default";

#[derive(Debug, Clone)]
pub struct AccessToken {
    pub token: String,
    pub expires_at: Instant,
}

#[async_trait]
pub trait TokenCredential: Send + Sync {
    async fn get_token(&self, scope: &str) -> Result<AccessToken, ClientError>;
}

/// OAuth2 client-credentials grant against Entra ID's token endpoint.
pub struct ClientSecretCredential {
    tenant_id: String,
    client_id: String,
    client_secret: String,
    http: reqwest::Client,
}

impl ClientSecretCredential {
    pub fn new(tenant_id: impl Into<String>, client_id: impl Into<String>, client_secret: impl Into<String>) -> Self {
        Self {
            tenant_id: tenant_id.into(),
            client_id: client_id.into(),
            client_secret: client_secret.into(),
            http: reqwest::Client::new(),
        }
    }
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    expires_in: u64,
}

#[async_trait]
impl TokenCredential for ClientSecretCredential {
    async fn get_token(&self, scope: &str) -> Result<AccessToken, ClientError> {
        let url = format!("https://login.microsoftonline.com/{}/oauth2/v2.0/token", self.tenant_id);
        let params = [
            ("grant_type", "client_credentials"),
            ("client_id", self.client_id.as_str()),
            ("client_secret", self.client_secret.as_str()),
            ("scope", scope),
        ];

        let response = self
            .http
            .post(&url)
            .form(&params)
            .send()
            .await
            .map_err(|e| ClientError::AuthenticationFailed(format!("token request failed: {e}")))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(ClientError::AuthenticationFailed(format!(
                "token endpoint returned {status}: {body}"
            )));
        }

        let parsed: TokenResponse = response
            .json()
            .await
            .map_err(|e| ClientError::AuthenticationFailed(format!("malformed token response: {e}")))?;

        Ok(AccessToken {
            token: parsed.access_token,
            expires_at: Instant::now() + Duration::from_secs(parsed.expires_in),
        })
    }
}

/// Stand-in for interactive-browser and managed-identity credentials: reads
/// a token that was minted out of band (e.g. `az account get-access-token`)
/// from an environment variable.
pub struct EnvironmentCredential {
    var_name: String,
}

impl EnvironmentCredential {
    pub fn new(var_name: impl Into<String>) -> Self {
        Self { var_name: var_name.into() }
    }
}

#[async_trait]
impl TokenCredential for EnvironmentCredential {
    async fn get_token(&self, _scope: &str) -> Result<AccessToken, ClientError> {
        let token = std::env::var(&self.var_name)
            .map_err(|_| ClientError::AuthenticationFailed(format!("{} is not set", self.var_name)))?;
        if token.is_empty() {
            return Err(ClientError::AuthenticationFailed(format!("{} is empty", self.var_name)));
        }
        // A token minted out of band carries no expiry we can introspect;
        // treat it as short-lived so the cache revalidates it periodically.
        Ok(AccessToken {
            token,
            expires_at: Instant::now() + Duration::from_secs(3600),
        })
    }
}

/// Tries each credential in order, returning the first one that succeeds.
pub struct ChainedTokenCredential {
    chain: Vec<Box<dyn TokenCredential>>,
}

impl ChainedTokenCredential {
    pub fn new(chain: Vec<Box<dyn TokenCredential>>) -> Self {
        Self { chain }
    }
}

#[async_trait]
impl TokenCredential for ChainedTokenCredential {
    async fn get_token(&self, scope: &str) -> Result<AccessToken, ClientError> {
        let mut last_err = None;
        for credential in &self.chain {
            match credential.get_token(scope).await {
                Ok(token) => return Ok(token),
                Err(err) => {
                    debug!(error = %err, "credential in chain failed, trying next");
                    last_err = Some(err);
                }
            }
        }
        Err(last_err.unwrap_or_else(|| ClientError::AuthenticationFailed("no credentials configured".to_string())))
    }
}

/// Caches the access token, refreshing 5 minutes before expiry. Refresh is
/// serialized through a single lock so concurrent callers don't stampede the
/// token endpoint; the first caller to observe a stale token refreshes it,
/// the rest wait on the lock and then see the refreshed value.
pub struct TokenCache {
    credential: Box<dyn TokenCredential>,
    scope: String,
    state: Mutex<Option<AccessToken>>,
}

const EXPIRY_BUFFER: Duration = Duration::from_secs(5 * 60);

impl TokenCache {
    pub fn new(credential: Box<dyn TokenCredential>, scope: impl Into<String>) -> Self {
        Self {
            credential,
            scope: scope.into(),
            state: Mutex::new(None),
        }
    }

    pub async fn get_token(&self) -> Result<String, ClientError> {
        let mut guard = self.state.lock().await;
        if let Some(cached) = guard.as_ref() {
            if Instant::now() + EXPIRY_BUFFER < cached.expires_at {
                debug!("using cached access token");
                return Ok(cached.token.clone());
            }
        }

        info!("acquiring access token");
        let fresh = self.credential.get_token(&self.scope).await?;
        let token = fresh.token.clone();
        *guard = Some(fresh);
        Ok(token)
    }
}
