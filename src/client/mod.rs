//! Resilient REST client for the remote Fabric ontology service (§4.M).
//!
//! Every outbound call goes through the same pipeline: acquire a rate-limit
//! token, check the circuit breaker, issue the HTTP request (with retry and
//! backoff), classify the response, and record the outcome back into the
//! breaker. Long-running operations (202 Accepted) are handed off to
//! [`lro::poll_until_complete`].

pub mod auth;
pub mod circuit_breaker;
pub mod lro;
pub mod rate_limiter;
pub mod retry;

use std::time::Duration;

use reqwest::{Method, StatusCode};
use serde_json::Value;
use tracing::{debug, info};

use crate::cancellation::CancellationToken;
use crate::config::FabricConfig;
use crate::error::ClientError;
use crate::model::Bundle;

use auth::{ChainedTokenCredential, ClientSecretCredential, EnvironmentCredential, TokenCache, FABRIC_SCOPE};
use circuit_breaker::{CircuitBreaker, CircuitBreakerSettings};
use lro::{LroHandle, poll_until_complete};
use rate_limiter::{RateLimiter, RateLimiterSettings};
use retry::{RetryPolicy, retry_with_policy};

/// Replace characters outside `[A-Za-z0-9_]` with `_`, force a leading
/// letter, and cap at 90 characters, per the Fabric item naming rule.
pub fn sanitize_display_name(name: &str) -> String {
    if name.is_empty() {
        return "Ontology".to_string();
    }
    let cleaned: String = name
        .chars()
        .map(|c| if c.is_alphanumeric() || c == '_' { c } else { '_' })
        .collect();
    let cleaned = if cleaned.chars().next().map(|c| c.is_alphabetic()).unwrap_or(false) {
        cleaned
    } else {
        format!("O_{cleaned}")
    };
    cleaned.chars().take(90).collect()
}

/// An ontology's metadata as returned by list/get/create.
#[derive(Debug, Clone, serde::Deserialize, serde::Serialize)]
pub struct OntologyInfo {
    pub id: String,
    #[serde(rename = "displayName", default)]
    pub display_name: String,
    #[serde(default)]
    pub description: String,
}

fn build_credential(config: &FabricConfig) -> ChainedTokenCredential {
    let mut chain: Vec<Box<dyn auth::TokenCredential>> = Vec::new();

    if let (Some(tenant), Some(client_id), Some(secret)) =
        (&config.tenant_id, &config.client_id, &config.client_secret)
    {
        chain.push(Box::new(ClientSecretCredential::new(tenant.clone(), client_id.clone(), secret.clone())));
    }
    if config.use_interactive_auth {
        chain.push(Box::new(EnvironmentCredential::new("FABRIC_ACCESS_TOKEN")));
    }
    chain.push(Box::new(EnvironmentCredential::new("AZURE_ACCESS_TOKEN")));

    ChainedTokenCredential::new(chain)
}

/// The resilient Fabric ontology API client.
pub struct FabricClient {
    config: FabricConfig,
    http: reqwest::Client,
    tokens: TokenCache,
    rate_limiter: Option<RateLimiter>,
    breaker: Option<CircuitBreaker>,
}

impl FabricClient {
    pub fn new(config: FabricConfig) -> Self {
        let rate_limiter = config.rate_limit.enabled.then(|| {
            let burst = config.rate_limit.burst.unwrap_or(config.rate_limit.requests_per_minute);
            RateLimiter::new(RateLimiterSettings::new(config.rate_limit.requests_per_minute, Duration::from_secs(60)).with_burst(burst))
        });

        let breaker = config.circuit_breaker.enabled.then(|| {
            CircuitBreaker::new(
                "fabric_api",
                CircuitBreakerSettings {
                    failure_threshold: config.circuit_breaker.failure_threshold,
                    success_threshold: config.circuit_breaker.success_threshold,
                    recovery_timeout: Duration::from_secs(config.circuit_breaker.recovery_timeout),
                },
            )
        });

        let credential = build_credential(&config);
        let tokens = TokenCache::new(Box::new(credential), FABRIC_SCOPE);

        Self {
            http: reqwest::Client::new(),
            tokens,
            rate_limiter,
            breaker,
            config,
        }
    }

    fn workspace_url(&self, suffix: &str) -> String {
        format!(
            "{}/workspaces/{}/ontologies{}",
            self.config.api_base_url.trim_end_matches('/'),
            self.config.workspace_id,
            suffix
        )
    }

    async fn authorized_request(&self, method: Method, url: &str) -> Result<reqwest::RequestBuilder, ClientError> {
        let token = self.tokens.get_token().await?;
        Ok(self.http.request(method, url).bearer_auth(token).header("Content-Type", "application/json"))
    }

    /// Run one HTTP exchange through the rate limiter and circuit breaker,
    /// classifying the response into success / LRO-handle / transient / permanent.
    async fn execute_once(
        &self,
        method: Method,
        url: &str,
        body: Option<Value>,
    ) -> Result<Result<Value, LroHandle>, ClientError> {
        if let Some(limiter) = &self.rate_limiter {
            limiter.acquire().await;
        }
        if let Some(breaker) = &self.breaker {
            breaker.check()?;
        }

        let mut builder = self.authorized_request(method, url).await?;
        if let Some(body) = &body {
            builder = builder.json(body);
        }

        let outcome = self.send_and_classify(builder).await;

        if let Some(breaker) = &self.breaker {
            let as_unit: Result<(), ClientError> = match &outcome {
                Ok(_) => Ok(()),
                Err(err) => Err(err.clone()),
            };
            breaker.record(&as_unit);
        }

        outcome
    }

    async fn send_and_classify(&self, builder: reqwest::RequestBuilder) -> Result<Result<Value, LroHandle>, ClientError> {
        let response = builder.send().await.map_err(|e| ClientError::Request(e.to_string()))?;
        let status = response.status();

        if status == StatusCode::OK || status == StatusCode::CREATED {
            let text = response.text().await.unwrap_or_default();
            if text.is_empty() {
                return Ok(Ok(Value::Null));
            }
            let value: Value = serde_json::from_str(&text)
                .map_err(|e| ClientError::Permanent { status_code: status.as_u16(), error_code: "InvalidResponse".to_string(), message: e.to_string() })?;
            return Ok(Ok(value));
        }

        if status == StatusCode::ACCEPTED {
            let location = response.headers().get("Location").and_then(|v| v.to_str().ok()).map(|s| s.to_string());
            let operation_id = response.headers().get("x-ms-operation-id").and_then(|v| v.to_str().ok()).map(|s| s.to_string());
            let retry_after = response.headers().get("Retry-After").and_then(|v| v.to_str().ok()).and_then(|s| s.parse().ok());
            let handle = LroHandle::from_headers(location, operation_id, retry_after)
                .ok_or_else(|| ClientError::OperationFailed("202 response carried no operation location".to_string()))?;
            return Ok(Err(handle));
        }

        if status == StatusCode::NO_CONTENT {
            return Ok(Ok(Value::Null));
        }

        let retry_after_secs: Option<u64> = response.headers().get("Retry-After").and_then(|v| v.to_str().ok()).and_then(|s| s.parse().ok());

        if status == StatusCode::TOO_MANY_REQUESTS {
            return Err(ClientError::Transient {
                status_code: 429,
                retry_after: Some(retry_after_secs.unwrap_or(30)),
                message: "rate limit exceeded".to_string(),
            });
        }
        if status == StatusCode::SERVICE_UNAVAILABLE {
            return Err(ClientError::Transient {
                status_code: 503,
                retry_after: Some(retry_after_secs.unwrap_or(10)),
                message: "service temporarily unavailable".to_string(),
            });
        }

        let body_text = response.text().await.unwrap_or_default();
        let (error_code, message) = serde_json::from_str::<Value>(&body_text)
            .ok()
            .map(|v| {
                (
                    v.get("errorCode").and_then(|c| c.as_str()).unwrap_or("Unknown").to_string(),
                    v.get("message").and_then(|m| m.as_str()).unwrap_or(&body_text).to_string(),
                )
            })
            .unwrap_or_else(|| ("Unknown".to_string(), body_text));

        Err(ClientError::Permanent { status_code: status.as_u16(), error_code, message })
    }

    async fn request_with_resilience(
        &self,
        operation_name: &str,
        policy: RetryPolicy,
        token: &CancellationToken,
        method: Method,
        url: String,
        body: Option<Value>,
    ) -> Result<Result<Value, LroHandle>, ClientError> {
        retry_with_policy(policy, token, operation_name, || {
            let url = url.clone();
            let body = body.clone();
            let method = method.clone();
            async move { self.execute_once(method, &url, body).await }
        })
        .await
    }

    async fn wait_for_operation(&self, handle: &LroHandle, token: &CancellationToken) -> Result<Value, ClientError> {
        let result = poll_until_complete(handle, token, |url| {
            let token_clone = token.clone();
            async move {
                let builder = self.authorized_request(Method::GET, &url).await?;
                let response = builder.send().await.map_err(|e| ClientError::Request(e.to_string()))?;
                let location = response.headers().get("Location").and_then(|v| v.to_str().ok()).map(|s| s.to_string());
                let _ = &token_clone;
                let text = response.text().await.unwrap_or_default();
                let value: Value = serde_json::from_str(&text).unwrap_or(Value::Null);
                Ok((value, location))
            }
        })
        .await?;

        if let Some(result_url) = result.get("_result_url").and_then(|v| v.as_str()) {
            let builder = self.authorized_request(Method::GET, result_url).await?;
            let response = builder.send().await.map_err(|e| ClientError::Request(e.to_string()))?;
            if response.status().is_success() {
                let text = response.text().await.unwrap_or_default();
                return serde_json::from_str(&text).map_err(|e| ClientError::OperationFailed(e.to_string()));
            }
            let fallback_url = format!("{}/result", handle.operation_url);
            let builder = self.authorized_request(Method::GET, &fallback_url).await?;
            let response = builder.send().await.map_err(|e| ClientError::Request(e.to_string()))?;
            let text = response.text().await.unwrap_or_default();
            return serde_json::from_str(&text).map_err(|e| ClientError::OperationFailed(e.to_string()));
        }

        Ok(result)
    }

    pub async fn list(&self, token: &CancellationToken) -> Result<Vec<OntologyInfo>, ClientError> {
        token.throw_if_cancelled("list ontologies").map_err(|e| ClientError::Request(e.to_string()))?;
        let url = self.workspace_url("");
        let result = self
            .request_with_resilience("list_ontologies", RetryPolicy::standard(), token, Method::GET, url, None)
            .await?;

        match result {
            Ok(value) => {
                let items = value.get("value").cloned().unwrap_or(Value::Array(vec![]));
                serde_json::from_value(items).map_err(|e| ClientError::OperationFailed(e.to_string()))
            }
            Err(_) => Err(ClientError::OperationFailed("list returned an unexpected long-running response".to_string())),
        }
    }

    pub async fn get(&self, id: &str, token: &CancellationToken) -> Result<OntologyInfo, ClientError> {
        let url = self.workspace_url(&format!("/{id}"));
        let result = self
            .request_with_resilience(&format!("get_ontology_{id}"), RetryPolicy::standard(), token, Method::GET, url, None)
            .await?;
        match result {
            Ok(value) => serde_json::from_value(value).map_err(|e| ClientError::OperationFailed(e.to_string())),
            Err(_) => Err(ClientError::OperationFailed("get returned an unexpected long-running response".to_string())),
        }
    }

    pub async fn get_definition(&self, id: &str, token: &CancellationToken) -> Result<Bundle, ClientError> {
        let url = self.workspace_url(&format!("/{id}/getDefinition"));
        let result = self
            .request_with_resilience(
                &format!("get_ontology_definition_{id}"),
                RetryPolicy::definition_fetch(),
                token,
                Method::POST,
                url,
                None,
            )
            .await?;

        let value = match result {
            Ok(value) => value,
            Err(handle) => self.wait_for_operation(&handle, token).await?,
        };

        let definition = value.get("definition").cloned().unwrap_or(value);
        serde_json::from_value(definition).map_err(|e| ClientError::OperationFailed(e.to_string()))
    }

    pub async fn create(
        &self,
        display_name: &str,
        description: &str,
        definition: Option<Bundle>,
        token: &CancellationToken,
    ) -> Result<OntologyInfo, ClientError> {
        token.throw_if_cancelled("create ontology").map_err(|e| ClientError::Request(e.to_string()))?;
        let safe_name = sanitize_display_name(display_name);
        if safe_name != display_name {
            info!(original = display_name, sanitized = %safe_name, "sanitized display name to meet Fabric naming rules");
        }

        let mut payload = serde_json::json!({ "displayName": safe_name, "description": description });
        if let Some(definition) = definition {
            payload["definition"] = serde_json::to_value(definition).map_err(|e| ClientError::OperationFailed(e.to_string()))?;
        }

        let url = self.workspace_url("");
        let result = self
            .request_with_resilience(&format!("create_ontology_{safe_name}"), RetryPolicy::standard(), token, Method::POST, url, Some(payload))
            .await?;

        let value = match result {
            Ok(value) => value,
            Err(handle) => self.wait_for_operation(&handle, token).await?,
        };
        serde_json::from_value(value).map_err(|e| ClientError::OperationFailed(e.to_string()))
    }

    pub async fn update_definition(
        &self,
        id: &str,
        definition: Bundle,
        update_metadata: bool,
        token: &CancellationToken,
    ) -> Result<Value, ClientError> {
        token.throw_if_cancelled("update ontology definition").map_err(|e| ClientError::Request(e.to_string()))?;
        let mut url = self.workspace_url(&format!("/{id}/updateDefinition"));
        if update_metadata {
            url.push_str("?updateMetadata=True");
        }
        let payload = serde_json::json!({ "definition": definition });

        let result = self
            .request_with_resilience(&format!("update_ontology_definition_{id}"), RetryPolicy::standard(), token, Method::POST, url, Some(payload))
            .await?;

        match result {
            Ok(value) => Ok(value),
            Err(handle) => self.wait_for_operation(&handle, token).await,
        }
    }

    pub async fn update_metadata(
        &self,
        id: &str,
        display_name: Option<&str>,
        description: Option<&str>,
        token: &CancellationToken,
    ) -> Result<OntologyInfo, ClientError> {
        let url = self.workspace_url(&format!("/{id}"));
        let mut payload = serde_json::Map::new();
        if let Some(name) = display_name {
            payload.insert("displayName".to_string(), Value::String(name.to_string()));
        }
        if let Some(description) = description {
            payload.insert("description".to_string(), Value::String(description.to_string()));
        }

        let result = self
            .request_with_resilience(
                &format!("update_ontology_{id}"),
                RetryPolicy::standard(),
                token,
                Method::PATCH,
                url,
                Some(Value::Object(payload)),
            )
            .await?;

        match result {
            Ok(value) => serde_json::from_value(value).map_err(|e| ClientError::OperationFailed(e.to_string())),
            Err(_) => Err(ClientError::OperationFailed("update returned an unexpected long-running response".to_string())),
        }
    }

    pub async fn delete(&self, id: &str, token: &CancellationToken) -> Result<(), ClientError> {
        let url = self.workspace_url(&format!("/{id}"));
        self.request_with_resilience(&format!("delete_ontology_{id}"), RetryPolicy::standard(), token, Method::DELETE, url, None)
            .await?;
        debug!(id, "ontology deleted");
        Ok(())
    }

    pub async fn find_by_name(&self, name: &str, token: &CancellationToken) -> Result<Option<OntologyInfo>, ClientError> {
        let ontologies = self.list(token).await?;
        Ok(ontologies.into_iter().find(|o| o.display_name == name))
    }

    /// Create a new ontology, or update the existing one with the same
    /// display name. §4.M's idempotent upsert entry point.
    pub async fn create_or_update(
        &self,
        display_name: &str,
        description: &str,
        definition: Option<Bundle>,
        token: &CancellationToken,
    ) -> Result<OntologyInfo, ClientError> {
        let safe_name = sanitize_display_name(display_name);
        match self.find_by_name(&safe_name, token).await? {
            Some(existing) => {
                if let Some(definition) = definition {
                    self.update_definition(&existing.id, definition, true, token).await?;
                }
                if existing.description != description {
                    self.update_metadata(&existing.id, Some(&safe_name), Some(description), token).await?;
                }
                self.get(&existing.id, token).await
            }
            None => match self.create(&safe_name, description, definition.clone(), token).await {
                Ok(info) => Ok(info),
                // Lost the create/find race against another caller: the name
                // exists now, so fall back to updating it.
                Err(ClientError::Permanent { ref error_code, .. }) if error_code == "ItemDisplayNameAlreadyInUse" => {
                    let existing = self
                        .find_by_name(&safe_name, token)
                        .await?
                        .ok_or_else(|| ClientError::OperationFailed("name reported in-use but not found by list".to_string()))?;
                    if let Some(definition) = definition {
                        self.update_definition(&existing.id, definition, true, token).await?;
                    }
                    self.get(&existing.id, token).await
                }
                Err(err) => Err(err),
            },
        }
    }

    pub fn rate_limiter_stats(&self) -> Option<rate_limiter::RateLimiterStats> {
        self.rate_limiter.as_ref().map(|l| l.stats())
    }

    pub fn circuit_breaker_state(&self) -> Option<circuit_breaker::CircuitBreakerState> {
        self.breaker.as_ref().map(|b| b.state())
    }

    pub fn reset_circuit_breaker(&self) -> bool {
        match &self.breaker {
            Some(breaker) => {
                breaker.reset();
                true
            }
            None => false,
        }
    }
}
