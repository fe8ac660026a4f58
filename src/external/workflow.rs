//! Client for the external workflow (form approval) tool.
//!
//! Only two operations are consumed: searching a form instance by the order's
//! business key and pushing a sparse update to an instance. Every failure mode
//! (transport error, non-2xx status, or a 2xx body reporting `success: false`)
//! is normalised to [`WorkflowError`].

use crate::common::errors::BusinessError;
use crate::config::Config;
use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use serde::Deserialize;
use serde_json::{Map, Value, json};
use std::future::Future;
use tokio::sync::Mutex;

/// Name of the business-key field searched on the workflow form
pub const BUSINESS_KEY_FIELD: &str = "OrderId";

#[derive(Debug, Clone, PartialEq)]
pub struct ExternalRecord {
    pub instance_id: String,
    pub form_data: Map<String, Value>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WorkflowError {
    Upstream(String),
    Timeout(String),
}

impl std::fmt::Display for WorkflowError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            WorkflowError::Upstream(msg) => write!(f, "upstream error: {msg}"),
            WorkflowError::Timeout(msg) => write!(f, "upstream timeout: {msg}"),
        }
    }
}

impl std::error::Error for WorkflowError {}

impl From<WorkflowError> for BusinessError {
    fn from(err: WorkflowError) -> Self {
        match err {
            WorkflowError::Upstream(message) => BusinessError::UpstreamError { message },
            WorkflowError::Timeout(message) => BusinessError::UpstreamTimeout { message },
        }
    }
}

impl From<reqwest::Error> for WorkflowError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            WorkflowError::Timeout(err.to_string())
        } else {
            WorkflowError::Upstream(err.to_string())
        }
    }
}

#[async_trait]
pub trait WorkflowClient: Send + Sync {
    /// Find the form instance whose business key equals `business_key`.
    async fn fetch_by_business_key(
        &self,
        business_key: &str,
    ) -> Result<Option<ExternalRecord>, WorkflowError>;

    /// Push a sparse map of workflow field name to new value.
    async fn update_instance(
        &self,
        instance_id: &str,
        fields: Map<String, Value>,
    ) -> Result<(), WorkflowError>;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CachedToken {
    pub value: String,
    pub expires_at: DateTime<Utc>,
}

/// Access-token cache owned by one client instance.
pub struct TokenCache {
    slot: Mutex<Option<CachedToken>>,
    /// Tokens this close to expiry are refreshed early
    skew: Duration,
}

impl Default for TokenCache {
    fn default() -> Self {
        Self::new(Duration::seconds(60))
    }
}

impl TokenCache {
    pub fn new(skew: Duration) -> Self {
        Self {
            slot: Mutex::new(None),
            skew,
        }
    }

    /// Return the cached token, calling `refresh` when it is missing or about to expire.
    /// The lock is held across the refresh so concurrent callers share one fetch.
    pub async fn get_or_refresh<F, Fut>(
        &self,
        now: DateTime<Utc>,
        refresh: F,
    ) -> Result<String, WorkflowError>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<CachedToken, WorkflowError>>,
    {
        let mut slot = self.slot.lock().await;
        if let Some(token) = slot.as_ref() {
            if token.expires_at - self.skew > now {
                return Ok(token.value.clone());
            }
        }
        let fresh = refresh().await?;
        let value = fresh.value.clone();
        *slot = Some(fresh);
        Ok(value)
    }

    pub async fn invalidate(&self) {
        *self.slot.lock().await = None;
    }
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct TokenResponse {
    access_token: String,
    expire_in: i64,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct Envelope<T> {
    #[serde(default)]
    success: bool,
    #[serde(default)]
    error_msg: Option<String>,
    data: Option<T>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct InstanceData {
    form_instance_id: String,
    #[serde(default)]
    form_data: Map<String, Value>,
}

pub struct HttpWorkflowClient {
    client: reqwest::Client,
    base_url: String,
    app_key: String,
    app_secret: String,
    form_id: String,
    tokens: TokenCache,
}

impl HttpWorkflowClient {
    pub fn new(config: &Config) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(config.workflow_timeout_secs))
            .build()?;
        Ok(Self {
            client,
            base_url: config.workflow_api_url.trim_end_matches('/').to_string(),
            app_key: config.workflow_app_key.clone(),
            app_secret: config.workflow_app_secret.clone(),
            form_id: config.workflow_form_id.clone(),
            tokens: TokenCache::default(),
        })
    }

    async fn request_token(&self) -> Result<CachedToken, WorkflowError> {
        let body = json!({ "appKey": self.app_key, "appSecret": self.app_secret });
        let response = self
            .client
            .post(format!("{}/v1/oauth2/accessToken", self.base_url))
            .json(&body)
            .send()
            .await?;
        if !response.status().is_success() {
            return Err(WorkflowError::Upstream(format!(
                "token request returned HTTP {}",
                response.status()
            )));
        }
        let token: TokenResponse = response.json().await?;
        Ok(CachedToken {
            value: token.access_token,
            expires_at: Utc::now() + Duration::seconds(token.expire_in),
        })
    }

    async fn access_token(&self) -> Result<String, WorkflowError> {
        self.tokens
            .get_or_refresh(Utc::now(), || self.request_token())
            .await
    }

    async fn post<T: for<'de> Deserialize<'de> + Send>(
        &self,
        path: &str,
        body: &Value,
    ) -> Result<Option<T>, WorkflowError> {
        let token = self.access_token().await?;
        let response = self
            .client
            .post(format!("{}{path}", self.base_url))
            .bearer_auth(&token)
            .json(body)
            .send()
            .await?;

        let status = response.status();
        if status == reqwest::StatusCode::UNAUTHORIZED {
            self.tokens.invalidate().await;
        }
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(WorkflowError::Upstream(format!("HTTP {status}: {text}")));
        }

        let envelope: Envelope<T> = response.json().await?;
        if !envelope.success {
            return Err(WorkflowError::Upstream(
                envelope
                    .error_msg
                    .unwrap_or_else(|| "workflow tool reported failure".to_string()),
            ));
        }
        Ok(envelope.data)
    }
}

#[async_trait]
impl WorkflowClient for HttpWorkflowClient {
    async fn fetch_by_business_key(
        &self,
        business_key: &str,
    ) -> Result<Option<ExternalRecord>, WorkflowError> {
        let body = json!({
            "formId": self.form_id,
            "searchCondition": [
                { "key": BUSINESS_KEY_FIELD, "value": business_key, "operator": "eq" }
            ],
            "pageSize": 1,
        });
        let data: Option<Vec<InstanceData>> = self.post("/v1/forms/instances/search", &body).await?;
        tracing::debug!(business_key, "workflow search completed");

        Ok(data
            .unwrap_or_default()
            .into_iter()
            .next()
            .map(|instance| ExternalRecord {
                instance_id: instance.form_instance_id,
                form_data: instance.form_data,
            }))
    }

    async fn update_instance(
        &self,
        instance_id: &str,
        fields: Map<String, Value>,
    ) -> Result<(), WorkflowError> {
        let body = json!({
            "formId": self.form_id,
            "formInstanceId": instance_id,
            "updateFormDataJson": Value::Object(fields),
        });
        let _: Option<Value> = self.post("/v1/forms/instances/update", &body).await?;
        Ok(())
    }
}

/// Workflow double used by the service and HTTP tests.
#[cfg(test)]
#[derive(Default)]
pub struct InMemoryWorkflowClient {
    pub records: std::sync::Mutex<std::collections::HashMap<String, ExternalRecord>>,
    pub pushed: std::sync::Mutex<Vec<(String, Map<String, Value>)>>,
    pub fetch_failure: std::sync::Mutex<Option<WorkflowError>>,
    pub update_failure: std::sync::Mutex<Option<WorkflowError>>,
    pub fetch_calls: std::sync::atomic::AtomicUsize,
}

#[cfg(test)]
impl InMemoryWorkflowClient {
    pub fn insert(&self, business_key: &str, instance_id: &str, form_data: Value) {
        let form_data = match form_data {
            Value::Object(map) => map,
            _ => Map::new(),
        };
        self.records.lock().unwrap().insert(
            business_key.to_string(),
            ExternalRecord {
                instance_id: instance_id.to_string(),
                form_data,
            },
        );
    }

    pub fn fetch_count(&self) -> usize {
        self.fetch_calls.load(std::sync::atomic::Ordering::SeqCst)
    }
}

#[cfg(test)]
#[async_trait]
impl WorkflowClient for InMemoryWorkflowClient {
    async fn fetch_by_business_key(
        &self,
        business_key: &str,
    ) -> Result<Option<ExternalRecord>, WorkflowError> {
        self.fetch_calls
            .fetch_add(1, std::sync::atomic::Ordering::SeqCst);
        if let Some(err) = self.fetch_failure.lock().unwrap().clone() {
            return Err(err);
        }
        Ok(self.records.lock().unwrap().get(business_key).cloned())
    }

    async fn update_instance(
        &self,
        instance_id: &str,
        fields: Map<String, Value>,
    ) -> Result<(), WorkflowError> {
        if let Some(err) = self.update_failure.lock().unwrap().clone() {
            return Err(err);
        }
        let mut records = self.records.lock().unwrap();
        if let Some(record) = records
            .values_mut()
            .find(|record| record.instance_id == instance_id)
        {
            for (key, value) in &fields {
                record.form_data.insert(key.clone(), value.clone());
            }
        }
        self.pushed
            .lock()
            .unwrap()
            .push((instance_id.to_string(), fields));
        Ok(())
    }
}
