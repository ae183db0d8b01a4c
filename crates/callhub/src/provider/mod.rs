//! ProviderRouter (§4.5): routes a call to the telephony provider that owns
//! the target voice agent, behind the async-trait `Provider` contract the
//! teacher uses for its transport backends (`Service`-style trait objects
//! rather than an enum, since new providers are added without touching the
//! dispatcher).

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value as Json;

use callhub_core::ids::AgentRef;
use callhub_core::AppError;

#[derive(Clone, Debug)]
pub struct PlaceCallRequest {
    pub idempotency_key: String,
    pub agent: AgentRef,
    pub from_e164: Option<String>,
    pub to_e164: String,
    pub metadata: Json,
}

#[derive(Clone, Debug)]
pub struct PlaceCallResponse {
    pub provider_call_id: String,
    pub raw: Json,
}

#[derive(Clone, Debug)]
pub struct CallStatusResponse {
    pub status: String,
    pub duration_seconds: Option<i32>,
    pub recording_url: Option<String>,
    pub raw: Json,
}

/// A remote telephony backend. Implementations talk HTTP (or whatever
/// transport the backend needs); the dispatcher only sees this contract.
#[async_trait]
pub trait Provider: Send + Sync {
    fn name(&self) -> &str;
    async fn place_call(&self, req: PlaceCallRequest) -> Result<PlaceCallResponse, AppError>;
    async fn get_call_status(&self, provider_call_id: &str) -> Result<CallStatusResponse, AppError>;
    async fn cancel_call(&self, provider_call_id: &str) -> Result<(), AppError>;
}

/// Picks the provider that owns `agent`, honoring the reserved agent-id
/// literals (`"24"` routes to the legacy provider, `"VAPI"` to the VAPI
/// backend) before falling back to the tenant's configured default, and
/// skipping providers named in `provider_temporary_disable`.
pub struct ProviderRouter {
    providers: Vec<Arc<dyn Provider>>,
    default_provider: String,
    temporarily_disabled: HashSet<String>,
}

impl ProviderRouter {
    pub fn new(
        providers: Vec<Arc<dyn Provider>>,
        default_provider: String,
        temporarily_disabled: HashSet<String>,
    ) -> Self {
        ProviderRouter { providers, default_provider, temporarily_disabled }
    }

    pub fn route(&self, agent: &AgentRef) -> Result<Arc<dyn Provider>, AppError> {
        let target_name = match agent {
            AgentRef::Named(name) if name == "VAPI" => "vapi",
            AgentRef::Numeric(24) => "legacy",
            _ => self.default_provider.as_str(),
        };

        self.providers
            .iter()
            .find(|p| p.name() == target_name && !self.temporarily_disabled.contains(p.name()))
            .cloned()
            .ok_or(AppError::NoProvider)
    }
}

/// HTTP-backed provider used in production. Talks a generic "start call"
/// REST contract; concrete backends that deviate get their own
/// implementation alongside this one.
pub struct HttpProvider {
    name: String,
    base_url: String,
    client: reqwest::Client,
}

impl HttpProvider {
    pub fn new(name: impl Into<String>, base_url: impl Into<String>) -> Self {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .expect("reqwest client config is static and valid");
        HttpProvider { name: name.into(), base_url: base_url.into(), client }
    }
}

#[async_trait]
impl Provider for HttpProvider {
    fn name(&self) -> &str {
        &self.name
    }

    async fn place_call(&self, req: PlaceCallRequest) -> Result<PlaceCallResponse, AppError> {
        let url = format!("{}/calls", self.base_url);
        let response = self
            .client
            .post(&url)
            .header("idempotency-key", &req.idempotency_key)
            .json(&serde_json::json!({
                "agent": req.agent.to_string(),
                "from": req.from_e164,
                "to": req.to_e164,
                "metadata": req.metadata,
            }))
            .send()
            .await
            .map_err(|e| AppError::ProviderFailed { message: e.to_string(), upstream_detail: None })?;

        if !response.status().is_success() {
            let status = response.status();
            let body: Json = response.json().await.unwrap_or(Json::Null);
            return Err(AppError::ProviderFailed {
                message: format!("provider {} returned {}", self.name, status),
                upstream_detail: Some(body),
            });
        }

        let body: Json = response
            .json()
            .await
            .map_err(|e| AppError::ProviderFailed { message: e.to_string(), upstream_detail: None })?;
        let provider_call_id = body
            .get("id")
            .and_then(Json::as_str)
            .ok_or_else(|| AppError::ProviderFailed {
                message: "provider response missing call id".to_string(),
                upstream_detail: Some(body.clone()),
            })?
            .to_string();

        Ok(PlaceCallResponse { provider_call_id, raw: body })
    }

    async fn get_call_status(&self, provider_call_id: &str) -> Result<CallStatusResponse, AppError> {
        let url = format!("{}/calls/{}", self.base_url, provider_call_id);
        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| AppError::ProviderFailed { message: e.to_string(), upstream_detail: None })?;
        let body: Json = response
            .json()
            .await
            .map_err(|e| AppError::ProviderFailed { message: e.to_string(), upstream_detail: None })?;

        Ok(CallStatusResponse {
            status: body.get("status").and_then(Json::as_str).unwrap_or("unknown").to_string(),
            duration_seconds: body.get("duration_seconds").and_then(Json::as_i64).map(|v| v as i32),
            recording_url: body.get("recording_url").and_then(Json::as_str).map(str::to_string),
            raw: body,
        })
    }

    async fn cancel_call(&self, provider_call_id: &str) -> Result<(), AppError> {
        let url = format!("{}/calls/{}/cancel", self.base_url, provider_call_id);
        let response = self
            .client
            .post(&url)
            .send()
            .await
            .map_err(|e| AppError::ProviderFailed { message: e.to_string(), upstream_detail: None })?;
        if !response.status().is_success() {
            return Err(AppError::ProviderFailed {
                message: format!("provider {} refused cancel", self.name),
                upstream_detail: None,
            });
        }
        Ok(())
    }
}

#[cfg(test)]
pub mod mock {
    use super::*;
    use std::sync::Mutex;

    /// In-memory provider double for dispatcher/batch tests.
    pub struct MockProvider {
        pub name: String,
        pub calls: Mutex<Vec<PlaceCallRequest>>,
        pub fail_next: std::sync::atomic::AtomicBool,
    }

    impl MockProvider {
        pub fn new(name: impl Into<String>) -> Self {
            MockProvider {
                name: name.into(),
                calls: Mutex::new(Vec::new()),
                fail_next: std::sync::atomic::AtomicBool::new(false),
            }
        }
    }

    #[async_trait]
    impl Provider for MockProvider {
        fn name(&self) -> &str {
            &self.name
        }

        async fn place_call(&self, req: PlaceCallRequest) -> Result<PlaceCallResponse, AppError> {
            if self.fail_next.swap(false, std::sync::atomic::Ordering::SeqCst) {
                return Err(AppError::ProviderFailed { message: "mock failure".into(), upstream_detail: None });
            }
            let id = format!("mock-{}", self.calls.lock().unwrap().len());
            self.calls.lock().unwrap().push(req);
            Ok(PlaceCallResponse { provider_call_id: id, raw: Json::Null })
        }

        async fn get_call_status(&self, provider_call_id: &str) -> Result<CallStatusResponse, AppError> {
            Ok(CallStatusResponse {
                status: "in-progress".to_string(),
                duration_seconds: None,
                recording_url: None,
                raw: Json::String(provider_call_id.to_string()),
            })
        }

        async fn cancel_call(&self, _provider_call_id: &str) -> Result<(), AppError> {
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::mock::MockProvider;
    use super::*;

    fn router() -> ProviderRouter {
        let providers: Vec<Arc<dyn Provider>> = vec![
            Arc::new(MockProvider::new("default")),
            Arc::new(MockProvider::new("vapi")),
            Arc::new(MockProvider::new("legacy")),
        ];
        ProviderRouter::new(providers, "default".to_string(), HashSet::new())
    }

    #[test]
    fn routes_named_vapi_agent_to_vapi_provider() {
        let r = router();
        let provider = r.route(&AgentRef::Named("VAPI".to_string())).unwrap();
        assert_eq!(provider.name(), "vapi");
    }

    #[test]
    fn routes_reserved_numeric_agent_24_to_legacy_provider() {
        let r = router();
        let provider = r.route(&AgentRef::Numeric(24)).unwrap();
        assert_eq!(provider.name(), "legacy");
    }

    #[test]
    fn routes_ordinary_agent_to_default_provider() {
        let r = router();
        let provider = r.route(&AgentRef::Numeric(1001)).unwrap();
        assert_eq!(provider.name(), "default");
    }

    #[test]
    fn temporarily_disabled_default_provider_yields_no_provider() {
        let providers: Vec<Arc<dyn Provider>> = vec![Arc::new(MockProvider::new("default"))];
        let mut disabled = HashSet::new();
        disabled.insert("default".to_string());
        let r = ProviderRouter::new(providers, "default".to_string(), disabled);
        assert!(matches!(r.route(&AgentRef::Numeric(5)), Err(AppError::NoProvider)));
    }
}
