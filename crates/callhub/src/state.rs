//! Composition root: wires the repositories and service-layer collaborators
//! into the single `AppState` axum hands to every handler.

use std::sync::Arc;

use callhub_core::config::AppConfig;
use callhub_store::PgPool;

use crate::batch::BatchCoordinator;
use crate::credit::CreditLedger;
use crate::dispatch::CallDispatcher;
use crate::features::FeatureResolver;
use crate::policy::PolicyGate;
use crate::provider::{HttpProvider, Provider, ProviderRouter};
use crate::stream::StreamHub;

#[derive(Clone)]
pub struct AppState {
    pub pool: PgPool,
    pub config: Arc<AppConfig>,
    pub features: Arc<FeatureResolver>,
    pub credit: Arc<CreditLedger>,
    pub policy: Arc<PolicyGate>,
    pub providers: Arc<ProviderRouter>,
    pub dispatcher: Arc<CallDispatcher>,
    pub batches: Arc<BatchCoordinator>,
    pub stream: Arc<StreamHub>,
}

impl AppState {
    pub fn new(pool: PgPool, config: AppConfig) -> Self {
        let config = Arc::new(config);
        let features = Arc::new(FeatureResolver::new(pool.clone(), config.feature_cache_ttl));
        let credit = Arc::new(CreditLedger::new(pool.clone()));
        let policy = Arc::new(PolicyGate::new(
            pool.clone(),
            features.clone(),
            credit.clone(),
            config.business_hours.clone(),
            config.business_hours_kill_switch,
        ));

        let provider_list: Vec<Arc<dyn Provider>> = vec![
            Arc::new(HttpProvider::new("default", "https://provider.example.invalid")),
            Arc::new(HttpProvider::new("vapi", "https://vapi.example.invalid")),
            Arc::new(HttpProvider::new("legacy", "https://legacy-provider.example.invalid")),
        ];
        let providers = Arc::new(ProviderRouter::new(
            provider_list,
            "default".to_string(),
            config.provider_temporary_disable.clone(),
        ));

        let dispatcher = Arc::new(CallDispatcher::new(pool.clone(), credit.clone(), providers.clone()));
        let batches = Arc::new(BatchCoordinator::new(
            pool.clone(),
            dispatcher.clone(),
            config.batch_max_parallel_per_batch,
        ));
        let stream = Arc::new(StreamHub::new());

        AppState {
            pool,
            config,
            features,
            credit,
            policy,
            providers,
            dispatcher,
            batches,
            stream,
        }
    }
}

