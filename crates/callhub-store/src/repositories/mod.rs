pub mod agents;
pub mod batches;
pub mod call_logs;
pub mod features;
pub mod ledger;
pub mod numbers;
pub mod plans;
pub mod tenants;
pub mod voices;
pub mod wallets;
