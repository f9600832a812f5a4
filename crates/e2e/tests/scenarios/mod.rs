//! Scenario sets, one module per feature area

pub mod admin;
pub mod agents;
pub mod auth;
pub mod chat;
pub mod errors;
pub mod knowledge;
pub mod network;
pub mod performance;
pub mod sessions;

use chrono::Utc;
use workbench_e2e::Scenario;

/// Every scenario, in registration order
pub fn all() -> Vec<Scenario> {
    let mut scenarios = Vec::new();
    scenarios.extend(auth::scenarios());
    scenarios.extend(chat::scenarios());
    scenarios.extend(agents::scenarios());
    scenarios.extend(knowledge::scenarios());
    scenarios.extend(sessions::scenarios());
    scenarios.extend(admin::scenarios());
    scenarios.extend(performance::scenarios());
    scenarios.extend(errors::scenarios());
    scenarios.extend(network::scenarios());
    scenarios
}

/// Name that will not collide with earlier runs against the same backend
pub fn unique(prefix: &str) -> String {
    format!("{}_{}", prefix, Utc::now().format("%m%d%H%M%S%3f"))
}
