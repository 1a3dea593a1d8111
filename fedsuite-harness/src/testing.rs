//! Fixtures backed by the in-memory federation

use crate::registry::InstanceRegistry;
use crate::session::Session;
use fedsuite_client::fake::FakeFederation;
use fedsuite_core::{Instance, SuiteConfig};
use std::collections::HashMap;
use std::time::Duration;

/// Password of every seed user in the default configuration.
pub const SEED_PASSWORD: &str = "lemmylemmy";

/// A fake five-instance federation with a registry wired to it.
pub fn fake_registry(delay: Duration) -> (FakeFederation, InstanceRegistry) {
    let config = SuiteConfig::default();
    let federation = FakeFederation::from_config(&config)
        .expect("default config builds a fake federation")
        .with_propagation_delay(delay);
    let mut registry = InstanceRegistry::new();
    for instance in &config.instances {
        let parsed = Instance::from_config(instance).expect("default instance config is valid");
        registry
            .register(parsed, federation.instance(&instance.name))
            .expect("default instance names are unique");
    }
    (federation, registry)
}

/// Logged-in seed sessions keyed by instance name.
pub async fn fake_sessions(delay: Duration) -> (FakeFederation, HashMap<String, Session>) {
    let (federation, mut registry) = fake_registry(delay);
    let sessions = registry
        .login_all(SEED_PASSWORD)
        .await
        .expect("seed users log in");
    let sessions = sessions
        .into_iter()
        .map(|s| (s.name().to_string(), s))
        .collect();
    (federation, sessions)
}
