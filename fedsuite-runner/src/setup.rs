//! One-time preparation of the five instances before the catalog runs

use fedsuite_core::{Result, SuiteConfig};
use fedsuite_harness::factory::NewCommunity;
use fedsuite_harness::{Error, InstanceRegistry, Session};
use futures::future::try_join_all;
use tokio::time::sleep;
use tracing::{debug, info};

/// Peers each instance accepts activities from.
///
/// Instances without an entry accept everyone.
pub const ALLOW_LIST: &[(&str, &[&str])] = &[
    ("alpha", &["beta", "gamma", "delta", "epsilon"]),
    ("beta", &["alpha", "gamma", "delta", "epsilon"]),
    ("gamma", &["alpha", "beta", "delta", "epsilon"]),
    ("delta", &["beta"]),
];

/// Instances that host the shared main community.
pub const MAIN_COMMUNITY_HOSTS: &[&str] = &["alpha", "beta"];

const ALREADY_EXISTS: &str = "community_already_exists";

/// Seed sessions ready for the scenario runner
#[derive(Debug)]
pub struct SuiteSetup {
    pub sessions: Vec<Session>,
    /// Whether this run created any main community
    pub created_main: bool,
}

/// Log in, open the instances for testing and wire up the federation.
///
/// Safe to repeat against long-lived instances: existing allows and main
/// communities are left as they are, and the settle delay only applies
/// when a main community was created by this call.
pub async fn setup_suite(registry: &mut InstanceRegistry, config: &SuiteConfig) -> Result<SuiteSetup> {
    let sessions = registry.login_all(&config.password).await?;

    try_join_all(sessions.iter().map(|s| s.open_for_testing())).await?;
    info!(count = sessions.len(), "Opened registration and lifted rate limits");

    apply_allow_list(registry, &sessions).await?;

    let mut created_main = false;
    for name in MAIN_COMMUNITY_HOSTS {
        let session = find_session(&sessions, name)?;
        created_main |= ensure_main_community(session, &config.setup.main_community).await?;
    }

    if created_main {
        info!(settle = ?config.federation_settle(), "Waiting for federation workers to pick up new peers");
        sleep(config.federation_settle()).await;
    }

    Ok(SuiteSetup {
        sessions,
        created_main,
    })
}

async fn apply_allow_list(registry: &InstanceRegistry, sessions: &[Session]) -> Result<()> {
    for (name, peers) in ALLOW_LIST {
        let Some(session) = sessions.iter().find(|s| s.name() == *name) else {
            debug!(instance = name, "Instance not configured, skipping allow list");
            continue;
        };
        for peer in peers.iter() {
            let Ok(instance) = registry.instance(peer) else {
                debug!(instance = name, peer, "Peer not configured, skipping allow");
                continue;
            };
            session.allow_instance(instance.host()).await?;
        }
        info!(instance = name, peers = peers.len(), "Applied allow list");
    }
    Ok(())
}

/// Create the main community unless it already exists; true if created.
async fn ensure_main_community(session: &Session, name: &str) -> Result<bool> {
    let overrides = NewCommunity {
        name: Some(name.to_string()),
        ..Default::default()
    };
    match session.create_community_with(overrides).await {
        Ok(view) => {
            info!(instance = session.name(), community = %view.community.ap_id, "Created main community");
            Ok(true)
        }
        Err(e) if e.remote_kind().is_some_and(|kind| *kind == ALREADY_EXISTS) => {
            debug!(instance = session.name(), "Main community already exists");
            Ok(false)
        }
        Err(e) => Err(e),
    }
}

fn find_session<'a>(sessions: &'a [Session], name: &str) -> Result<&'a Session> {
    sessions
        .iter()
        .find(|s| s.name() == name)
        .ok_or_else(|| Error::configuration(format!("instance {} is required by the suite", name)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use fedsuite_harness::testing::fake_registry;
    use std::time::Duration;

    #[tokio::test(start_paused = true)]
    async fn test_setup_applies_topology() {
        let (fed, mut registry) = fake_registry(Duration::ZERO);
        let setup = setup_suite(&mut registry, &SuiteConfig::default()).await.unwrap();

        assert_eq!(setup.sessions.len(), 5);
        assert!(setup.created_main);
        assert_eq!(fed.calls("epsilon", "edit_site"), 1);
        assert_eq!(fed.allowed_instances("delta"), vec!["lemmy-beta"]);
        assert_eq!(fed.allowed_instances("alpha").len(), 4);
        assert!(fed.allowed_instances("epsilon").is_empty());

        let alpha = registry.session("alpha").unwrap();
        let main = alpha.get_community_by_name("main").await.unwrap();
        assert!(main.community.local);
    }

    #[tokio::test(start_paused = true)]
    async fn test_setup_is_repeatable() {
        let (fed, mut registry) = fake_registry(Duration::ZERO);
        let config = SuiteConfig::default();
        setup_suite(&mut registry, &config).await.unwrap();

        let again = setup_suite(&mut registry, &config).await.unwrap();
        assert!(!again.created_main);
        assert_eq!(fed.calls("beta", "create_community"), 2);
        assert_eq!(fed.allowed_instances("beta").len(), 4);
    }

    #[tokio::test(start_paused = true)]
    async fn test_settle_delay_only_after_creation() {
        let (_fed, mut registry) = fake_registry(Duration::ZERO);
        let config = SuiteConfig::default();

        let start = tokio::time::Instant::now();
        setup_suite(&mut registry, &config).await.unwrap();
        assert!(start.elapsed() >= config.federation_settle());

        let start = tokio::time::Instant::now();
        setup_suite(&mut registry, &config).await.unwrap();
        assert!(start.elapsed() < config.federation_settle());
    }
}
