//! The full catalog against the in-memory federation

use fedsuite_core::SuiteConfig;
use fedsuite_harness::teardown::suite_teardown;
use fedsuite_harness::testing::fake_registry;
use fedsuite_harness::{ConvergenceWaiter, Expectation, ScenarioFilter, ScenarioRunner, Verdict};
use fedsuite_runner::{catalog, setup_suite};
use std::time::Duration;

#[tokio::test(start_paused = true)]
async fn test_catalog_passes_on_consistent_federation() {
    let (_fed, mut registry) = fake_registry(Duration::from_secs(1));
    let config = SuiteConfig::default();
    let setup = setup_suite(&mut registry, &config).await.unwrap();

    let mut runner = ScenarioRunner::new(setup.sessions.clone(), &config);
    runner.add_scenarios(catalog());
    let suite = runner.run(&ScenarioFilter::default()).await;
    assert_eq!(suite.results.len(), catalog().len());

    for result in &suite.results {
        let expected = match result.expectation {
            Expectation::Pass => Verdict::Passed,
            // The fake relays every flag, so known relay bugs do not reproduce.
            Expectation::KnownFailure { .. } => Verdict::UnexpectedPass,
        };
        assert_eq!(
            result.verdict, expected,
            "{}: {:?}",
            result.id, result.error_message
        );
    }
    assert_eq!(suite.count(Verdict::UnexpectedPass), 2);
    assert_eq!(suite.exit_code(), 1);

    for session in &setup.sessions {
        let me = session.my_user().await.unwrap();
        assert_eq!(me.remote_follows().count(), 0, "{} kept a follow", session);
    }

    let waiter = ConvergenceWaiter::propagation(&config);
    assert!(suite_teardown(&waiter, &setup.sessions).await.is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_tag_filter_selects_private_community_scenarios() {
    let (_fed, mut registry) = fake_registry(Duration::from_secs(1));
    let config = SuiteConfig::default();
    let setup = setup_suite(&mut registry, &config).await.unwrap();

    let mut runner = ScenarioRunner::new(setup.sessions, &config);
    runner.add_scenarios(catalog());
    let suite = runner
        .run(&ScenarioFilter {
            tags: vec!["private_community".to_string()],
            ..Default::default()
        })
        .await;

    assert_eq!(suite.results.len(), 4);
    assert!(suite.results.iter().all(|r| r.verdict == Verdict::Passed));
    assert!(suite.is_success());
    assert_eq!(suite.by_tag("follow").len(), 2);
}
