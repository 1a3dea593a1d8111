//! End-to-end harness flows against the in-memory federation

use fedsuite_client::fake::FakeFederation;
use fedsuite_core::views::CommunityVisibility;
use fedsuite_core::{Instance, SubscribedType, SuiteConfig};
use fedsuite_harness::factory::NewCommunity;
use fedsuite_harness::{ConvergenceWaiter, InstanceRegistry, Session, TeardownScope};
use std::collections::HashMap;
use std::time::Duration;

async fn federation(delay: Duration) -> (FakeFederation, HashMap<String, Session>) {
    let config = SuiteConfig::default();
    let federation = FakeFederation::from_config(&config)
        .unwrap()
        .with_propagation_delay(delay);
    let mut registry = InstanceRegistry::new();
    for instance in &config.instances {
        registry
            .register(
                Instance::from_config(instance).unwrap(),
                federation.instance(&instance.name),
            )
            .unwrap();
    }
    let sessions = registry
        .login_all(&config.password)
        .await
        .unwrap()
        .into_iter()
        .map(|s| (s.name().to_string(), s))
        .collect();
    (federation, sessions)
}

fn waiter() -> ConvergenceWaiter {
    ConvergenceWaiter::new(Duration::from_millis(500), Duration::from_secs(10))
}

#[tokio::test(start_paused = true)]
async fn test_main_community_shows_posts_only_after_subscription() {
    let (_fed, sessions) = federation(Duration::from_secs(2)).await;
    let alpha = &sessions["alpha"];
    let beta = &sessions["beta"];

    let main = alpha
        .create_community_with(NewCommunity {
            name: Some("main".to_string()),
            ..Default::default()
        })
        .await
        .unwrap();
    alpha.create_post(main.community.id).await.unwrap();

    let locator = alpha.instance().community_locator("main");
    assert_eq!(locator.to_string(), "!main@lemmy-alpha:8541");
    let on_beta = waiter()
        .wait_for_some(
            "main reaches beta",
            || beta.resolve_community(locator.clone()),
            |_| true,
        )
        .await
        .unwrap();
    assert_eq!(on_beta.post_count(), 0);

    let mut scope = TeardownScope::new(waiter(), Duration::from_secs(2));
    let followed = scope.follow(beta, on_beta.community.id).await.unwrap();
    assert_eq!(followed.subscribed(), SubscribedType::Subscribed);

    let post = alpha.create_post(main.community.id).await.unwrap();
    let arrived = waiter()
        .wait_for_some(
            "post pushed to beta",
            || beta.find_local_post(&post.post),
            |_| true,
        )
        .await
        .unwrap();
    assert_eq!(arrived.post.ap_id, post.post.ap_id);
    assert_eq!(arrived.post.name, post.post.name);

    scope.release().await.unwrap();
}

#[tokio::test(start_paused = true)]
async fn test_private_community_follow_needs_approval() {
    let (_fed, sessions) = federation(Duration::from_secs(1)).await;
    let alpha = &sessions["alpha"];
    let user = sessions["beta"].register_user().await.unwrap();

    let community = alpha
        .create_community_with(NewCommunity {
            visibility: Some(CommunityVisibility::Private),
            ..Default::default()
        })
        .await
        .unwrap();
    let post = alpha.create_post(community.community.id).await.unwrap();

    let on_beta = waiter()
        .wait_for_some(
            "private community reaches beta",
            || user.resolve_community(&community.community.ap_id),
            |_| true,
        )
        .await
        .unwrap();

    let hidden = user.resolve_post(&post.post.ap_id).await.unwrap_err();
    assert!(hidden.is_not_found());

    let mut scope = TeardownScope::new(waiter(), Duration::from_secs(2));
    let requested = scope.follow(&user, on_beta.community.id).await.unwrap();
    assert!(requested.subscribed().is_awaiting());
    assert_eq!(alpha.pending_follows_count().await.unwrap(), 1);

    let pending = alpha.list_pending_follows().await.unwrap();
    alpha
        .approve_pending_follow(community.community.id, pending.items[0].person.id, true)
        .await
        .unwrap();
    let approved = scope.await_approval(&user, on_beta.community.id).await.unwrap();
    assert_eq!(approved.subscribed(), SubscribedType::Subscribed);

    let visible = waiter()
        .wait_for_some(
            "private post readable after approval",
            || user.resolve_post(&post.post.ap_id),
            |_| true,
        )
        .await
        .unwrap();
    assert_eq!(visible.post.ap_id, post.post.ap_id);

    scope.release().await.unwrap();
}
