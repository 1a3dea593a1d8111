//! Scenario catalog
//!
//! Each module contributes scenarios for one area of federation. Bodies
//! are plain async functions over a [`ScenarioContext`]; follows go
//! through the context so they are undone after the scenario.

use fedsuite_core::views::{CommunityView, Post, PostView};
use fedsuite_harness::{Error, Result, Scenario, ScenarioContext, ScenarioFn, Session};
use std::time::Duration;

mod comment;
mod community;
mod post;
mod private_community;
mod private_message;
mod remote_home_remote;
mod tags;
mod user;

/// Budget per scenario; covers a relay wait plus the follows around it.
pub const SCENARIO_TIMEOUT: Duration = Duration::from_secs(120);

/// Every scenario, in execution order.
pub fn catalog() -> Vec<Scenario> {
    [
        community::scenarios(),
        post::scenarios(),
        comment::scenarios(),
        private_community::scenarios(),
        private_message::scenarios(),
        user::scenarios(),
        tags::scenarios(),
        remote_home_remote::scenarios(),
    ]
    .into_iter()
    .flatten()
    .collect()
}

fn scenario(id: &str, name: &str, description: &str, body: ScenarioFn) -> Scenario {
    Scenario::new(id, name, description, SCENARIO_TIMEOUT, body)
}

/// The main community hosted on `home`, as seen from `session`.
async fn main_community_on(ctx: &ScenarioContext, session: &Session, home: &str) -> Result<CommunityView> {
    if session.name() == home {
        return session.get_community_by_name(ctx.main_community()).await;
    }
    let home = ctx.session(home)?;
    let locator = home.instance().community_locator(ctx.main_community());
    ctx.waiter()
        .wait_for_some(
            &format!("{} resolves {}", session, locator),
            || session.resolve_community(locator.clone()),
            |_| true,
        )
        .await
}

/// Beta's main community as seen from `session`.
async fn beta_main(ctx: &ScenarioContext, session: &Session) -> Result<CommunityView> {
    main_community_on(ctx, session, "beta").await
}

/// Wait until `session`'s instance holds its own copy of `post`.
async fn wait_for_post(ctx: &ScenarioContext, session: &Session, post: &Post) -> Result<PostView> {
    ctx.waiter()
        .wait_for_some(
            &format!("post {} reaches {}", post.ap_id, session.name()),
            || session.find_local_post(post),
            |_| true,
        )
        .await
}

/// Require that `result` was rejected with the remote error `kind`.
fn expect_rejection<T>(result: Result<T>, kind: &str) -> Result<Error> {
    match result {
        Ok(_) => Err(Error::assertion(format!(
            "expected a {} rejection, but the call succeeded",
            kind
        ))),
        Err(e) if e.remote_kind().is_some_and(|k| *k == kind) => Ok(e),
        Err(e) => Err(Error::assertion(format!(
            "expected a {} rejection, got: {}",
            kind, e
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_catalog_ids_are_unique_and_tagged() {
        let scenarios = catalog();
        let ids: HashSet<&str> = scenarios.iter().map(|s| s.id.as_str()).collect();
        assert_eq!(ids.len(), scenarios.len());
        assert!(scenarios.iter().all(|s| !s.tags.is_empty()));
        assert!(scenarios.iter().all(|s| s.timeout == SCENARIO_TIMEOUT));
    }

    #[test]
    fn test_relay_bugs_are_known_failures() {
        let known: Vec<String> = catalog()
            .into_iter()
            .filter(|s| s.expectation != fedsuite_harness::Expectation::Pass)
            .map(|s| s.id)
            .collect();
        assert_eq!(
            known,
            vec!["remote_feature_relayed", "remote_distinguish_relayed"]
        );
    }

    #[test]
    fn test_expect_rejection() {
        let rejected: Result<()> = Err(Error::from_remote("create_comment", 400, "locked"));
        assert!(expect_rejection(rejected, "locked").is_ok());

        let other: Result<()> = Err(Error::from_remote("create_comment", 400, "deleted"));
        let err = expect_rejection(other, "locked").unwrap_err();
        assert_eq!(err.category(), "assertion");

        assert!(expect_rejection(Ok(()), "locked").is_err());
    }
}
