//! Follow edges and their reversal
//!
//! Follows are the only cross-instance state a scenario leaves behind that
//! changes what later scenarios observe, so each one is recorded in a
//! [`TeardownScope`] and undone after the scenario body finishes, whatever
//! its outcome.

use crate::session::Session;
use crate::waiter::ConvergenceWaiter;
use fedsuite_core::views::{CommunityView, CommunityVisibility, MyUserInfo};
use fedsuite_core::{CommunityId, Error, FollowTracker, Result, SubscribedType, SuiteConfig};
use futures::future::join_all;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::time::sleep;
use tracing::{debug, info, warn};

/// One session following one community.
///
/// Every state fetched through the edge is fed to its [`FollowTracker`], so
/// a follow that moves backwards fails the wait that observed it.
#[derive(Debug, Clone)]
pub struct FollowEdge {
    pub session: Session,
    pub community_id: CommunityId,
    tracker: Arc<Mutex<FollowTracker>>,
}

impl FollowEdge {
    fn new(session: &Session, community_id: CommunityId, tracker: FollowTracker) -> Self {
        Self {
            session: session.clone(),
            community_id,
            tracker: Arc::new(Mutex::new(tracker)),
        }
    }

    fn is_for(&self, session: &Session, community_id: CommunityId) -> bool {
        self.community_id == community_id
            && self.session.name() == session.name()
            && self.session.username() == session.username()
    }

    /// States observed so far, oldest first.
    pub fn history(&self) -> Vec<SubscribedType> {
        self.tracker
            .lock()
            .map(|t| t.history().to_vec())
            .unwrap_or_default()
    }

    fn observe(&self, state: SubscribedType) -> Result<()> {
        self.tracker
            .lock()
            .map_err(|_| Error::Internal("follow tracker lock poisoned".to_string()))?
            .observe(state)
    }

    /// Live fetch of the follower's view of the community.
    async fn poll(&self) -> Result<CommunityView> {
        let view = self.session.get_community(self.community_id).await?;
        self.observe(view.subscribed())?;
        Ok(view)
    }
}

pub struct TeardownScope {
    waiter: ConvergenceWaiter,
    follow_recheck: Duration,
    edges: Vec<FollowEdge>,
}

impl TeardownScope {
    pub fn new(waiter: ConvergenceWaiter, follow_recheck: Duration) -> Self {
        Self {
            waiter,
            follow_recheck,
            edges: Vec::new(),
        }
    }

    pub fn from_config(config: &SuiteConfig) -> Self {
        Self::new(ConvergenceWaiter::propagation(config), config.follow_recheck())
    }

    pub fn edges(&self) -> &[FollowEdge] {
        &self.edges
    }

    fn edge(&self, session: &Session, community_id: CommunityId) -> Result<FollowEdge> {
        self.edges
            .iter()
            .rev()
            .find(|edge| edge.is_for(session, community_id))
            .cloned()
            .ok_or_else(|| {
                Error::configuration(format!(
                    "{} has no recorded follow of community {}",
                    session, community_id
                ))
            })
    }

    /// Follow a community and wait for the follower's instance to settle.
    ///
    /// Public communities settle at `Subscribed`. Private ones settle once
    /// the request awaits approval; the moderator's decision is observed
    /// separately. The edge is recorded before waiting so it is released
    /// even when the wait times out.
    pub async fn follow(&mut self, session: &Session, community_id: CommunityId) -> Result<CommunityView> {
        let mut tracker = FollowTracker::new();
        tracker.request();
        let sent = session.send_follow(community_id, true).await?;
        let edge = FollowEdge::new(session, community_id, tracker);
        self.edges.push(edge.clone());
        edge.observe(sent.subscribed())?;

        let private = sent.community.visibility == CommunityVisibility::Private;
        let settled = self
            .waiter
            .wait_until(
                &format!("{} follows community {}", session, community_id),
                || edge.poll(),
                |view| {
                    let state = view.subscribed();
                    state == SubscribedType::Subscribed || (private && state.is_awaiting())
                },
            )
            .await?;

        if settled.subscribed() == SubscribedType::Subscribed {
            // The server re-reads its follower list on a fixed interval.
            sleep(self.follow_recheck).await;
        }
        info!(session = %session, community = %community_id, state = %settled.subscribed(), "Follow settled");
        Ok(settled)
    }

    /// Wait for an approval-pending follow to become `Subscribed`.
    pub async fn await_approval(&self, session: &Session, community_id: CommunityId) -> Result<CommunityView> {
        let edge = self.edge(session, community_id)?;
        let view = self
            .waiter
            .wait_until(
                &format!("{} approved in community {}", session, community_id),
                || edge.poll(),
                |view| view.subscribed() == SubscribedType::Subscribed,
            )
            .await?;
        sleep(self.follow_recheck).await;
        Ok(view)
    }

    /// Wait for a denied follow request to fall back to `NotSubscribed`.
    pub async fn await_rejection(&self, session: &Session, community_id: CommunityId) -> Result<CommunityView> {
        let edge = self.edge(session, community_id)?;
        self.waiter
            .wait_until(
                &format!("{} rejected from community {}", session, community_id),
                || edge.poll(),
                |view| view.subscribed() == SubscribedType::NotSubscribed,
            )
            .await
    }

    /// Unfollow and wait until the follower's instance reports it.
    pub async fn unfollow(&mut self, session: &Session, community_id: CommunityId) -> Result<CommunityView> {
        let view = match self.edge(session, community_id) {
            Ok(edge) => release_edge(&self.waiter, &edge).await?,
            Err(_) => unfollow(&self.waiter, session, community_id).await?,
        };
        self.edges.retain(|edge| !edge.is_for(session, community_id));
        Ok(view)
    }

    /// Undo every recorded follow, newest first.
    ///
    /// All edges are attempted; the first failure is returned.
    pub async fn release(&mut self) -> Result<()> {
        let mut first_error = None;
        while let Some(edge) = self.edges.pop() {
            debug!(session = %edge.session, community = %edge.community_id, "Releasing follow");
            if let Err(e) = release_edge(&self.waiter, &edge).await {
                warn!(session = %edge.session, community = %edge.community_id, error = %e, "Failed to release follow");
                first_error.get_or_insert(e);
            }
        }
        match first_error {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }
}

async fn release_edge(waiter: &ConvergenceWaiter, edge: &FollowEdge) -> Result<CommunityView> {
    edge.session.send_follow(edge.community_id, false).await?;
    waiter
        .wait_until(
            &format!("{} unfollows community {}", edge.session, edge.community_id),
            || edge.poll(),
            |view| view.subscribed() == SubscribedType::NotSubscribed,
        )
        .await
}

async fn unfollow(waiter: &ConvergenceWaiter, session: &Session, community_id: CommunityId) -> Result<CommunityView> {
    session.send_follow(community_id, false).await?;
    waiter
        .wait_until(
            &format!("{} unfollows community {}", session, community_id),
            || session.get_community(community_id),
            |view| view.subscribed() == SubscribedType::NotSubscribed,
        )
        .await
}

/// Unfollow every remote community the session follows.
///
/// Individual failures are logged and skipped.
pub async fn unfollow_remotes(waiter: &ConvergenceWaiter, session: &Session) -> Result<MyUserInfo> {
    let me = session.my_user().await?;
    let remote: Vec<CommunityId> = me.remote_follows().map(|c| c.id).collect();
    let results = join_all(remote.iter().map(|id| unfollow(waiter, session, *id))).await;
    for (id, result) in remote.iter().zip(results) {
        if let Err(e) = result {
            warn!(session = %session, community = %id, error = %e, "Ignoring failed unfollow");
        }
    }
    session.my_user().await
}

/// Purge every post the session's instance lists.
///
/// Returns how many purges succeeded.
pub async fn purge_all_posts(session: &Session) -> Result<usize> {
    let posts = session.get_posts(None).await?;
    let results = join_all(posts.iter().map(|view| session.purge_post(view.post.id))).await;
    let mut purged = 0;
    for (view, result) in posts.iter().zip(results) {
        match result {
            Ok(()) => purged += 1,
            Err(e) => warn!(session = %session, post = %view.post.ap_id, error = %e, "Ignoring failed purge"),
        }
    }
    Ok(purged)
}

/// Suite-level cleanup on every instance; failures never abort the sweep.
pub async fn suite_teardown(waiter: &ConvergenceWaiter, sessions: &[Session]) -> Vec<Error> {
    let sweeps = sessions.iter().map(|session| async move {
        let (unfollowed, purged) = futures::join!(unfollow_remotes(waiter, session), purge_all_posts(session));
        let mut errors = Vec::new();
        if let Err(e) = unfollowed {
            errors.push(e);
        }
        match purged {
            Ok(count) => debug!(session = %session, count, "Purged posts"),
            Err(e) => errors.push(e),
        }
        errors
    });

    let errors: Vec<Error> = join_all(sweeps).await.into_iter().flatten().collect();
    for e in &errors {
        warn!(error = %e, "Suite teardown step failed");
    }
    info!(instances = sessions.len(), failures = errors.len(), "Suite teardown finished");
    errors
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::fake_sessions;

    fn scope() -> TeardownScope {
        TeardownScope::new(
            ConvergenceWaiter::new(Duration::from_millis(500), Duration::from_secs(10)),
            Duration::from_secs(2),
        )
    }

    #[tokio::test(start_paused = true)]
    async fn test_follow_waits_for_remote_acceptance() {
        let (_fed, sessions) = fake_sessions(Duration::from_secs(3)).await;
        let alpha = &sessions["alpha"];
        let beta = &sessions["beta"];

        let community = beta.create_community().await.unwrap();
        tokio::time::sleep(Duration::from_secs(3)).await;
        let on_alpha = alpha
            .resolve_community(&community.community.ap_id)
            .await
            .unwrap()
            .unwrap();

        let mut scope = scope();
        let view = scope.follow(alpha, on_alpha.community.id).await.unwrap();
        assert_eq!(view.subscribed(), SubscribedType::Subscribed);
        assert_eq!(scope.edges().len(), 1);

        scope.release().await.unwrap();
        assert!(scope.edges().is_empty());
        let after = alpha.get_community(on_alpha.community.id).await.unwrap();
        assert_eq!(after.subscribed(), SubscribedType::NotSubscribed);
    }

    #[tokio::test(start_paused = true)]
    async fn test_private_follow_settles_at_approval_required() {
        let (_fed, sessions) = fake_sessions(Duration::ZERO).await;
        let alpha = &sessions["alpha"];
        let user = sessions["beta"].register_user().await.unwrap();

        let community = alpha
            .create_community_with(crate::factory::NewCommunity {
                visibility: Some(CommunityVisibility::Private),
                ..Default::default()
            })
            .await
            .unwrap();
        let on_beta = user
            .resolve_community(&community.community.ap_id)
            .await
            .unwrap()
            .unwrap();

        let mut scope = scope();
        let view = scope.follow(&user, on_beta.community.id).await.unwrap();
        assert_eq!(view.subscribed(), SubscribedType::ApprovalRequired);

        let pending = alpha.list_pending_follows().await.unwrap();
        assert_eq!(pending.items.len(), 1);
        alpha
            .approve_pending_follow(community.community.id, pending.items[0].person.id, true)
            .await
            .unwrap();
        let approved = scope.await_approval(&user, on_beta.community.id).await.unwrap();
        assert_eq!(approved.subscribed(), SubscribedType::Subscribed);

        scope.release().await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn test_follow_moving_backwards_fails_the_wait() {
        let (fed, sessions) = fake_sessions(Duration::ZERO).await;
        let alpha = &sessions["alpha"];
        let community = alpha.create_community().await.unwrap();
        let user = alpha.register_user().await.unwrap();
        let person = user.my_user().await.unwrap().local_user_view.person.id;

        let mut scope = scope();
        let view = scope.follow(&user, community.community.id).await.unwrap();
        assert_eq!(view.subscribed(), SubscribedType::Subscribed);

        fed.force_follow_state(person, community.community.id, SubscribedType::ApprovalRequired)
            .unwrap();
        let start = tokio::time::Instant::now();
        let err = scope
            .await_approval(&user, community.community.id)
            .await
            .unwrap_err();
        assert_eq!(err.category(), "state_transition");
        assert!(start.elapsed() < Duration::from_secs(1));
        assert_eq!(scope.edges()[0].history(), vec![SubscribedType::Subscribed]);

        scope.release().await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn test_rejection_is_tracked_on_the_edge() {
        let (_fed, sessions) = fake_sessions(Duration::ZERO).await;
        let alpha = &sessions["alpha"];
        let user = alpha.register_user().await.unwrap();
        let community = alpha
            .create_community_with(crate::factory::NewCommunity {
                visibility: Some(CommunityVisibility::Private),
                ..Default::default()
            })
            .await
            .unwrap();

        let mut scope = scope();
        scope.follow(&user, community.community.id).await.unwrap();
        let pending = alpha.list_pending_follows().await.unwrap();
        alpha
            .approve_pending_follow(community.community.id, pending.items[0].person.id, false)
            .await
            .unwrap();

        let view = scope
            .await_rejection(&user, community.community.id)
            .await
            .unwrap();
        assert_eq!(view.subscribed(), SubscribedType::NotSubscribed);
        assert_eq!(
            scope.edges()[0].history(),
            vec![SubscribedType::ApprovalRequired, SubscribedType::NotSubscribed]
        );
        scope.release().await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn test_await_approval_needs_a_recorded_follow() {
        let (_fed, sessions) = fake_sessions(Duration::ZERO).await;
        let alpha = &sessions["alpha"];
        let community = alpha.create_community().await.unwrap();

        let err = scope()
            .await_approval(alpha, community.community.id)
            .await
            .unwrap_err();
        assert_eq!(err.category(), "configuration");
    }

    #[tokio::test(start_paused = true)]
    async fn test_release_attempts_every_edge() {
        let (_fed, sessions) = fake_sessions(Duration::ZERO).await;
        let alpha = &sessions["alpha"];
        let first = alpha.create_community().await.unwrap();
        let second = alpha.create_community().await.unwrap();
        let user = alpha.register_user().await.unwrap();

        let mut scope = scope();
        scope.follow(&user, first.community.id).await.unwrap();
        scope.follow(&user, second.community.id).await.unwrap();
        assert_eq!(scope.edges().len(), 2);

        scope.release().await.unwrap();
        assert!(scope.edges().is_empty());
        for id in [first.community.id, second.community.id] {
            let view = user.get_community(id).await.unwrap();
            assert_eq!(view.subscribed(), SubscribedType::NotSubscribed);
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_suite_teardown_unfollows_and_purges() {
        let (fed, sessions) = fake_sessions(Duration::ZERO).await;
        let alpha = &sessions["alpha"];
        let beta = &sessions["beta"];

        let community = beta.create_community().await.unwrap();
        let on_alpha = alpha
            .resolve_community(&community.community.ap_id)
            .await
            .unwrap()
            .unwrap();
        alpha.send_follow(on_alpha.community.id, true).await.unwrap();
        beta.create_post(community.community.id).await.unwrap();
        assert_eq!(alpha.my_user().await.unwrap().remote_follows().count(), 1);

        let all: Vec<Session> = sessions.values().cloned().collect();
        let waiter = ConvergenceWaiter::new(Duration::from_millis(500), Duration::from_secs(5));
        let errors = suite_teardown(&waiter, &all).await;

        assert!(errors.is_empty());
        assert_eq!(alpha.my_user().await.unwrap().remote_follows().count(), 0);
        assert_eq!(fed.post_count(), 0);
    }
}
