//! Cross-instance resolution of federated objects

use crate::session::Session;
use fedsuite_client::forms::{ListingType, ResolveObject, Search, SearchType};
use fedsuite_core::views::{CommentView, CommunityView, PersonView, Post, PostView, ResolvedObject};
use fedsuite_core::{Error, Locator, Result};
use tracing::debug;

/// Remote kinds meaning "no copy here yet", as opposed to an access decision.
const ABSENT_KINDS: &[&str] = &["couldnt_find_object", "not_found_on_remote"];

fn is_absent(err: &Error) -> bool {
    err.is_not_found()
        && err
            .remote_kind()
            .is_some_and(|kind| ABSENT_KINDS.contains(&kind.as_str()))
}

impl Session {
    /// Look up the copy of an object on this session's instance.
    ///
    /// `None` means the instance has no copy yet or cannot reach the object
    /// through federation; a privacy rejection is a `NotFound` error. The
    /// first resolution of a remote shorthand may only start a background
    /// fetch, so callers wait on it with the convergence waiter.
    pub async fn resolve<L: Into<Locator>>(&self, target: L) -> Result<Option<ResolvedObject>> {
        let locator = target.into();
        let form = ResolveObject {
            q: locator.to_string(),
        };
        match self.api().resolve_object(self.auth(), &form).await {
            Ok(response) => Ok(response.results.into_iter().next()),
            Err(e) if is_absent(&e) => {
                debug!(instance = self.name(), target = %locator, "Not resolvable yet");
                Ok(None)
            }
            Err(e) => Err(e),
        }
    }

    pub async fn resolve_post<L: Into<Locator>>(&self, target: L) -> Result<Option<PostView>> {
        Ok(self.resolve(target).await?.and_then(ResolvedObject::into_post))
    }

    pub async fn resolve_comment<L: Into<Locator>>(&self, target: L) -> Result<Option<CommentView>> {
        Ok(self.resolve(target).await?.and_then(ResolvedObject::into_comment))
    }

    pub async fn resolve_community<L: Into<Locator>>(
        &self,
        target: L,
    ) -> Result<Option<CommunityView>> {
        Ok(self
            .resolve(target)
            .await?
            .and_then(ResolvedObject::into_community))
    }

    pub async fn resolve_person<L: Into<Locator>>(&self, target: L) -> Result<Option<PersonView>> {
        Ok(self.resolve(target).await?.and_then(ResolvedObject::into_person))
    }

    /// Find a post in this instance's own data by title, without pulling it
    /// from its home instance.
    pub async fn find_local_post(&self, post: &Post) -> Result<Option<PostView>> {
        let form = Search {
            q: post.name.clone(),
            type_: SearchType::Posts,
            listing_type: ListingType::All,
        };
        let response = self.api().search(self.auth(), &form).await?;
        Ok(response
            .results
            .into_iter()
            .filter_map(ResolvedObject::into_post)
            .find(|view| view.post.ap_id == post.ap_id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::fake_sessions;
    use fedsuite_core::views::CommunityVisibility;
    use std::time::Duration;

    #[tokio::test(start_paused = true)]
    async fn test_remote_shorthand_absent_until_propagated() {
        let (_fed, sessions) = fake_sessions(Duration::from_secs(2)).await;
        let alpha = &sessions["alpha"];
        let beta = &sessions["beta"];

        let community = alpha.create_community().await.unwrap();
        let locator = alpha.instance().community_locator(&community.community.name);

        assert!(beta.resolve_community(locator.clone()).await.unwrap().is_none());
        tokio::time::sleep(Duration::from_secs(2)).await;

        let on_beta = beta.resolve_community(locator).await.unwrap().unwrap();
        assert_eq!(on_beta.community.ap_id, community.community.ap_id);
        assert!(!on_beta.community.local);
        assert!(beta.resolve_post(&community.community.ap_id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_private_content_is_not_found_error() {
        let (_fed, sessions) = fake_sessions(Duration::ZERO).await;
        let alpha = &sessions["alpha"];
        let beta = &sessions["beta"];

        let community = alpha
            .create_community_with(crate::factory::NewCommunity {
                visibility: Some(CommunityVisibility::Private),
                ..Default::default()
            })
            .await
            .unwrap();
        let post = alpha.create_post(community.community.id).await.unwrap();

        let err = beta.resolve_post(&post.post.ap_id).await.unwrap_err();
        assert!(err.is_not_found());
        assert_eq!(err.remote_kind().unwrap(), &"not_found");
    }

    #[tokio::test]
    async fn test_find_local_post_does_not_pull() {
        let (_fed, sessions) = fake_sessions(Duration::ZERO).await;
        let alpha = &sessions["alpha"];
        let gamma = &sessions["gamma"];

        let community = alpha.create_community().await.unwrap();
        let post = alpha.create_post(community.community.id).await.unwrap();

        assert!(gamma.find_local_post(&post.post).await.unwrap().is_none());
        assert!(gamma.resolve_post(&post.post.ap_id).await.unwrap().is_some());
        assert!(gamma.find_local_post(&post.post).await.unwrap().is_some());
    }
}
