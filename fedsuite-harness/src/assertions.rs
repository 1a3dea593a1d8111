//! Field-by-field comparison of federated copies
//!
//! Local ids never match across instances, so each check compares the
//! fields that federation carries and reports every mismatch at once.

use fedsuite_core::views::{CommentView, CommunityView, PersonView, PostView};
use fedsuite_core::{Error, Result};
use std::fmt::Debug;

/// Collects mismatching fields between two copies of one object.
struct Comparison {
    subject: String,
    mismatches: Vec<String>,
}

impl Comparison {
    fn new(subject: impl Into<String>) -> Self {
        Self {
            subject: subject.into(),
            mismatches: Vec::new(),
        }
    }

    fn field<T: PartialEq + Debug>(mut self, name: &str, left: &T, right: &T) -> Self {
        if left != right {
            self.mismatches
                .push(format!("{}: {:?} != {:?}", name, left, right));
        }
        self
    }

    fn finish(self) -> Result<()> {
        if self.mismatches.is_empty() {
            return Ok(());
        }
        Err(Error::assertion(format!(
            "{} differs between instances ({})",
            self.subject,
            self.mismatches.join("; ")
        )))
    }
}

pub fn assert_post_federation(left: &PostView, right: &PostView) -> Result<()> {
    let (a, b) = (&left.post, &right.post);
    Comparison::new(format!("post {}", a.ap_id))
        .field("ap_id", &a.ap_id, &b.ap_id)
        .field("name", &a.name, &b.name)
        .field("body", &a.body, &b.body)
        .field("url", &a.url, &b.url)
        .field("nsfw", &a.nsfw, &b.nsfw)
        .field("embed_title", &a.embed_title, &b.embed_title)
        .field("embed_description", &a.embed_description, &b.embed_description)
        .field("embed_video_url", &a.embed_video_url, &b.embed_video_url)
        .field("published_at", &a.published_at, &b.published_at)
        .field("community", &left.community.ap_id, &right.community.ap_id)
        .field("creator", &left.creator.ap_id, &right.creator.ap_id)
        .field("locked", &a.locked, &b.locked)
        .field("removed", &a.removed, &b.removed)
        .field("deleted", &a.deleted, &b.deleted)
        .finish()
}

pub fn assert_comment_federation(left: &CommentView, right: &CommentView) -> Result<()> {
    let (a, b) = (&left.comment, &right.comment);
    Comparison::new(format!("comment {}", a.ap_id))
        .field("ap_id", &a.ap_id, &b.ap_id)
        .field("content", &a.content, &b.content)
        .field("creator", &left.creator.name, &right.creator.name)
        .field("community", &left.community.ap_id, &right.community.ap_id)
        .field("post", &left.post.ap_id, &right.post.ap_id)
        .field("published_at", &a.published_at, &b.published_at)
        .field("removed", &a.removed, &b.removed)
        .field("deleted", &a.deleted, &b.deleted)
        .finish()
}

pub fn assert_community_federation(left: &CommunityView, right: &CommunityView) -> Result<()> {
    let (a, b) = (&left.community, &right.community);
    Comparison::new(format!("community {}", a.ap_id))
        .field("ap_id", &a.ap_id, &b.ap_id)
        .field("name", &a.name, &b.name)
        .field("title", &a.title, &b.title)
        .field("description", &a.description, &b.description)
        .field("icon", &a.icon, &b.icon)
        .field("banner", &a.banner, &b.banner)
        .field("published_at", &a.published_at, &b.published_at)
        .field("nsfw", &a.nsfw, &b.nsfw)
        .field("removed", &a.removed, &b.removed)
        .field("deleted", &a.deleted, &b.deleted)
        .finish()
}

pub fn assert_person_federation(left: &PersonView, right: &PersonView) -> Result<()> {
    let (a, b) = (&left.person, &right.person);
    Comparison::new(format!("person {}", a.ap_id))
        .field("ap_id", &a.ap_id, &b.ap_id)
        .field("name", &a.name, &b.name)
        .field("display_name", &a.display_name, &b.display_name)
        .field("bio", &a.bio, &b.bio)
        .field("published_at", &a.published_at, &b.published_at)
        .finish()
}

/// Fail with an assertion error unless `condition` holds.
pub fn ensure(condition: bool, message: impl Into<String>) -> Result<()> {
    if condition {
        Ok(())
    } else {
        Err(Error::assertion(message))
    }
}

/// Fail with an assertion error unless `left == right`.
pub fn ensure_eq<T: PartialEq + Debug>(left: T, right: T, what: &str) -> Result<()> {
    if left == right {
        Ok(())
    } else {
        Err(Error::assertion(format!(
            "{}: expected {:?}, got {:?}",
            what, right, left
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::fake_sessions;
    use std::time::Duration;

    #[tokio::test]
    async fn test_remote_copy_matches_home_copy() {
        let (_fed, sessions) = fake_sessions(Duration::ZERO).await;
        let alpha = &sessions["alpha"];
        let beta = &sessions["beta"];

        let community = alpha.create_community().await.unwrap();
        let post = alpha.create_post(community.community.id).await.unwrap();
        let on_beta = beta.resolve_post(&post.post.ap_id).await.unwrap().unwrap();

        assert!(!on_beta.post.local);
        assert_post_federation(&post, &on_beta).unwrap();

        let remote_community = beta
            .resolve_community(&community.community.ap_id)
            .await
            .unwrap()
            .unwrap();
        assert_community_federation(&community, &remote_community).unwrap();
    }

    #[tokio::test]
    async fn test_mismatches_are_listed() {
        let (_fed, sessions) = fake_sessions(Duration::ZERO).await;
        let alpha = &sessions["alpha"];
        let community = alpha.create_community().await.unwrap();
        let post = alpha.create_post(community.community.id).await.unwrap();

        let mut changed = post.clone();
        changed.post.name = "other".to_string();
        changed.post.locked = true;

        let err = assert_post_federation(&post, &changed).unwrap_err();
        assert_eq!(err.category(), "assertion");
        let message = err.to_string();
        assert!(message.contains("name"));
        assert!(message.contains("locked"));
        assert!(!message.contains("body"));
    }

    #[test]
    fn test_ensure_helpers() {
        assert!(ensure(true, "fine").is_ok());
        assert!(ensure(false, "broken").unwrap_err().to_string().contains("broken"));
        assert!(ensure_eq(1, 1, "count").is_ok());
        let err = ensure_eq(2, 1, "count").unwrap_err();
        assert!(err.to_string().contains("expected 1, got 2"));
    }
}
