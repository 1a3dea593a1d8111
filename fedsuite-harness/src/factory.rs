//! Fixture creation through authenticated calls
//!
//! Every operation is a real mutation on the session's instance. Unset
//! fields get random values and remote errors propagate unchanged, so a
//! scenario can assert on kinds such as `locked` or `banned_from_community`.

use crate::registry::authenticate;
use crate::session::Session;
use fedsuite_client::forms::*;
use fedsuite_core::views::{
    CommentReportView, CommentView, CommunityTag, CommunityView, CommunityVisibility,
    MyUserInfo, NotificationKind, NotificationView, PersonView, PostReportView, PostView,
    PrivateMessageView, ReportView,
};
use fedsuite_core::{
    random_name, random_string, CommentId, CommunityId, Credentials, Error, Jwt, PersonId, PostId,
    PrivateMessageId, Result, TagId,
};
use tracing::{debug, info};

/// Link used for new posts; stable so embed metadata compares equal everywhere.
pub const DEFAULT_POST_URL: &str = "https://example.com/";

/// Optional overrides for a new community.
#[derive(Debug, Clone, Default)]
pub struct NewCommunity {
    pub name: Option<String>,
    pub title: Option<String>,
    pub description: Option<String>,
    pub visibility: Option<CommunityVisibility>,
}

/// Optional overrides for a new post.
#[derive(Debug, Clone, Default)]
pub struct NewPost {
    pub name: Option<String>,
    pub body: Option<String>,
    pub url: Option<String>,
    pub alt_text: Option<String>,
}

/// Profile fields changed by [`Session::save_user_settings`].
#[derive(Debug, Clone, Default)]
pub struct ProfileUpdate {
    pub display_name: Option<String>,
    pub bio: Option<String>,
}

impl Session {
    // Communities

    pub async fn create_community(&self) -> Result<CommunityView> {
        self.create_community_with(NewCommunity::default()).await
    }

    pub async fn create_community_with(&self, overrides: NewCommunity) -> Result<CommunityView> {
        let name = overrides.name.unwrap_or_else(|| random_name(10));
        let form = CreateCommunity {
            title: overrides.title.unwrap_or_else(|| name.clone()),
            description: Some(overrides.description.unwrap_or_else(|| random_string(10))),
            visibility: overrides.visibility,
            name,
        };
        let view = self
            .api()
            .create_community(self.auth(), &form)
            .await?
            .community_view;
        debug!(instance = self.name(), community = %view.community.ap_id, "Created community");
        Ok(view)
    }

    pub async fn edit_community(&self, form: &EditCommunity) -> Result<CommunityView> {
        Ok(self
            .api()
            .edit_community(self.auth(), form)
            .await?
            .community_view)
    }

    pub async fn update_community_text(
        &self,
        community_id: CommunityId,
        title: &str,
        description: &str,
    ) -> Result<CommunityView> {
        let form = EditCommunity {
            community_id,
            title: Some(title.to_string()),
            description: Some(description.to_string()),
            visibility: None,
        };
        self.edit_community(&form).await
    }

    pub async fn delete_community(&self, community_id: CommunityId, deleted: bool) -> Result<CommunityView> {
        let form = DeleteCommunity {
            community_id,
            deleted,
        };
        Ok(self
            .api()
            .delete_community(self.auth(), &form)
            .await?
            .community_view)
    }

    pub async fn remove_community(&self, community_id: CommunityId, removed: bool) -> Result<CommunityView> {
        let form = RemoveCommunity {
            community_id,
            removed,
            reason: "remove".to_string(),
        };
        Ok(self
            .api()
            .remove_community(self.auth(), &form)
            .await?
            .community_view)
    }

    pub async fn get_community(&self, community_id: CommunityId) -> Result<CommunityView> {
        let form = GetCommunity {
            id: Some(community_id),
            name: None,
        };
        Ok(self
            .api()
            .get_community(self.auth(), &form)
            .await?
            .community_view)
    }

    pub async fn get_community_by_name(&self, name: &str) -> Result<CommunityView> {
        let form = GetCommunity {
            id: None,
            name: Some(name.to_string()),
        };
        Ok(self
            .api()
            .get_community(self.auth(), &form)
            .await?
            .community_view)
    }

    /// Send a follow or unfollow without waiting for the federated outcome.
    ///
    /// Scenarios go through the teardown scope instead, which waits and
    /// records the edge.
    pub async fn send_follow(&self, community_id: CommunityId, follow: bool) -> Result<CommunityView> {
        let form = FollowCommunity {
            community_id,
            follow,
        };
        Ok(self
            .api()
            .follow_community(self.auth(), &form)
            .await?
            .community_view)
    }

    // Community tags

    pub async fn create_community_tag(&self, community_id: CommunityId, name: &str) -> Result<CommunityTag> {
        let form = CreateCommunityTag {
            community_id,
            name: name.to_string(),
            id_slug: random_name(8),
        };
        self.api().create_community_tag(self.auth(), &form).await
    }

    pub async fn update_community_tag(&self, tag_id: TagId, name: &str) -> Result<CommunityTag> {
        let form = UpdateCommunityTag {
            tag_id,
            name: name.to_string(),
        };
        self.api().update_community_tag(self.auth(), &form).await
    }

    pub async fn delete_community_tag(&self, tag_id: TagId) -> Result<CommunityTag> {
        self.api()
            .delete_community_tag(self.auth(), &DeleteCommunityTag { tag_id })
            .await
    }

    pub async fn list_community_tags(&self, community_id: CommunityId) -> Result<Vec<CommunityTag>> {
        Ok(self
            .api()
            .list_community_tags(self.auth(), &ListCommunityTags { community_id })
            .await?
            .tags)
    }

    pub async fn list_pending_follows(&self) -> Result<ListPendingFollowsResponse> {
        self.api()
            .list_pending_follows(self.auth(), &ListPendingFollows::default())
            .await
    }

    pub async fn pending_follows_count(&self) -> Result<i64> {
        Ok(self.api().pending_follows_count(self.auth()).await?.count)
    }

    pub async fn approve_pending_follow(
        &self,
        community_id: CommunityId,
        follower_id: PersonId,
        approve: bool,
    ) -> Result<()> {
        let form = ApprovePendingFollow {
            community_id,
            follower_id,
            approve,
        };
        self.api().approve_pending_follow(self.auth(), &form).await?;
        Ok(())
    }

    // Posts

    pub async fn create_post(&self, community_id: CommunityId) -> Result<PostView> {
        self.create_post_with(community_id, NewPost::default()).await
    }

    pub async fn create_post_with(&self, community_id: CommunityId, overrides: NewPost) -> Result<PostView> {
        let form = CreatePost {
            name: overrides.name.unwrap_or_else(|| random_string(5)),
            community_id,
            url: Some(overrides.url.unwrap_or_else(|| DEFAULT_POST_URL.to_string())),
            body: Some(overrides.body.unwrap_or_else(|| random_string(10))),
            alt_text: Some(overrides.alt_text.unwrap_or_else(|| random_string(10))),
        };
        let view = self.api().create_post(self.auth(), &form).await?.post_view;
        debug!(instance = self.name(), post = %view.post.ap_id, "Created post");
        Ok(view)
    }

    /// Give the post a fresh random title.
    pub async fn edit_post(&self, post_id: PostId) -> Result<PostView> {
        let form = EditPost {
            post_id,
            name: Some(format!("Federated post, updated {}", random_string(5))),
            body: None,
        };
        Ok(self.api().edit_post(self.auth(), &form).await?.post_view)
    }

    pub async fn edit_post_with(&self, form: &EditPost) -> Result<PostView> {
        Ok(self.api().edit_post(self.auth(), form).await?.post_view)
    }

    pub async fn delete_post(&self, post_id: PostId, deleted: bool) -> Result<PostView> {
        let form = DeletePost { post_id, deleted };
        Ok(self.api().delete_post(self.auth(), &form).await?.post_view)
    }

    pub async fn remove_post(&self, post_id: PostId, removed: bool) -> Result<PostView> {
        let form = RemovePost {
            post_id,
            removed,
            reason: "remove".to_string(),
        };
        Ok(self.api().remove_post(self.auth(), &form).await?.post_view)
    }

    pub async fn lock_post(&self, post_id: PostId, locked: bool) -> Result<PostView> {
        let form = LockPost {
            post_id,
            locked,
            reason: "lock".to_string(),
        };
        Ok(self.api().lock_post(self.auth(), &form).await?.post_view)
    }

    /// Pin or unpin the post in its community.
    pub async fn feature_post(&self, post_id: PostId, featured: bool) -> Result<PostView> {
        let form = FeaturePost {
            post_id,
            featured,
            feature_type: FeatureType::Community,
        };
        Ok(self.api().feature_post(self.auth(), &form).await?.post_view)
    }

    /// `Some(true)` upvotes, `Some(false)` downvotes, `None` withdraws.
    pub async fn like_post(&self, post_id: PostId, vote: Option<bool>) -> Result<PostView> {
        let form = CreatePostLike {
            post_id,
            is_upvote: vote,
        };
        Ok(self.api().like_post(self.auth(), &form).await?.post_view)
    }

    pub async fn purge_post(&self, post_id: PostId) -> Result<()> {
        let form = PurgePost {
            post_id,
            reason: "purge".to_string(),
        };
        self.api().purge_post(self.auth(), &form).await?;
        Ok(())
    }

    pub async fn report_post(&self, post_id: PostId, reason: &str) -> Result<PostReportView> {
        let form = CreatePostReport {
            post_id,
            reason: reason.to_string(),
        };
        Ok(self
            .api()
            .report_post(self.auth(), &form)
            .await?
            .post_report_view)
    }

    /// Replace the post's tags with `tags`.
    pub async fn update_post_tags(&self, post_id: PostId, tags: Vec<TagId>) -> Result<PostView> {
        let form = UpdatePostTags { post_id, tags };
        Ok(self
            .api()
            .update_post_tags(self.auth(), &form)
            .await?
            .post_view)
    }

    pub async fn get_post(&self, post_id: PostId) -> Result<PostView> {
        Ok(self
            .api()
            .get_post(self.auth(), &GetPost { id: post_id })
            .await?
            .post_view)
    }

    pub async fn get_posts(&self, community_id: Option<CommunityId>) -> Result<Vec<PostView>> {
        let form = GetPosts {
            type_: Some(ListingType::All),
            community_id,
            limit: Some(50),
        };
        Ok(self.api().get_posts(self.auth(), &form).await?.posts)
    }

    // Comments

    pub async fn create_comment(&self, post_id: PostId, parent_id: Option<CommentId>) -> Result<CommentView> {
        self.create_comment_with(post_id, parent_id, random_string(10))
            .await
    }

    pub async fn create_comment_with(
        &self,
        post_id: PostId,
        parent_id: Option<CommentId>,
        content: String,
    ) -> Result<CommentView> {
        let form = CreateComment {
            content,
            post_id,
            parent_id,
        };
        let view = self
            .api()
            .create_comment(self.auth(), &form)
            .await?
            .comment_view;
        debug!(instance = self.name(), comment = %view.comment.ap_id, "Created comment");
        Ok(view)
    }

    pub async fn edit_comment(&self, comment_id: CommentId, content: &str) -> Result<CommentView> {
        let form = EditComment {
            comment_id,
            content: content.to_string(),
        };
        Ok(self
            .api()
            .edit_comment(self.auth(), &form)
            .await?
            .comment_view)
    }

    pub async fn delete_comment(&self, comment_id: CommentId, deleted: bool) -> Result<CommentView> {
        let form = DeleteComment {
            comment_id,
            deleted,
        };
        Ok(self
            .api()
            .delete_comment(self.auth(), &form)
            .await?
            .comment_view)
    }

    pub async fn remove_comment(&self, comment_id: CommentId, removed: bool) -> Result<CommentView> {
        let form = RemoveComment {
            comment_id,
            removed,
            reason: "remove".to_string(),
        };
        Ok(self
            .api()
            .remove_comment(self.auth(), &form)
            .await?
            .comment_view)
    }

    pub async fn distinguish_comment(&self, comment_id: CommentId, distinguished: bool) -> Result<CommentView> {
        let form = DistinguishComment {
            comment_id,
            distinguished,
        };
        Ok(self
            .api()
            .distinguish_comment(self.auth(), &form)
            .await?
            .comment_view)
    }

    pub async fn like_comment(&self, comment_id: CommentId, vote: Option<bool>) -> Result<CommentView> {
        let form = CreateCommentLike {
            comment_id,
            is_upvote: vote,
        };
        Ok(self
            .api()
            .like_comment(self.auth(), &form)
            .await?
            .comment_view)
    }

    pub async fn report_comment(&self, comment_id: CommentId, reason: &str) -> Result<CommentReportView> {
        let form = CreateCommentReport {
            comment_id,
            reason: reason.to_string(),
        };
        Ok(self
            .api()
            .report_comment(self.auth(), &form)
            .await?
            .comment_report_view)
    }

    pub async fn get_comments(&self, post_id: PostId) -> Result<Vec<CommentView>> {
        Ok(self
            .api()
            .get_comments(self.auth(), &GetComments::for_post(post_id))
            .await?
            .comments)
    }

    // Private messages

    pub async fn create_private_message(&self, recipient_id: PersonId) -> Result<PrivateMessageView> {
        let form = CreatePrivateMessage {
            content: random_string(10),
            recipient_id,
        };
        Ok(self
            .api()
            .create_private_message(self.auth(), &form)
            .await?
            .private_message_view)
    }

    pub async fn edit_private_message(
        &self,
        private_message_id: PrivateMessageId,
        content: &str,
    ) -> Result<PrivateMessageView> {
        let form = EditPrivateMessage {
            private_message_id,
            content: content.to_string(),
        };
        Ok(self
            .api()
            .edit_private_message(self.auth(), &form)
            .await?
            .private_message_view)
    }

    pub async fn delete_private_message(
        &self,
        private_message_id: PrivateMessageId,
        deleted: bool,
    ) -> Result<PrivateMessageView> {
        let form = DeletePrivateMessage {
            private_message_id,
            deleted,
        };
        Ok(self
            .api()
            .delete_private_message(self.auth(), &form)
            .await?
            .private_message_view)
    }

    // Users

    /// Register a new user on this session's instance and log it in.
    pub async fn register_user(&self) -> Result<Session> {
        self.register_user_named(&random_name(10)).await
    }

    pub async fn register_user_named(&self, username: &str) -> Result<Session> {
        let password = random_string(12);
        let form = Register {
            username: username.to_string(),
            password: password.clone(),
            password_verify: password.clone(),
            show_nsfw: Some(true),
        };
        let response = self.api().register(&form).await?;
        let credentials = Credentials::new(username, password);
        let jwt = match response.jwt {
            Some(jwt) => jwt,
            None => authenticate(self.api(), &credentials).await?,
        };
        info!(instance = self.name(), user = username, "Registered user");
        Ok(self.for_user(credentials, jwt))
    }

    fn for_user(&self, credentials: Credentials, jwt: Jwt) -> Session {
        Session::new(self.instance().clone(), self.api_handle(), credentials, jwt)
    }

    /// Log in again with the stored credentials.
    ///
    /// A home site ban revokes every token the actor held.
    pub async fn relogin(&self) -> Result<Session> {
        let credentials = Credentials::new(self.username(), self.password());
        let jwt = authenticate(self.api(), &credentials).await?;
        Ok(self.for_user(credentials, jwt))
    }

    pub async fn site(&self) -> Result<GetSiteResponse> {
        self.api().get_site(self.auth()).await
    }

    /// Notifications of `kind` for this session's actor, newest first.
    pub async fn notifications(&self, kind: NotificationKind) -> Result<Vec<NotificationView>> {
        let form = ListNotifications {
            type_: Some(kind),
            unread_only: false,
        };
        Ok(self
            .api()
            .list_notifications(self.auth(), &form)
            .await?
            .notifications)
    }

    pub async fn my_user(&self) -> Result<MyUserInfo> {
        self.api().get_my_user(self.auth()).await
    }

    pub async fn save_user_settings(&self, update: ProfileUpdate) -> Result<()> {
        let form = SaveUserSettings {
            display_name: update.display_name,
            bio: update.bio,
            show_nsfw: Some(true),
            show_avatars: Some(true),
            send_notifications_to_email: Some(false),
        };
        self.api().save_user_settings(self.auth(), &form).await?;
        Ok(())
    }

    /// Delete the account of this session's actor along with its content.
    pub async fn delete_account(&self) -> Result<()> {
        let form = DeleteAccount {
            password: self.password().to_string(),
            delete_content: true,
        };
        self.api().delete_account(self.auth(), &form).await?;
        Ok(())
    }

    pub async fn get_person(&self, person_id: PersonId) -> Result<PersonView> {
        Ok(self
            .api()
            .get_person_details(self.auth(), &GetPersonDetails { person_id })
            .await?
            .person_view)
    }

    // Moderation

    pub async fn ban_from_community(
        &self,
        person_id: PersonId,
        community_id: CommunityId,
        ban: bool,
        remove_data: bool,
    ) -> Result<BanFromCommunityResponse> {
        let form = BanFromCommunity {
            community_id,
            person_id,
            ban,
            remove_or_restore_data: remove_data,
            reason: "ban".to_string(),
        };
        self.api().ban_from_community(self.auth(), &form).await
    }

    pub async fn ban_from_site(&self, person_id: PersonId, ban: bool, remove_data: bool) -> Result<PersonView> {
        let form = BanPerson {
            person_id,
            ban,
            remove_or_restore_data: remove_data,
            reason: "ban".to_string(),
        };
        Ok(self.api().ban_person(self.auth(), &form).await?.person_view)
    }

    /// Reports visible to this session's actor as admin or moderator.
    pub async fn list_reports(&self) -> Result<Vec<ReportView>> {
        Ok(self
            .api()
            .list_reports(self.auth(), &ListReports::default())
            .await?
            .reports)
    }

    pub async fn add_mod(&self, community_id: CommunityId, person_id: PersonId) -> Result<()> {
        let form = AddModToCommunity {
            community_id,
            person_id,
            added: true,
        };
        self.api().add_mod_to_community(self.auth(), &form).await?;
        Ok(())
    }

    // Site administration

    /// Open registration and lift rate limits on this instance.
    pub async fn open_for_testing(&self) -> Result<()> {
        self.api()
            .edit_site(self.auth(), &EditSite::open_for_testing())
            .await?;
        Ok(())
    }

    /// Put `host` on this instance's allow list.
    ///
    /// Setup runs once per suite invocation against long-lived instances, so
    /// a rejected duplicate allow is not an error.
    pub async fn allow_instance(&self, host: &str) -> Result<()> {
        let form = AdminAllowInstance {
            instance: host.to_string(),
            allow: true,
            reason: "allow".to_string(),
        };
        match self.api().admin_allow_instance(self.auth(), &form).await {
            Ok(_) => Ok(()),
            Err(e @ Error::Validation { .. }) => {
                debug!(instance = self.name(), host, error = %e, "Allow already in place");
                Ok(())
            }
            Err(e) => Err(e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::fake_sessions;
    use std::time::Duration;

    #[tokio::test]
    async fn test_defaults_are_random_and_complete() {
        let (_fed, sessions) = fake_sessions(Duration::ZERO).await;
        let alpha = &sessions["alpha"];

        let community = alpha.create_community().await.unwrap();
        assert_eq!(community.community.name.len(), 10);
        assert!(community.community.description.is_some());

        let first = alpha.create_post(community.community.id).await.unwrap();
        let second = alpha.create_post(community.community.id).await.unwrap();
        assert_ne!(first.post.name, second.post.name);
        assert_ne!(first.post.ap_id, second.post.ap_id);
        assert_eq!(first.post.url.as_deref(), Some(DEFAULT_POST_URL));
        assert!(first.post.body.as_ref().unwrap().len() >= 5);
    }

    #[tokio::test]
    async fn test_remote_error_kinds_propagate() {
        let (_fed, sessions) = fake_sessions(Duration::ZERO).await;
        let alpha = &sessions["alpha"];

        let err = alpha.create_post(CommunityId(-1)).await.unwrap_err();
        assert!(err.is_not_found());
        assert_eq!(err.remote_kind().unwrap(), &"couldnt_find_community");

        let community = alpha.create_community().await.unwrap();
        let post = alpha.create_post(community.community.id).await.unwrap();
        alpha.lock_post(post.post.id, true).await.unwrap();
        let err = alpha.create_comment(post.post.id, None).await.unwrap_err();
        assert_eq!(err.remote_kind().unwrap(), &"locked");
        assert!(err.is_permission());
    }

    #[tokio::test]
    async fn test_register_user_returns_working_session() {
        let (_fed, sessions) = fake_sessions(Duration::ZERO).await;
        let beta = &sessions["beta"];

        let user = beta.register_user().await.unwrap();
        assert_eq!(user.name(), "beta");
        let me = user.my_user().await.unwrap();
        assert_eq!(me.local_user_view.person.name, user.username());

        user.save_user_settings(ProfileUpdate {
            display_name: Some("user321".into()),
            bio: Some("a changed bio".into()),
        })
        .await
        .unwrap();
        let me = user.my_user().await.unwrap();
        assert_eq!(me.local_user_view.person.bio.as_deref(), Some("a changed bio"));
    }

    #[tokio::test]
    async fn test_duplicate_allow_is_ignored() {
        let (fed, sessions) = fake_sessions(Duration::ZERO).await;
        let delta = &sessions["delta"];
        delta.allow_instance("lemmy-beta").await.unwrap();
        delta.allow_instance("lemmy-beta").await.unwrap();
        assert_eq!(fed.allowed_instances("delta"), vec!["lemmy-beta".to_string()]);
    }

    #[tokio::test]
    async fn test_community_ban_blocks_posting() {
        let (_fed, sessions) = fake_sessions(Duration::ZERO).await;
        let alpha = &sessions["alpha"];
        let user = alpha.register_user().await.unwrap();
        let community = alpha.create_community().await.unwrap();
        let person = user.my_user().await.unwrap().local_user_view.person;

        alpha
            .ban_from_community(person.id, community.community.id, true, false)
            .await
            .unwrap();
        let err = user.create_post(community.community.id).await.unwrap_err();
        assert_eq!(err.remote_kind().unwrap(), &"banned_from_community");
    }
}
