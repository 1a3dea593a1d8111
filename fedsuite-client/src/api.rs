//! The API seam between the harness and one instance

use crate::forms::*;
use async_trait::async_trait;
use fedsuite_core::instance::Jwt;
use fedsuite_core::views::{CommunityTag, MyUserInfo};
use fedsuite_core::Result;

/// Endpoints of one instance consumed by the harness.
///
/// Every call takes the credential of the acting session, or `None` for
/// anonymous access. Failed calls return the classified remote error and are
/// never retried.
#[async_trait]
pub trait FederatedApi: Send + Sync {
    // Account
    async fn login(&self, form: &Login) -> Result<LoginResponse>;
    async fn register(&self, form: &Register) -> Result<LoginResponse>;
    async fn get_my_user(&self, auth: Option<&Jwt>) -> Result<MyUserInfo>;
    async fn save_user_settings(
        &self,
        auth: Option<&Jwt>,
        form: &SaveUserSettings,
    ) -> Result<SuccessResponse>;
    async fn delete_account(&self, auth: Option<&Jwt>, form: &DeleteAccount)
        -> Result<SuccessResponse>;

    // Site administration
    async fn get_site(&self, auth: Option<&Jwt>) -> Result<GetSiteResponse>;
    async fn edit_site(&self, auth: Option<&Jwt>, form: &EditSite) -> Result<SiteResponse>;
    async fn admin_allow_instance(
        &self,
        auth: Option<&Jwt>,
        form: &AdminAllowInstance,
    ) -> Result<SuccessResponse>;
    async fn ban_person(&self, auth: Option<&Jwt>, form: &BanPerson) -> Result<PersonResponse>;
    async fn purge_post(&self, auth: Option<&Jwt>, form: &PurgePost) -> Result<SuccessResponse>;
    async fn list_reports(
        &self,
        auth: Option<&Jwt>,
        form: &ListReports,
    ) -> Result<ListReportsResponse>;

    // Resolution and search
    async fn resolve_object(
        &self,
        auth: Option<&Jwt>,
        form: &ResolveObject,
    ) -> Result<ResolveObjectResponse>;
    async fn search(&self, auth: Option<&Jwt>, form: &Search) -> Result<SearchResponse>;

    // Communities
    async fn get_community(
        &self,
        auth: Option<&Jwt>,
        form: &GetCommunity,
    ) -> Result<GetCommunityResponse>;
    async fn create_community(
        &self,
        auth: Option<&Jwt>,
        form: &CreateCommunity,
    ) -> Result<CommunityResponse>;
    async fn edit_community(
        &self,
        auth: Option<&Jwt>,
        form: &EditCommunity,
    ) -> Result<CommunityResponse>;
    async fn follow_community(
        &self,
        auth: Option<&Jwt>,
        form: &FollowCommunity,
    ) -> Result<CommunityResponse>;
    async fn delete_community(
        &self,
        auth: Option<&Jwt>,
        form: &DeleteCommunity,
    ) -> Result<CommunityResponse>;
    async fn remove_community(
        &self,
        auth: Option<&Jwt>,
        form: &RemoveCommunity,
    ) -> Result<CommunityResponse>;
    async fn ban_from_community(
        &self,
        auth: Option<&Jwt>,
        form: &BanFromCommunity,
    ) -> Result<BanFromCommunityResponse>;
    async fn add_mod_to_community(
        &self,
        auth: Option<&Jwt>,
        form: &AddModToCommunity,
    ) -> Result<AddModToCommunityResponse>;
    async fn list_pending_follows(
        &self,
        auth: Option<&Jwt>,
        form: &ListPendingFollows,
    ) -> Result<ListPendingFollowsResponse>;
    async fn pending_follows_count(
        &self,
        auth: Option<&Jwt>,
    ) -> Result<PendingFollowsCountResponse>;
    async fn approve_pending_follow(
        &self,
        auth: Option<&Jwt>,
        form: &ApprovePendingFollow,
    ) -> Result<SuccessResponse>;

    // Posts
    async fn get_post(&self, auth: Option<&Jwt>, form: &GetPost) -> Result<GetPostResponse>;
    async fn get_posts(&self, auth: Option<&Jwt>, form: &GetPosts) -> Result<GetPostsResponse>;
    async fn create_post(&self, auth: Option<&Jwt>, form: &CreatePost) -> Result<PostResponse>;
    async fn edit_post(&self, auth: Option<&Jwt>, form: &EditPost) -> Result<PostResponse>;
    async fn delete_post(&self, auth: Option<&Jwt>, form: &DeletePost) -> Result<PostResponse>;
    async fn remove_post(&self, auth: Option<&Jwt>, form: &RemovePost) -> Result<PostResponse>;
    async fn lock_post(&self, auth: Option<&Jwt>, form: &LockPost) -> Result<PostResponse>;
    async fn feature_post(&self, auth: Option<&Jwt>, form: &FeaturePost) -> Result<PostResponse>;
    async fn like_post(&self, auth: Option<&Jwt>, form: &CreatePostLike) -> Result<PostResponse>;
    async fn report_post(
        &self,
        auth: Option<&Jwt>,
        form: &CreatePostReport,
    ) -> Result<PostReportResponse>;
    async fn update_post_tags(
        &self,
        auth: Option<&Jwt>,
        form: &UpdatePostTags,
    ) -> Result<PostResponse>;

    // Community tags
    async fn create_community_tag(
        &self,
        auth: Option<&Jwt>,
        form: &CreateCommunityTag,
    ) -> Result<CommunityTag>;
    async fn update_community_tag(
        &self,
        auth: Option<&Jwt>,
        form: &UpdateCommunityTag,
    ) -> Result<CommunityTag>;
    async fn delete_community_tag(
        &self,
        auth: Option<&Jwt>,
        form: &DeleteCommunityTag,
    ) -> Result<CommunityTag>;
    async fn list_community_tags(
        &self,
        auth: Option<&Jwt>,
        form: &ListCommunityTags,
    ) -> Result<ListCommunityTagsResponse>;

    // Comments
    async fn get_comments(
        &self,
        auth: Option<&Jwt>,
        form: &GetComments,
    ) -> Result<GetCommentsResponse>;
    async fn create_comment(
        &self,
        auth: Option<&Jwt>,
        form: &CreateComment,
    ) -> Result<CommentResponse>;
    async fn edit_comment(&self, auth: Option<&Jwt>, form: &EditComment)
        -> Result<CommentResponse>;
    async fn delete_comment(
        &self,
        auth: Option<&Jwt>,
        form: &DeleteComment,
    ) -> Result<CommentResponse>;
    async fn remove_comment(
        &self,
        auth: Option<&Jwt>,
        form: &RemoveComment,
    ) -> Result<CommentResponse>;
    async fn distinguish_comment(
        &self,
        auth: Option<&Jwt>,
        form: &DistinguishComment,
    ) -> Result<CommentResponse>;
    async fn like_comment(
        &self,
        auth: Option<&Jwt>,
        form: &CreateCommentLike,
    ) -> Result<CommentResponse>;
    async fn report_comment(
        &self,
        auth: Option<&Jwt>,
        form: &CreateCommentReport,
    ) -> Result<CommentReportResponse>;

    // Private messages
    async fn create_private_message(
        &self,
        auth: Option<&Jwt>,
        form: &CreatePrivateMessage,
    ) -> Result<PrivateMessageResponse>;
    async fn edit_private_message(
        &self,
        auth: Option<&Jwt>,
        form: &EditPrivateMessage,
    ) -> Result<PrivateMessageResponse>;
    async fn delete_private_message(
        &self,
        auth: Option<&Jwt>,
        form: &DeletePrivateMessage,
    ) -> Result<PrivateMessageResponse>;

    // Notifications
    async fn list_notifications(
        &self,
        auth: Option<&Jwt>,
        form: &ListNotifications,
    ) -> Result<ListNotificationsResponse>;

    // People
    async fn get_person_details(
        &self,
        auth: Option<&Jwt>,
        form: &GetPersonDetails,
    ) -> Result<GetPersonDetailsResponse>;
}
