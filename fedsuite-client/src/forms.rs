//! Request forms and response bodies for the `/api/v4` endpoints
//!
//! Optional request fields are omitted from the wire when unset so the
//! server applies its own defaults.

use fedsuite_core::instance::Jwt;
use fedsuite_core::object::{
    CommentId, CommunityId, PersonId, PostId, PrivateMessageId, TagId,
};
use fedsuite_core::views::{
    CommentReportView, CommentView, CommunityTag, CommunityView, CommunityVisibility,
    MyUserInfo, NotificationKind, NotificationView, PendingFollow, PersonView, PostReportView,
    PostView, PrivateMessageView, ReportView, ResolvedObject,
};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

// Account

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Login {
    pub username_or_email: String,
    pub password: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Register {
    pub username: String,
    pub password: String,
    pub password_verify: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub show_nsfw: Option<bool>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LoginResponse {
    #[serde(default)]
    pub jwt: Option<Jwt>,
    #[serde(default)]
    pub registration_created: bool,
    #[serde(default)]
    pub verify_email_sent: bool,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SaveUserSettings {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bio: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub show_nsfw: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub show_avatars: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub send_notifications_to_email: Option<bool>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeleteAccount {
    pub password: String,
    pub delete_content: bool,
}

// Site administration

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EditSite {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub registration_mode: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rate_limit_message_max_requests: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rate_limit_post_max_requests: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rate_limit_comment_max_requests: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rate_limit_register_max_requests: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rate_limit_search_max_requests: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rate_limit_image_max_requests: Option<i32>,
}

impl EditSite {
    /// Open registration and lift rate limits far above what a suite run needs.
    pub fn open_for_testing() -> Self {
        let limit = Some(999);
        Self {
            registration_mode: Some("open".to_string()),
            rate_limit_message_max_requests: limit,
            rate_limit_post_max_requests: limit,
            rate_limit_comment_max_requests: limit,
            rate_limit_register_max_requests: limit,
            rate_limit_search_max_requests: limit,
            rate_limit_image_max_requests: limit,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SiteResponse {
    #[serde(flatten)]
    pub raw: Map<String, Value>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GetSiteResponse {
    #[serde(default)]
    pub version: String,
    #[serde(default)]
    pub admins: Vec<PersonView>,
    /// Absent for anonymous requests, including ones with an unusable token.
    #[serde(default)]
    pub my_user: Option<MyUserInfo>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AdminAllowInstance {
    pub instance: String,
    pub allow: bool,
    pub reason: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BanPerson {
    pub person_id: PersonId,
    pub ban: bool,
    pub remove_or_restore_data: bool,
    pub reason: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ListReports {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub show_community_rule_violations: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub unresolved_only: Option<bool>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ListReportsResponse {
    #[serde(default)]
    pub reports: Vec<ReportView>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PurgePost {
    pub post_id: PostId,
    pub reason: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SuccessResponse {
    pub success: bool,
}

// Resolution and search

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResolveObject {
    pub q: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ResolveObjectResponse {
    #[serde(default)]
    pub results: Vec<ResolvedObject>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SearchType {
    All,
    Posts,
    Comments,
    Communities,
    Users,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ListingType {
    #[default]
    All,
    Local,
    Subscribed,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Search {
    pub q: String,
    pub type_: SearchType,
    pub listing_type: ListingType,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SearchResponse {
    #[serde(default)]
    pub results: Vec<ResolvedObject>,
}

// Communities

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateCommunity {
    pub name: String,
    pub title: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub visibility: Option<CommunityVisibility>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EditCommunity {
    pub community_id: CommunityId,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub visibility: Option<CommunityVisibility>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GetCommunity {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<CommunityId>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CommunityResponse {
    pub community_view: CommunityView,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GetCommunityResponse {
    pub community_view: CommunityView,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FollowCommunity {
    pub community_id: CommunityId,
    pub follow: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeleteCommunity {
    pub community_id: CommunityId,
    pub deleted: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RemoveCommunity {
    pub community_id: CommunityId,
    pub removed: bool,
    pub reason: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BanFromCommunity {
    pub community_id: CommunityId,
    pub person_id: PersonId,
    pub ban: bool,
    pub remove_or_restore_data: bool,
    pub reason: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BanFromCommunityResponse {
    pub person_view: PersonView,
    pub banned: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AddModToCommunity {
    pub community_id: CommunityId,
    pub person_id: PersonId,
    pub added: bool,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AddModToCommunityResponse {
    #[serde(default)]
    pub moderators: Vec<Value>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ListPendingFollows {
    pub unread_only: bool,
    pub all_communities: bool,
    pub limit: i64,
}

impl Default for ListPendingFollows {
    fn default() -> Self {
        Self {
            unread_only: true,
            all_communities: false,
            limit: 50,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ListPendingFollowsResponse {
    #[serde(default)]
    pub items: Vec<PendingFollow>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PendingFollowsCountResponse {
    #[serde(default)]
    pub count: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApprovePendingFollow {
    pub community_id: CommunityId,
    pub follower_id: PersonId,
    pub approve: bool,
}

// Posts

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreatePost {
    pub name: String,
    pub community_id: CommunityId,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub body: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub alt_text: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EditPost {
    pub post_id: PostId,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub body: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GetPost {
    pub id: PostId,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PostResponse {
    pub post_view: PostView,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GetPostResponse {
    pub post_view: PostView,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GetPosts {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub type_: Option<ListingType>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub community_id: Option<CommunityId>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub limit: Option<i64>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GetPostsResponse {
    #[serde(default)]
    pub posts: Vec<PostView>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeletePost {
    pub post_id: PostId,
    pub deleted: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RemovePost {
    pub post_id: PostId,
    pub removed: bool,
    pub reason: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LockPost {
    pub post_id: PostId,
    pub locked: bool,
    pub reason: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FeatureType {
    Local,
    Community,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeaturePost {
    pub post_id: PostId,
    pub featured: bool,
    pub feature_type: FeatureType,
}

/// `is_upvote: None` withdraws an earlier vote.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreatePostLike {
    pub post_id: PostId,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub is_upvote: Option<bool>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreatePostReport {
    pub post_id: PostId,
    pub reason: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PostReportResponse {
    pub post_report_view: PostReportView,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpdatePostTags {
    pub post_id: PostId,
    pub tags: Vec<TagId>,
}

// Community tags

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateCommunityTag {
    pub community_id: CommunityId,
    pub name: String,
    pub id_slug: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpdateCommunityTag {
    pub tag_id: TagId,
    pub name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeleteCommunityTag {
    pub tag_id: TagId,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ListCommunityTags {
    pub community_id: CommunityId,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ListCommunityTagsResponse {
    #[serde(default)]
    pub tags: Vec<CommunityTag>,
}

// Comments

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateComment {
    pub content: String,
    pub post_id: PostId,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parent_id: Option<CommentId>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EditComment {
    pub comment_id: CommentId,
    pub content: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CommentResponse {
    pub comment_view: CommentView,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GetComments {
    pub post_id: PostId,
    pub type_: ListingType,
    pub sort: String,
    pub limit: i64,
}

impl GetComments {
    pub fn for_post(post_id: PostId) -> Self {
        Self {
            post_id,
            type_: ListingType::All,
            sort: "new".to_string(),
            limit: 50,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GetCommentsResponse {
    #[serde(default)]
    pub comments: Vec<CommentView>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeleteComment {
    pub comment_id: CommentId,
    pub deleted: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RemoveComment {
    pub comment_id: CommentId,
    pub removed: bool,
    pub reason: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DistinguishComment {
    pub comment_id: CommentId,
    pub distinguished: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateCommentLike {
    pub comment_id: CommentId,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub is_upvote: Option<bool>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateCommentReport {
    pub comment_id: CommentId,
    pub reason: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CommentReportResponse {
    pub comment_report_view: CommentReportView,
}

// Private messages

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreatePrivateMessage {
    pub content: String,
    pub recipient_id: PersonId,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EditPrivateMessage {
    pub private_message_id: PrivateMessageId,
    pub content: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeletePrivateMessage {
    pub private_message_id: PrivateMessageId,
    pub deleted: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PrivateMessageResponse {
    pub private_message_view: PrivateMessageView,
}

// Notifications

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ListNotifications {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub type_: Option<NotificationKind>,
    pub unread_only: bool,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ListNotificationsResponse {
    #[serde(default)]
    pub notifications: Vec<NotificationView>,
}

// People

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GetPersonDetails {
    pub person_id: PersonId,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GetPersonDetailsResponse {
    pub person_view: PersonView,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PersonResponse {
    pub person_view: PersonView,
}

/// Body of a failed request: `{"error": "<kind>"}`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
}
