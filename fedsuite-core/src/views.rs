//! Entity views returned by an instance's API
//!
//! Deserialization is tolerant: optional and newer fields default, and the
//! older field spellings (`actor_id`, `published`) are accepted as aliases.

use crate::object::{
    CommentId, CommunityId, InstanceId, NotificationId, ObjectRef, PersonId, PostId,
    PrivateMessageId, ReportId, TagId,
};
use crate::subscription::{CommunityFollowerState, SubscribedType};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Person {
    pub id: PersonId,
    pub name: String,
    #[serde(default)]
    pub display_name: Option<String>,
    #[serde(default)]
    pub bio: Option<String>,
    #[serde(alias = "actor_id")]
    pub ap_id: ObjectRef,
    #[serde(default)]
    pub local: bool,
    #[serde(default)]
    pub deleted: bool,
    /// Site ban as seen by the instance that served the view.
    #[serde(default)]
    pub banned: bool,
    #[serde(default)]
    pub instance_id: InstanceId,
    #[serde(default, alias = "published")]
    pub published_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum CommunityVisibility {
    #[default]
    Public,
    Unlisted,
    LocalOnlyPublic,
    LocalOnlyPrivate,
    Private,
    #[serde(other)]
    Other,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Community {
    pub id: CommunityId,
    pub name: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(alias = "actor_id")]
    pub ap_id: ObjectRef,
    #[serde(default)]
    pub local: bool,
    #[serde(default)]
    pub visibility: CommunityVisibility,
    #[serde(default)]
    pub icon: Option<String>,
    #[serde(default)]
    pub banner: Option<String>,
    #[serde(default)]
    pub nsfw: bool,
    #[serde(default)]
    pub removed: bool,
    #[serde(default)]
    pub deleted: bool,
    #[serde(default)]
    pub instance_id: InstanceId,
    #[serde(default, alias = "published")]
    pub published_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Post {
    pub id: PostId,
    pub name: String,
    #[serde(default)]
    pub body: Option<String>,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub alt_text: Option<String>,
    pub ap_id: ObjectRef,
    pub community_id: CommunityId,
    pub creator_id: PersonId,
    #[serde(default)]
    pub local: bool,
    #[serde(default)]
    pub locked: bool,
    #[serde(default)]
    pub removed: bool,
    #[serde(default)]
    pub deleted: bool,
    #[serde(default)]
    pub nsfw: bool,
    #[serde(default)]
    pub featured_community: bool,
    #[serde(default)]
    pub featured_local: bool,
    #[serde(default)]
    pub embed_title: Option<String>,
    #[serde(default)]
    pub embed_description: Option<String>,
    #[serde(default)]
    pub embed_video_url: Option<String>,
    /// Vote total on servers that inline counts into the post.
    #[serde(default)]
    pub score: Option<i64>,
    #[serde(default, alias = "published")]
    pub published_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct PostCounts {
    #[serde(default)]
    pub score: i64,
    #[serde(default)]
    pub upvotes: i64,
    #[serde(default)]
    pub downvotes: i64,
    #[serde(default)]
    pub comments: i64,
}

/// Label a community's moderators define and attach to posts.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CommunityTag {
    pub id: TagId,
    pub name: String,
    pub community_id: CommunityId,
    #[serde(default)]
    pub ap_id: Option<ObjectRef>,
    #[serde(default)]
    pub deleted: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PostView {
    pub post: Post,
    pub creator: Person,
    pub community: Community,
    #[serde(default)]
    pub counts: Option<PostCounts>,
    #[serde(default)]
    pub tags: Vec<CommunityTag>,
}

impl PostView {
    pub fn score(&self) -> i64 {
        self.post
            .score
            .or(self.counts.map(|c| c.score))
            .unwrap_or_default()
    }

    /// Names of the attached tags, sorted.
    pub fn tag_names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.tags.iter().map(|t| t.name.as_str()).collect();
        names.sort_unstable();
        names
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Comment {
    pub id: CommentId,
    pub content: String,
    pub ap_id: ObjectRef,
    pub post_id: PostId,
    pub creator_id: PersonId,
    /// Dot separated ancestry, `0.<root>.<...>.<self>`.
    #[serde(default)]
    pub path: String,
    #[serde(default)]
    pub local: bool,
    #[serde(default)]
    pub removed: bool,
    #[serde(default)]
    pub deleted: bool,
    #[serde(default)]
    pub distinguished: bool,
    #[serde(default)]
    pub score: Option<i64>,
    #[serde(default, alias = "published")]
    pub published_at: Option<DateTime<Utc>>,
}

impl Comment {
    /// Local id of the parent comment, `None` for top level comments.
    pub fn parent_id(&self) -> Option<CommentId> {
        let ids: Vec<&str> = self.path.split('.').skip(1).collect();
        if ids.len() > 1 {
            ids[ids.len() - 2].parse().ok().map(CommentId)
        } else {
            None
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct CommentCounts {
    #[serde(default)]
    pub score: i64,
    #[serde(default)]
    pub upvotes: i64,
    #[serde(default)]
    pub downvotes: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CommentView {
    pub comment: Comment,
    pub creator: Person,
    pub post: Post,
    pub community: Community,
    #[serde(default)]
    pub counts: Option<CommentCounts>,
}

impl CommentView {
    pub fn score(&self) -> i64 {
        self.comment
            .score
            .or(self.counts.map(|c| c.score))
            .unwrap_or_default()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct CommunityCounts {
    #[serde(default)]
    pub subscribers: i64,
    #[serde(default)]
    pub posts: i64,
    #[serde(default)]
    pub comments: i64,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct CommunityActions {
    #[serde(default)]
    pub follow_state: Option<CommunityFollowerState>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CommunityView {
    pub community: Community,
    #[serde(default)]
    pub subscribed: Option<SubscribedType>,
    #[serde(default)]
    pub community_actions: Option<CommunityActions>,
    #[serde(default)]
    pub counts: Option<CommunityCounts>,
}

impl CommunityView {
    /// Subscription state of the requesting session.
    pub fn subscribed(&self) -> SubscribedType {
        if let Some(subscribed) = self.subscribed {
            return subscribed;
        }
        self.community_actions
            .as_ref()
            .and_then(|a| a.follow_state)
            .map(SubscribedType::from)
            .unwrap_or_default()
    }

    pub fn post_count(&self) -> i64 {
        self.counts.map(|c| c.posts).unwrap_or_default()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PersonView {
    pub person: Person,
    #[serde(default)]
    pub is_admin: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PrivateMessage {
    pub id: PrivateMessageId,
    pub content: String,
    pub ap_id: ObjectRef,
    pub creator_id: PersonId,
    pub recipient_id: PersonId,
    #[serde(default)]
    pub deleted: bool,
    #[serde(default)]
    pub local: bool,
    #[serde(default, alias = "published")]
    pub published_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PrivateMessageView {
    pub private_message: PrivateMessage,
    pub creator: Person,
    pub recipient: Person,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CommunityFollowerView {
    pub community: Community,
    pub follower: Person,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LocalUserView {
    pub person: Person,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MyUserInfo {
    pub local_user_view: LocalUserView,
    #[serde(default)]
    pub follows: Vec<CommunityFollowerView>,
}

impl MyUserInfo {
    /// Communities followed on other instances.
    pub fn remote_follows(&self) -> impl Iterator<Item = &Community> {
        self.follows
            .iter()
            .map(|f| &f.community)
            .filter(|c| !c.local)
    }
}

/// Follow request waiting for moderator approval.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PendingFollow {
    pub person: Person,
    pub community: Community,
    #[serde(default)]
    pub follow_state: Option<CommunityFollowerState>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PostReport {
    pub id: ReportId,
    pub post_id: PostId,
    pub creator_id: PersonId,
    pub reason: String,
    pub original_post_name: String,
    #[serde(default)]
    pub original_post_body: Option<String>,
    #[serde(default)]
    pub resolved: bool,
    #[serde(default, alias = "published")]
    pub published_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PostReportView {
    pub post_report: PostReport,
    pub post: Post,
    pub community: Community,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CommentReport {
    pub id: ReportId,
    pub comment_id: CommentId,
    pub creator_id: PersonId,
    pub reason: String,
    pub original_comment_text: String,
    #[serde(default)]
    pub resolved: bool,
    #[serde(default, alias = "published")]
    pub published_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CommentReportView {
    pub comment_report: CommentReport,
    pub comment: Comment,
    pub community: Community,
}

/// One entry of the combined report list, tagged by `type_`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type_", rename_all = "snake_case")]
pub enum ReportView {
    Post(PostReportView),
    Comment(CommentReportView),
    #[serde(other)]
    Unsupported,
}

impl ReportView {
    pub fn reason(&self) -> Option<&str> {
        match self {
            ReportView::Post(v) => Some(&v.post_report.reason),
            ReportView::Comment(v) => Some(&v.comment_report.reason),
            ReportView::Unsupported => None,
        }
    }

    pub fn as_post(&self) -> Option<&PostReportView> {
        match self {
            ReportView::Post(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_comment(&self) -> Option<&CommentReportView> {
        match self {
            ReportView::Comment(v) => Some(v),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum NotificationKind {
    Mention,
    Reply,
    PrivateMessage,
    #[serde(other)]
    Other,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Notification {
    pub id: NotificationId,
    pub kind: NotificationKind,
    #[serde(default)]
    pub read: bool,
}

/// Object a notification points at, tagged by `type_`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type_", rename_all = "snake_case")]
pub enum NotificationData {
    Comment(CommentView),
    Post(PostView),
    PrivateMessage(PrivateMessageView),
    #[serde(other)]
    Unsupported,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NotificationView {
    pub notification: Notification,
    pub data: NotificationData,
}

impl NotificationView {
    pub fn comment(&self) -> Option<&CommentView> {
        match &self.data {
            NotificationData::Comment(v) => Some(v),
            _ => None,
        }
    }
}

/// One result of object resolution or search, tagged by `type_`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type_", rename_all = "snake_case")]
pub enum ResolvedObject {
    Post(PostView),
    Comment(CommentView),
    Community(CommunityView),
    Person(PersonView),
    #[serde(other)]
    Unsupported,
}

impl ResolvedObject {
    pub fn kind(&self) -> &'static str {
        match self {
            ResolvedObject::Post(_) => "post",
            ResolvedObject::Comment(_) => "comment",
            ResolvedObject::Community(_) => "community",
            ResolvedObject::Person(_) => "person",
            ResolvedObject::Unsupported => "unsupported",
        }
    }

    pub fn ap_id(&self) -> Option<&ObjectRef> {
        match self {
            ResolvedObject::Post(v) => Some(&v.post.ap_id),
            ResolvedObject::Comment(v) => Some(&v.comment.ap_id),
            ResolvedObject::Community(v) => Some(&v.community.ap_id),
            ResolvedObject::Person(v) => Some(&v.person.ap_id),
            ResolvedObject::Unsupported => None,
        }
    }

    pub fn into_post(self) -> Option<PostView> {
        match self {
            ResolvedObject::Post(v) => Some(v),
            _ => None,
        }
    }

    pub fn into_comment(self) -> Option<CommentView> {
        match self {
            ResolvedObject::Comment(v) => Some(v),
            _ => None,
        }
    }

    pub fn into_community(self) -> Option<CommunityView> {
        match self {
            ResolvedObject::Community(v) => Some(v),
            _ => None,
        }
    }

    pub fn into_person(self) -> Option<PersonView> {
        match self {
            ResolvedObject::Person(v) => Some(v),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn community_json(local: bool) -> serde_json::Value {
        json!({
            "id": 2,
            "name": "main",
            "title": "main",
            "actor_id": "http://lemmy-alpha:8541/c/main",
            "local": local,
            "visibility": "Private",
            "published": "2024-05-01T10:00:00Z"
        })
    }

    fn person_json() -> serde_json::Value {
        json!({
            "id": 5,
            "name": "lemmy_alpha",
            "ap_id": "http://lemmy-alpha:8541/u/lemmy_alpha",
            "local": true
        })
    }

    #[test]
    fn test_community_accepts_legacy_names() {
        let c: Community = serde_json::from_value(community_json(true)).unwrap();
        assert_eq!(c.ap_id.as_str(), "http://lemmy-alpha:8541/c/main");
        assert_eq!(c.visibility, CommunityVisibility::Private);
        assert!(c.published_at.is_some());
        assert!(!c.deleted);
    }

    #[test]
    fn test_unknown_visibility_is_tolerated() {
        let mut value = community_json(true);
        value["visibility"] = json!("SomethingNew");
        let c: Community = serde_json::from_value(value).unwrap();
        assert_eq!(c.visibility, CommunityVisibility::Other);
    }

    #[test]
    fn test_community_view_subscribed_sources() {
        let view: CommunityView = serde_json::from_value(json!({
            "community": community_json(false),
            "subscribed": "ApprovalRequired"
        }))
        .unwrap();
        assert_eq!(view.subscribed(), SubscribedType::ApprovalRequired);

        let view: CommunityView = serde_json::from_value(json!({
            "community": community_json(false),
            "community_actions": { "follow_state": "accepted" }
        }))
        .unwrap();
        assert_eq!(view.subscribed(), SubscribedType::Subscribed);

        let view: CommunityView =
            serde_json::from_value(json!({ "community": community_json(false) })).unwrap();
        assert_eq!(view.subscribed(), SubscribedType::NotSubscribed);
    }

    #[test]
    fn test_comment_parent_from_path() {
        let mut comment: Comment = serde_json::from_value(json!({
            "id": 9,
            "content": "reply",
            "ap_id": "http://lemmy-beta:8551/comment/9",
            "post_id": 3,
            "creator_id": 5,
            "path": "0.4.9"
        }))
        .unwrap();
        assert_eq!(comment.parent_id(), Some(CommentId(4)));

        comment.path = "0.9".into();
        assert_eq!(comment.parent_id(), None);
    }

    #[test]
    fn test_resolved_object_tagging() {
        let value = json!({
            "type_": "person",
            "person": person_json(),
        });
        let resolved: ResolvedObject = serde_json::from_value(value).unwrap();
        assert_eq!(resolved.kind(), "person");
        assert_eq!(
            resolved.ap_id().map(|r| r.as_str()),
            Some("http://lemmy-alpha:8541/u/lemmy_alpha")
        );
        assert!(resolved.clone().into_post().is_none());
        assert!(resolved.into_person().is_some());

        let other: ResolvedObject =
            serde_json::from_value(json!({ "type_": "multi_community" })).unwrap();
        assert_eq!(other, ResolvedObject::Unsupported);
    }

    #[test]
    fn test_report_list_entries_are_tagged() {
        let value = json!({
            "type_": "comment",
            "comment_report": {
                "id": 1,
                "comment_id": 9,
                "creator_id": 5,
                "reason": "spam",
                "original_comment_text": "buy now",
                "published": "2024-05-01T10:00:00Z"
            },
            "comment": {
                "id": 9,
                "content": "buy now",
                "ap_id": "http://lemmy-beta:8551/comment/9",
                "post_id": 3,
                "creator_id": 7
            },
            "community": community_json(false)
        });
        let report: ReportView = serde_json::from_value(value).unwrap();
        assert_eq!(report.reason(), Some("spam"));
        let comment = report.as_comment().unwrap();
        assert!(!comment.comment_report.resolved);
        assert_eq!(comment.comment_report.original_comment_text, "buy now");
        assert!(report.as_post().is_none());

        let other: ReportView =
            serde_json::from_value(json!({ "type_": "community" })).unwrap();
        assert_eq!(other.reason(), None);
    }

    #[test]
    fn test_person_banned_defaults_to_false() {
        let person: Person = serde_json::from_value(person_json()).unwrap();
        assert!(!person.banned);
    }

    #[test]
    fn test_remote_follows_filter() {
        let info: MyUserInfo = serde_json::from_value(json!({
            "local_user_view": { "person": person_json() },
            "follows": [
                { "community": community_json(true), "follower": person_json() },
                { "community": community_json(false), "follower": person_json() }
            ]
        }))
        .unwrap();
        assert_eq!(info.remote_follows().count(), 1);
    }
}
