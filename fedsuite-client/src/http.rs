//! `reqwest` implementation of [`FederatedApi`]

use crate::api::FederatedApi;
use crate::forms::*;
use async_trait::async_trait;
use fedsuite_core::config::HttpConfig;
use fedsuite_core::instance::Jwt;
use fedsuite_core::views::{CommunityTag, MyUserInfo};
use fedsuite_core::{Error, Result};
use reqwest::{Method, RequestBuilder};
use serde::de::DeserializeOwned;
use tracing::debug;
use url::Url;

const API_PREFIX: &str = "api/v4/";

/// HTTP client for one instance's `/api/v4` endpoints.
///
/// Cheap to clone; clones share the connection pool.
#[derive(Debug, Clone)]
pub struct HttpClient {
    http: reqwest::Client,
    api_root: Url,
}

impl HttpClient {
    pub fn new(base_url: &Url, config: &HttpConfig) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(config.request_timeout())
            .user_agent(config.user_agent.as_str())
            .build()
            .map_err(|e| Error::Transport(format!("failed to build HTTP client: {}", e)))?;

        let mut root = base_url.clone();
        if !root.path().ends_with('/') {
            root.set_path(&format!("{}/", root.path()));
        }
        let api_root = root.join(API_PREFIX)?;

        Ok(Self { http, api_root })
    }

    pub fn api_root(&self) -> &Url {
        &self.api_root
    }

    fn request(&self, method: Method, path: &str, auth: Option<&Jwt>) -> Result<RequestBuilder> {
        let url = self.api_root.join(path)?;
        let mut builder = self.http.request(method, url);
        if let Some(jwt) = auth {
            builder = builder.header(reqwest::header::AUTHORIZATION, jwt.bearer());
        }
        Ok(builder)
    }

    async fn send<T: DeserializeOwned>(&self, operation: &str, builder: RequestBuilder) -> Result<T> {
        debug!(operation, root = %self.api_root, "Sending request");

        let response = builder.send().await.map_err(|e| {
            if e.is_timeout() {
                Error::Transport(format!("{} timed out: {}", operation, e))
            } else {
                Error::Transport(format!("{} failed: {}", operation, e))
            }
        })?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| Error::Transport(format!("{} failed reading body: {}", operation, e)))?;

        if status.is_success() {
            return serde_json::from_str(&body).map_err(|e| {
                Error::Serialization(format!("{} returned an unexpected body: {}", operation, e))
            });
        }

        let kind = match serde_json::from_str::<ErrorResponse>(&body) {
            Ok(err) => err.error,
            Err(_) if body.trim().is_empty() => {
                status.canonical_reason().unwrap_or("unknown").to_string()
            }
            Err(_) => body.trim().to_string(),
        };
        debug!(operation, status = status.as_u16(), kind = %kind, "Request rejected");
        Err(Error::from_remote(operation, status.as_u16(), &kind))
    }

    async fn get<Q, T>(&self, operation: &str, path: &str, auth: Option<&Jwt>, query: &Q) -> Result<T>
    where
        Q: serde::Serialize + ?Sized + Sync,
        T: DeserializeOwned,
    {
        let builder = self.request(Method::GET, path, auth)?.query(query);
        self.send(operation, builder).await
    }

    async fn get_plain<T: DeserializeOwned>(
        &self,
        operation: &str,
        path: &str,
        auth: Option<&Jwt>,
    ) -> Result<T> {
        let builder = self.request(Method::GET, path, auth)?;
        self.send(operation, builder).await
    }

    async fn post<B, T>(&self, operation: &str, path: &str, auth: Option<&Jwt>, body: &B) -> Result<T>
    where
        B: serde::Serialize + ?Sized + Sync,
        T: DeserializeOwned,
    {
        let builder = self.request(Method::POST, path, auth)?.json(body);
        self.send(operation, builder).await
    }

    async fn put<B, T>(&self, operation: &str, path: &str, auth: Option<&Jwt>, body: &B) -> Result<T>
    where
        B: serde::Serialize + ?Sized + Sync,
        T: DeserializeOwned,
    {
        let builder = self.request(Method::PUT, path, auth)?.json(body);
        self.send(operation, builder).await
    }
}

#[async_trait]
impl FederatedApi for HttpClient {
    async fn login(&self, form: &Login) -> Result<LoginResponse> {
        self.post("login", "account/auth/login", None, form).await
    }

    async fn register(&self, form: &Register) -> Result<LoginResponse> {
        self.post("register", "account/auth/register", None, form).await
    }

    async fn get_my_user(&self, auth: Option<&Jwt>) -> Result<MyUserInfo> {
        self.get_plain("get_my_user", "account", auth).await
    }

    async fn save_user_settings(
        &self,
        auth: Option<&Jwt>,
        form: &SaveUserSettings,
    ) -> Result<SuccessResponse> {
        self.put("save_user_settings", "account/settings/save", auth, form)
            .await
    }

    async fn delete_account(
        &self,
        auth: Option<&Jwt>,
        form: &DeleteAccount,
    ) -> Result<SuccessResponse> {
        self.post("delete_account", "account/delete", auth, form).await
    }

    async fn get_site(&self, auth: Option<&Jwt>) -> Result<GetSiteResponse> {
        self.get_plain("get_site", "site", auth).await
    }

    async fn edit_site(&self, auth: Option<&Jwt>, form: &EditSite) -> Result<SiteResponse> {
        self.put("edit_site", "site", auth, form).await
    }

    async fn admin_allow_instance(
        &self,
        auth: Option<&Jwt>,
        form: &AdminAllowInstance,
    ) -> Result<SuccessResponse> {
        self.post("admin_allow_instance", "admin/instance/allow", auth, form)
            .await
    }

    async fn ban_person(&self, auth: Option<&Jwt>, form: &BanPerson) -> Result<PersonResponse> {
        self.post("ban_person", "admin/ban", auth, form).await
    }

    async fn purge_post(&self, auth: Option<&Jwt>, form: &PurgePost) -> Result<SuccessResponse> {
        self.post("purge_post", "admin/purge/post", auth, form).await
    }

    async fn list_reports(
        &self,
        auth: Option<&Jwt>,
        form: &ListReports,
    ) -> Result<ListReportsResponse> {
        self.get("list_reports", "report/list", auth, form).await
    }

    async fn resolve_object(
        &self,
        auth: Option<&Jwt>,
        form: &ResolveObject,
    ) -> Result<ResolveObjectResponse> {
        self.get("resolve_object", "resolve_object", auth, form).await
    }

    async fn search(&self, auth: Option<&Jwt>, form: &Search) -> Result<SearchResponse> {
        self.get("search", "search", auth, form).await
    }

    async fn get_community(
        &self,
        auth: Option<&Jwt>,
        form: &GetCommunity,
    ) -> Result<GetCommunityResponse> {
        self.get("get_community", "community", auth, form).await
    }

    async fn create_community(
        &self,
        auth: Option<&Jwt>,
        form: &CreateCommunity,
    ) -> Result<CommunityResponse> {
        self.post("create_community", "community", auth, form).await
    }

    async fn edit_community(
        &self,
        auth: Option<&Jwt>,
        form: &EditCommunity,
    ) -> Result<CommunityResponse> {
        self.put("edit_community", "community", auth, form).await
    }

    async fn follow_community(
        &self,
        auth: Option<&Jwt>,
        form: &FollowCommunity,
    ) -> Result<CommunityResponse> {
        self.post("follow_community", "community/follow", auth, form)
            .await
    }

    async fn delete_community(
        &self,
        auth: Option<&Jwt>,
        form: &DeleteCommunity,
    ) -> Result<CommunityResponse> {
        self.post("delete_community", "community/delete", auth, form)
            .await
    }

    async fn remove_community(
        &self,
        auth: Option<&Jwt>,
        form: &RemoveCommunity,
    ) -> Result<CommunityResponse> {
        self.post("remove_community", "community/remove", auth, form)
            .await
    }

    async fn ban_from_community(
        &self,
        auth: Option<&Jwt>,
        form: &BanFromCommunity,
    ) -> Result<BanFromCommunityResponse> {
        self.post("ban_from_community", "community/ban_user", auth, form)
            .await
    }

    async fn add_mod_to_community(
        &self,
        auth: Option<&Jwt>,
        form: &AddModToCommunity,
    ) -> Result<AddModToCommunityResponse> {
        self.post("add_mod_to_community", "community/mod", auth, form)
            .await
    }

    async fn list_pending_follows(
        &self,
        auth: Option<&Jwt>,
        form: &ListPendingFollows,
    ) -> Result<ListPendingFollowsResponse> {
        self.get(
            "list_pending_follows",
            "community/pending_follows/list",
            auth,
            form,
        )
        .await
    }

    async fn pending_follows_count(
        &self,
        auth: Option<&Jwt>,
    ) -> Result<PendingFollowsCountResponse> {
        self.get_plain(
            "pending_follows_count",
            "community/pending_follows/count",
            auth,
        )
        .await
    }

    async fn approve_pending_follow(
        &self,
        auth: Option<&Jwt>,
        form: &ApprovePendingFollow,
    ) -> Result<SuccessResponse> {
        self.post(
            "approve_pending_follow",
            "community/pending_follows/approve",
            auth,
            form,
        )
        .await
    }

    async fn get_post(&self, auth: Option<&Jwt>, form: &GetPost) -> Result<GetPostResponse> {
        self.get("get_post", "post", auth, form).await
    }

    async fn get_posts(&self, auth: Option<&Jwt>, form: &GetPosts) -> Result<GetPostsResponse> {
        self.get("get_posts", "post/list", auth, form).await
    }

    async fn create_post(&self, auth: Option<&Jwt>, form: &CreatePost) -> Result<PostResponse> {
        self.post("create_post", "post", auth, form).await
    }

    async fn edit_post(&self, auth: Option<&Jwt>, form: &EditPost) -> Result<PostResponse> {
        self.put("edit_post", "post", auth, form).await
    }

    async fn delete_post(&self, auth: Option<&Jwt>, form: &DeletePost) -> Result<PostResponse> {
        self.post("delete_post", "post/delete", auth, form).await
    }

    async fn remove_post(&self, auth: Option<&Jwt>, form: &RemovePost) -> Result<PostResponse> {
        self.post("remove_post", "post/remove", auth, form).await
    }

    async fn lock_post(&self, auth: Option<&Jwt>, form: &LockPost) -> Result<PostResponse> {
        self.post("lock_post", "post/lock", auth, form).await
    }

    async fn feature_post(&self, auth: Option<&Jwt>, form: &FeaturePost) -> Result<PostResponse> {
        self.post("feature_post", "post/feature", auth, form).await
    }

    async fn like_post(&self, auth: Option<&Jwt>, form: &CreatePostLike) -> Result<PostResponse> {
        self.post("like_post", "post/like", auth, form).await
    }

    async fn report_post(
        &self,
        auth: Option<&Jwt>,
        form: &CreatePostReport,
    ) -> Result<PostReportResponse> {
        self.post("report_post", "post/report", auth, form).await
    }

    async fn update_post_tags(
        &self,
        auth: Option<&Jwt>,
        form: &UpdatePostTags,
    ) -> Result<PostResponse> {
        self.put("update_post_tags", "post/tags", auth, form).await
    }

    async fn create_community_tag(
        &self,
        auth: Option<&Jwt>,
        form: &CreateCommunityTag,
    ) -> Result<CommunityTag> {
        self.post("create_community_tag", "community/tag", auth, form)
            .await
    }

    async fn update_community_tag(
        &self,
        auth: Option<&Jwt>,
        form: &UpdateCommunityTag,
    ) -> Result<CommunityTag> {
        self.put("update_community_tag", "community/tag", auth, form)
            .await
    }

    async fn delete_community_tag(
        &self,
        auth: Option<&Jwt>,
        form: &DeleteCommunityTag,
    ) -> Result<CommunityTag> {
        self.post("delete_community_tag", "community/tag/delete", auth, form)
            .await
    }

    async fn list_community_tags(
        &self,
        auth: Option<&Jwt>,
        form: &ListCommunityTags,
    ) -> Result<ListCommunityTagsResponse> {
        self.get("list_community_tags", "community/tag/list", auth, form)
            .await
    }

    async fn get_comments(
        &self,
        auth: Option<&Jwt>,
        form: &GetComments,
    ) -> Result<GetCommentsResponse> {
        self.get("get_comments", "comment/list", auth, form).await
    }

    async fn create_comment(
        &self,
        auth: Option<&Jwt>,
        form: &CreateComment,
    ) -> Result<CommentResponse> {
        self.post("create_comment", "comment", auth, form).await
    }

    async fn edit_comment(
        &self,
        auth: Option<&Jwt>,
        form: &EditComment,
    ) -> Result<CommentResponse> {
        self.put("edit_comment", "comment", auth, form).await
    }

    async fn delete_comment(
        &self,
        auth: Option<&Jwt>,
        form: &DeleteComment,
    ) -> Result<CommentResponse> {
        self.post("delete_comment", "comment/delete", auth, form).await
    }

    async fn remove_comment(
        &self,
        auth: Option<&Jwt>,
        form: &RemoveComment,
    ) -> Result<CommentResponse> {
        self.post("remove_comment", "comment/remove", auth, form).await
    }

    async fn distinguish_comment(
        &self,
        auth: Option<&Jwt>,
        form: &DistinguishComment,
    ) -> Result<CommentResponse> {
        self.post("distinguish_comment", "comment/distinguish", auth, form)
            .await
    }

    async fn like_comment(
        &self,
        auth: Option<&Jwt>,
        form: &CreateCommentLike,
    ) -> Result<CommentResponse> {
        self.post("like_comment", "comment/like", auth, form).await
    }

    async fn report_comment(
        &self,
        auth: Option<&Jwt>,
        form: &CreateCommentReport,
    ) -> Result<CommentReportResponse> {
        self.post("report_comment", "comment/report", auth, form).await
    }

    async fn create_private_message(
        &self,
        auth: Option<&Jwt>,
        form: &CreatePrivateMessage,
    ) -> Result<PrivateMessageResponse> {
        self.post("create_private_message", "private_message", auth, form)
            .await
    }

    async fn edit_private_message(
        &self,
        auth: Option<&Jwt>,
        form: &EditPrivateMessage,
    ) -> Result<PrivateMessageResponse> {
        self.put("edit_private_message", "private_message", auth, form)
            .await
    }

    async fn delete_private_message(
        &self,
        auth: Option<&Jwt>,
        form: &DeletePrivateMessage,
    ) -> Result<PrivateMessageResponse> {
        self.post(
            "delete_private_message",
            "private_message/delete",
            auth,
            form,
        )
        .await
    }

    async fn list_notifications(
        &self,
        auth: Option<&Jwt>,
        form: &ListNotifications,
    ) -> Result<ListNotificationsResponse> {
        self.get("list_notifications", "account/notification/list", auth, form)
            .await
    }

    async fn get_person_details(
        &self,
        auth: Option<&Jwt>,
        form: &GetPersonDetails,
    ) -> Result<GetPersonDetailsResponse> {
        self.get("get_person_details", "person", auth, form).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_api_root_joins_prefix() {
        let base = Url::parse("http://127.0.0.1:8541").unwrap();
        let client = HttpClient::new(&base, &HttpConfig::default()).unwrap();
        assert_eq!(client.api_root().as_str(), "http://127.0.0.1:8541/api/v4/");

        let base = Url::parse("http://proxy.local/lemmy").unwrap();
        let client = HttpClient::new(&base, &HttpConfig::default()).unwrap();
        assert_eq!(client.api_root().as_str(), "http://proxy.local/lemmy/api/v4/");
    }
}
