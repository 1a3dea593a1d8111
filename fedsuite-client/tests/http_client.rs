//! HTTP client behaviour against a mocked instance

use fedsuite_client::forms::*;
use fedsuite_client::{FederatedApi, HttpClient};
use fedsuite_core::config::HttpConfig;
use fedsuite_core::{Error, Jwt, PostId};
use serde_json::json;
use url::Url;
use wiremock::matchers::{body_json, header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

async fn client(server: &MockServer) -> HttpClient {
    let base = Url::parse(&server.uri()).unwrap();
    HttpClient::new(&base, &HttpConfig::default()).unwrap()
}

fn person(id: i64, name: &str) -> serde_json::Value {
    json!({
        "id": id,
        "name": name,
        "ap_id": format!("http://lemmy-alpha:8541/u/{}", name),
        "local": true
    })
}

#[tokio::test]
async fn test_login_posts_credentials_and_returns_token() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/v4/account/auth/login"))
        .and(body_json(json!({
            "username_or_email": "lemmy_alpha",
            "password": "lemmylemmy"
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "jwt": "token-1",
            "registration_created": false,
            "verify_email_sent": false
        })))
        .expect(1)
        .mount(&server)
        .await;

    let response = client(&server)
        .await
        .login(&Login {
            username_or_email: "lemmy_alpha".into(),
            password: "lemmylemmy".into(),
        })
        .await
        .unwrap();

    assert_eq!(response.jwt.unwrap().as_str(), "token-1");
}

#[tokio::test]
async fn test_incorrect_login_is_auth_error() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/v4/account/auth/login"))
        .respond_with(
            ResponseTemplate::new(400).set_body_json(json!({ "error": "incorrect_login" })),
        )
        .mount(&server)
        .await;

    let err = client(&server)
        .await
        .login(&Login {
            username_or_email: "lemmy_alpha".into(),
            password: "wrong".into(),
        })
        .await
        .unwrap_err();

    assert!(err.is_auth());
    assert_eq!(err.remote_kind().unwrap(), &"incorrect_login");
}

#[tokio::test]
async fn test_authenticated_calls_send_bearer_token() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/v4/account"))
        .and(header("authorization", "Bearer token-1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "local_user_view": { "person": person(5, "lemmy_alpha") },
            "follows": []
        })))
        .expect(1)
        .mount(&server)
        .await;

    let info = client(&server)
        .await
        .get_my_user(Some(&Jwt::new("token-1")))
        .await
        .unwrap();

    assert_eq!(info.local_user_view.person.name, "lemmy_alpha");
    assert_eq!(info.remote_follows().count(), 0);
}

#[tokio::test]
async fn test_resolve_object_sends_query() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/v4/resolve_object"))
        .and(query_param("q", "!main@lemmy-beta:8551"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "results": [{
                "type_": "community",
                "community": {
                    "id": 3,
                    "name": "main",
                    "title": "main",
                    "ap_id": "http://lemmy-beta:8551/c/main",
                    "local": false
                },
                "subscribed": "NotSubscribed"
            }]
        })))
        .mount(&server)
        .await;

    let response = client(&server)
        .await
        .resolve_object(
            None,
            &ResolveObject {
                q: "!main@lemmy-beta:8551".into(),
            },
        )
        .await
        .unwrap();

    let community = response.results[0].clone().into_community().unwrap();
    assert_eq!(community.community.ap_id.as_str(), "http://lemmy-beta:8551/c/main");
    assert!(!community.community.local);
}

#[tokio::test]
async fn test_not_found_kinds_are_classified() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/v4/post"))
        .respond_with(
            ResponseTemplate::new(400).set_body_json(json!({ "error": "couldnt_find_community" })),
        )
        .mount(&server)
        .await;

    let err = client(&server)
        .await
        .create_post(
            Some(&Jwt::new("token-1")),
            &CreatePost {
                name: "post".into(),
                community_id: fedsuite_core::CommunityId(-1),
                url: None,
                body: None,
                alt_text: None,
            },
        )
        .await
        .unwrap_err();

    assert!(err.is_not_found());
    assert_eq!(err.category(), "not_found");
}

#[tokio::test]
async fn test_server_error_is_transport_error() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/v4/post"))
        .respond_with(ResponseTemplate::new(502))
        .mount(&server)
        .await;

    let err = client(&server)
        .await
        .get_post(None, &GetPost { id: PostId(1) })
        .await
        .unwrap_err();

    assert!(matches!(err, Error::Transport(_)));
}

#[tokio::test]
async fn test_malformed_success_body_is_serialization_error() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/v4/site"))
        .respond_with(ResponseTemplate::new(200).set_body_string("not json"))
        .mount(&server)
        .await;

    let err = client(&server).await.get_site(None).await.unwrap_err();
    assert!(matches!(err, Error::Serialization(_)));
}

#[tokio::test]
async fn test_notifications_are_filtered_by_kind() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/v4/account/notification/list"))
        .and(query_param("type_", "Mention"))
        .and(query_param("unread_only", "false"))
        .and(header("authorization", "Bearer token-2"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "notifications": [{
                "notification": { "id": 4, "kind": "Mention", "read": false },
                "data": {
                    "type_": "comment",
                    "comment": {
                        "id": 9,
                        "content": "hello @lemmy_beta@lemmy-beta:8551",
                        "ap_id": "http://lemmy-alpha:8541/comment/9",
                        "post_id": 3,
                        "creator_id": 5
                    },
                    "creator": person(5, "lemmy_alpha"),
                    "post": {
                        "id": 3,
                        "name": "post",
                        "ap_id": "http://lemmy-beta:8551/post/3",
                        "community_id": 2,
                        "creator_id": 5
                    },
                    "community": {
                        "id": 2,
                        "name": "main",
                        "ap_id": "http://lemmy-beta:8551/c/main",
                        "local": true
                    }
                }
            }]
        })))
        .expect(1)
        .mount(&server)
        .await;

    let response = client(&server)
        .await
        .list_notifications(
            Some(&Jwt::new("token-2")),
            &ListNotifications {
                type_: Some(fedsuite_core::views::NotificationKind::Mention),
                unread_only: false,
            },
        )
        .await
        .unwrap();

    let comment = response.notifications[0].comment().unwrap();
    assert!(comment.comment.content.contains("@lemmy_beta@lemmy-beta:8551"));
    assert!(comment.community.local);
}

#[tokio::test]
async fn test_post_report_body_is_typed() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/v4/post/report"))
        .and(body_json(json!({ "post_id": 3, "reason": "off topic" })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "post_report_view": {
                "post_report": {
                    "id": 1,
                    "post_id": 3,
                    "creator_id": 7,
                    "reason": "off topic",
                    "original_post_name": "post",
                    "resolved": false
                },
                "post": {
                    "id": 3,
                    "name": "post",
                    "ap_id": "http://lemmy-alpha:8541/post/3",
                    "community_id": 2,
                    "creator_id": 5
                },
                "community": {
                    "id": 2,
                    "name": "main",
                    "ap_id": "http://lemmy-beta:8551/c/main"
                }
            }
        })))
        .mount(&server)
        .await;

    let report = client(&server)
        .await
        .report_post(
            Some(&Jwt::new("token-1")),
            &CreatePostReport {
                post_id: PostId(3),
                reason: "off topic".into(),
            },
        )
        .await
        .unwrap()
        .post_report_view
        .post_report;
    assert_eq!(report.original_post_name, "post");
    assert!(!report.resolved);
}
