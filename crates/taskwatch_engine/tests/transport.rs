use std::time::Duration;

use pretty_assertions::assert_eq;
use taskwatch_core::{
    ApiCall, ApiReply, ArticleRequest, DownloadRequest, LoginRequest, TaskId, TaskStatus,
};
use taskwatch_engine::{EngineSettings, ReqwestTransport, Transport, GENERIC_ERROR_MESSAGE};
use url::Url;
use wiremock::matchers::{body_json, header, header_exists, method, path};
use wiremock::{Mock, MockServer, Request, ResponseTemplate};

fn transport_for(server: &MockServer) -> ReqwestTransport {
    let settings = EngineSettings {
        base_url: Url::parse(&server.uri()).unwrap(),
        ..EngineSettings::default()
    };
    ReqwestTransport::new(&settings).unwrap()
}

#[tokio::test]
async fn login_is_sent_without_bearer_header() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/login"))
        .and(body_json(serde_json::json!({"username": "ann", "password": "pw"})))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "token": "tok-1",
            "expires_at": "2030-01-01T00:00:00Z"
        })))
        .mount(&server)
        .await;

    let transport = transport_for(&server);
    let call = ApiCall::Login(LoginRequest {
        username: "ann".into(),
        password: "pw".into(),
    });
    let reply = transport.call(&call, None).await.unwrap();

    match reply {
        ApiReply::Login(login) => assert_eq!(login.token, "tok-1"),
        other => panic!("unexpected reply {other:?}"),
    }
    let requests: Vec<Request> = server.received_requests().await.unwrap();
    assert_eq!(requests.len(), 1);
    assert!(requests[0].headers.get("authorization").is_none());
}

#[tokio::test]
async fn history_carries_bearer_and_decodes_task_id_alias() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/history"))
        .and(header("authorization", "Bearer tok-1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!([
            {
                "task_id": "abc123",
                "course_url": "https://example.com/course/rust",
                "status": "success",
                "article_status": "已生成"
            },
            {
                "task_id": "def456",
                "course_url": "https://example.com/course/go",
                "status": "failed",
                "message": "network unreachable"
            }
        ])))
        .mount(&server)
        .await;

    let transport = transport_for(&server);
    let reply = transport
        .call(&ApiCall::History, Some("tok-1"))
        .await
        .unwrap();

    let ApiReply::History(items) = reply else {
        panic!("expected history reply");
    };
    assert_eq!(items.len(), 2);
    assert_eq!(items[0].id, TaskId::parse("abc123").unwrap());
    assert_eq!(items[0].status, TaskStatus::Success);
    assert_eq!(items[1].message.as_deref(), Some("network unreachable"));
}

#[tokio::test]
async fn validation_errors_surface_server_message() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/download"))
        .and(header_exists("authorization"))
        .respond_with(ResponseTemplate::new(422).set_body_json(serde_json::json!({
            "detail": [{"loc": ["body", "course_url"], "msg": "course_url required"}]
        })))
        .mount(&server)
        .await;

    let transport = transport_for(&server);
    let err = transport
        .call(&ApiCall::Download(DownloadRequest::default()), Some("tok-1"))
        .await
        .unwrap_err();

    assert_eq!(err.status, Some(422));
    assert_eq!(err.message, "course_url required");
}

#[tokio::test]
async fn html_error_page_falls_back_to_generic_message() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/tasks"))
        .respond_with(ResponseTemplate::new(502).set_body_string("<html>bad gateway</html>"))
        .mount(&server)
        .await;

    let transport = transport_for(&server);
    let err = transport
        .call(&ApiCall::Tasks, Some("tok-1"))
        .await
        .unwrap_err();

    assert_eq!(err.status, Some(502));
    assert_eq!(err.message, GENERIC_ERROR_MESSAGE);
}

#[tokio::test]
async fn generate_article_posts_draft_status() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/history/abc123/generate-article"))
        .and(body_json(serde_json::json!({"status": "draft"})))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({"ok": true})))
        .expect(1)
        .mount(&server)
        .await;

    let transport = transport_for(&server);
    let call = ApiCall::GenerateArticle {
        task_id: TaskId::parse("abc123").unwrap(),
        request: ArticleRequest::default(),
    };
    let reply = transport.call(&call, Some("tok-1")).await.unwrap();
    assert_eq!(reply, ApiReply::ArticleQueued);
}

#[tokio::test]
async fn slow_response_times_out() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/tasks"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_delay(Duration::from_millis(250))
                .set_body_json(serde_json::json!([])),
        )
        .mount(&server)
        .await;

    let settings = EngineSettings {
        base_url: Url::parse(&server.uri()).unwrap(),
        request_timeout: Duration::from_millis(50),
        ..EngineSettings::default()
    };
    let transport = ReqwestTransport::new(&settings).unwrap();

    let err = transport
        .call(&ApiCall::Tasks, Some("tok-1"))
        .await
        .unwrap_err();
    assert_eq!(err.status, None);
    assert_eq!(err.message, "request timed out");
}
