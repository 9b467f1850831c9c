//! wiremock stand-in for the remote video API

use serde_json::json;
use wiremock::matchers::{header, method, path, path_regex};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// Hash the mock API hands out with every upload target
pub const TEST_HASH: &str = "c0ffee";

/// Status codes the mock answers each remote operation with
#[derive(Clone, Copy)]
pub struct ApiBehavior {
    /// `GET /posts/generate-upload-url`
    pub target_status: u16,
    /// `PUT /upload/...`
    pub upload_status: u16,
    /// `POST /posts`
    pub post_status: u16,
}

impl Default for ApiBehavior {
    fn default() -> Self {
        Self {
            target_status: 200,
            upload_status: 200,
            post_status: 200,
        }
    }
}

/// Start a mock API server answering per `behavior`
pub async fn start_api(behavior: ApiBehavior) -> MockServer {
    let server = MockServer::start().await;

    let target = if behavior.target_status == 200 {
        ResponseTemplate::new(200).set_body_json(json!({
            "url": format!("{}/upload/slot-1", server.uri()),
            "hash": TEST_HASH,
        }))
    } else {
        ResponseTemplate::new(behavior.target_status).set_body_string("denied")
    };
    Mock::given(method("GET"))
        .and(path("/posts/generate-upload-url"))
        .and(header("Flic-Token", "test-token"))
        .respond_with(target)
        .mount(&server)
        .await;

    Mock::given(method("PUT"))
        .and(path_regex(r"^/upload/.+$"))
        .respond_with(ResponseTemplate::new(behavior.upload_status))
        .mount(&server)
        .await;

    Mock::given(method("POST"))
        .and(path("/posts"))
        .and(header("Flic-Token", "test-token"))
        .respond_with(ResponseTemplate::new(behavior.post_status))
        .mount(&server)
        .await;

    server
}

/// Serve `bytes` at `/media/<name>` for the HTTP fetcher
pub async fn serve_media(server: &MockServer, name: &str, bytes: Vec<u8>) -> String {
    Mock::given(method("GET"))
        .and(path(format!("/media/{}", name)))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(bytes))
        .mount(server)
        .await;
    format!("{}/media/{}", server.uri(), name)
}

/// Requests the server received for `method_name` on paths starting with `prefix`
pub async fn requests_to(
    server: &MockServer,
    method_name: &str,
    prefix: &str,
) -> Vec<wiremock::Request> {
    server
        .received_requests()
        .await
        .unwrap_or_default()
        .into_iter()
        .filter(|r| r.method.as_str() == method_name && r.url.path().starts_with(prefix))
        .collect()
}
