//! Shared test utilities for planforge integration tests.
//!
//! Provides scripted stand-ins for the two upstream model APIs. Each
//! [`MockUpstream`] is an axum server on an ephemeral localhost port that
//! replays a list of canned replies (repeating the last one once the list
//! runs out) and records every request it receives.

use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use std::time::Instant;

use axum::Router;
use axum::body::Bytes;
use axum::extract::State;
use axum::http::{HeaderMap, StatusCode, Uri};
use axum::response::{IntoResponse, Response};
use serde_json::{Value, json};
use tokio::task::JoinHandle;

/// One canned HTTP reply.
#[derive(Debug, Clone)]
pub struct MockReply {
    pub status: u16,
    pub body: String,
}

impl MockReply {
    pub fn new(status: u16, body: impl Into<String>) -> Self {
        Self {
            status,
            body: body.into(),
        }
    }

    pub fn json(value: Value) -> Self {
        Self::new(200, value.to_string())
    }

    /// A `generateContent` success whose first part carries `text`.
    pub fn gemini_text(text: impl Into<String>) -> Self {
        Self::json(json!({
            "candidates": [{"content": {"role": "model", "parts": [{"text": text.into()}]}}]
        }))
    }

    /// A `generateContent` success carrying `plan` serialized as text.
    pub fn gemini_plan(plan: Value) -> Self {
        Self::gemini_text(plan.to_string())
    }

    /// A chat completion success whose assistant message is `content`.
    pub fn chat(content: impl Into<String>) -> Self {
        Self::json(json!({
            "choices": [{"index": 0, "message": {"role": "assistant", "content": content.into()}}]
        }))
    }

    /// A chat completion carrying an audit verdict.
    pub fn chat_verdict(score: u8, feedback: &str, issues: &[&str]) -> Self {
        Self::chat(
            json!({
                "confidence_score": score,
                "feedback": feedback,
                "specific_issues": issues,
            })
            .to_string(),
        )
    }
}

/// A request observed by a [`MockUpstream`].
#[derive(Debug, Clone)]
pub struct RecordedRequest {
    pub path: String,
    pub query: Option<String>,
    pub authorization: Option<String>,
    /// Parsed body, or `Value::Null` if it was not JSON.
    pub body: Value,
    pub received_at: Instant,
}

#[derive(Default)]
struct Script {
    replies: Vec<MockReply>,
    requests: Vec<RecordedRequest>,
}

type Shared = Arc<Mutex<Script>>;

/// A scripted upstream server. Shut down when dropped.
pub struct MockUpstream {
    pub base_url: String,
    script: Shared,
    task: JoinHandle<()>,
}

impl MockUpstream {
    /// Start a server replaying `replies` in order.
    pub async fn start(replies: Vec<MockReply>) -> Self {
        let script: Shared = Arc::new(Mutex::new(Script {
            replies,
            requests: Vec::new(),
        }));

        let app = Router::new().fallback(handle).with_state(script.clone());
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("failed to bind mock upstream");
        let addr: SocketAddr = listener.local_addr().expect("no local addr");
        let task = tokio::spawn(async move {
            let _ = axum::serve(listener, app).await;
        });

        Self {
            base_url: format!("http://{addr}"),
            script,
            task,
        }
    }

    /// Number of requests received so far.
    pub fn hits(&self) -> usize {
        self.script.lock().expect("mock script poisoned").requests.len()
    }

    pub fn requests(&self) -> Vec<RecordedRequest> {
        self.script
            .lock()
            .expect("mock script poisoned")
            .requests
            .clone()
    }
}

impl Drop for MockUpstream {
    fn drop(&mut self) {
        self.task.abort();
    }
}

async fn handle(State(script): State<Shared>, uri: Uri, headers: HeaderMap, body: Bytes) -> Response {
    let mut script = script.lock().expect("mock script poisoned");
    let index = script.requests.len();
    script.requests.push(RecordedRequest {
        path: uri.path().to_string(),
        query: uri.query().map(str::to_string),
        authorization: headers
            .get("authorization")
            .and_then(|v| v.to_str().ok())
            .map(str::to_string),
        body: serde_json::from_slice(&body).unwrap_or(Value::Null),
        received_at: Instant::now(),
    });

    let reply = script
        .replies
        .get(index)
        .or_else(|| script.replies.last())
        .cloned()
        .unwrap_or_else(|| MockReply::new(500, "no scripted reply"));

    let status = StatusCode::from_u16(reply.status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
    (
        status,
        [("content-type", "application/json")],
        reply.body,
    )
        .into_response()
}

/// A localhost URL with nothing listening on it.
pub async fn unreachable_url() -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("failed to bind probe listener");
    let addr = listener.local_addr().expect("no local addr");
    drop(listener);
    format!("http://{addr}")
}

/// The plan used across integration tests, in wire form.
pub fn sample_plan_json() -> Value {
    json!({
        "projectName": "Garden Shed",
        "groups": [
            {
                "groupName": "Foundation",
                "phaseStartDay": 0,
                "tasks": [
                    {
                        "taskName": "Level ground",
                        "description": "Clear and level a 3x4m area",
                        "priority": "High",
                        "durationDays": 1,
                        "startDayOffset": 0
                    },
                    {
                        "taskName": "Pour slab",
                        "description": "Pour and cure the concrete slab",
                        "priority": "High",
                        "durationDays": 3,
                        "startDayOffset": 1
                    }
                ]
            },
            {
                "groupName": "Structure",
                "phaseStartDay": 4,
                "tasks": [
                    {
                        "taskName": "Frame walls",
                        "description": "Assemble timber wall frames",
                        "priority": "Medium",
                        "durationDays": 2,
                        "startDayOffset": 0
                    },
                    {
                        "taskName": "Order windows",
                        "description": "Order two windows from supplier",
                        "priority": "Low",
                        "durationDays": 1,
                        "startDayOffset": 0
                    }
                ]
            }
        ]
    })
}
