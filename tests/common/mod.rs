#![allow(dead_code)]

use axum::{
    body::Body,
    http::{header, Request, Response},
    Router,
};
use book_portal::{
    app,
    config::Config,
    session::{MemoryStore, SessionData, SessionStore},
    view::{RenderError, View, ViewRenderer},
    AppState,
};
use serde_json::{json, Value};
use std::sync::Arc;
use tower::util::ServiceExt; // for `oneshot`
use wiremock::MockServer;

pub const SID: &str = "test-session";
pub const REFERER: &str = "/books/previous";

const TEMPLATES: &[&str] = &[
    "books/section",
    "books/add",
    "books/waiting_approve",
    "books/approve_user",
    "books/detail",
    "books/category",
    "books/edit",
];

/// Вместо HTML отдаёт `{"template": .., "data": ..}`, чтобы тесты видели контракт с view.
pub struct JsonRenderer;

impl ViewRenderer for JsonRenderer {
    fn render(&self, view: &View) -> Result<String, RenderError> {
        if !TEMPLATES.contains(&view.template) {
            return Err(RenderError::UnknownTemplate(view.template.to_string()));
        }
        Ok(serde_json::to_string(&json!({
            "template": view.template,
            "data": view.data,
        }))?)
    }
}

pub struct Harness {
    pub server: MockServer,
    pub store: MemoryStore,
    pub app: Router,
}

impl Harness {
    pub async fn start() -> Self {
        let server = MockServer::start().await;
        let store = MemoryStore::new(3600);
        let state = AppState::new(
            Config::for_base_url(&server.uri()),
            SessionStore::Memory(store.clone()),
            Arc::new(JsonRenderer),
        )
        .unwrap();
        Harness {
            server,
            store,
            app: app(state),
        }
    }

    pub async fn seed(&self, data: SessionData) {
        self.store.save(SID, data).await;
    }

    pub async fn session(&self) -> SessionData {
        self.store.load(SID).await.expect("session was not saved")
    }

    pub async fn send(&self, request: Request<Body>) -> Response<Body> {
        self.app.clone().oneshot(request).await.unwrap()
    }

    pub async fn upstream_calls(&self) -> usize {
        self.server.received_requests().await.unwrap().len()
    }
}

pub fn get(uri: &str) -> Request<Body> {
    Request::builder()
        .uri(uri)
        .method("GET")
        .header(header::COOKIE, format!("book_portal_sid={}", SID))
        .header(header::REFERER, REFERER)
        .body(Body::empty())
        .unwrap()
}

pub fn post_form(uri: &str, form: &str) -> Request<Body> {
    Request::builder()
        .uri(uri)
        .method("POST")
        .header(header::COOKIE, format!("book_portal_sid={}", SID))
        .header(header::REFERER, REFERER)
        .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
        .body(Body::from(form.to_string()))
        .unwrap()
}

pub async fn body_json(response: Response<Body>) -> Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

pub async fn body_text(response: Response<Body>) -> String {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    String::from_utf8(bytes.to_vec()).unwrap()
}

pub fn location(response: &Response<Body>) -> &str {
    response.headers()[header::LOCATION].to_str().unwrap()
}

pub fn flash(session: &SessionData, channel: &str) -> Vec<Value> {
    session.flash.get(channel).cloned().unwrap_or_default()
}
