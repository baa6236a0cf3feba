//! Серверные сессии и flash-сообщения.
//!
//! Обработчики получают [`Session`] экстрактором; сохраняет её `middleware::session_layer`
//! после ответа.

pub mod store;

use axum::{extract::FromRequestParts, http::request::Parts, http::StatusCode};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::sync::Arc;
use tokio::sync::Mutex;

use crate::models::SessionUser;

pub use store::{MemoryStore, RedisStore, SessionStore};

#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    #[error("redis error: {0}")]
    Redis(#[from] redis::RedisError),
    #[error("corrupted session document: {0}")]
    Serde(#[from] serde_json::Error),
}

/// Каналы flash-сообщений.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlashKind {
    Error,
    Info,
    /// Ошибки валидации формы (список записей).
    Errors,
}

impl FlashKind {
    fn key(self) -> &'static str {
        match self {
            FlashKind::Error => "error",
            FlashKind::Info => "info",
            FlashKind::Errors => "errors",
        }
    }
}

/// Всё, что хранится в сессии между запросами.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SessionData {
    #[serde(default)]
    pub user: Option<SessionUser>,
    #[serde(default)]
    pub access_token: Option<String>,
    #[serde(default)]
    pub office_id: Option<Value>,
    /// Ставится один раз после первого увеличения счётчика просмотров.
    #[serde(default)]
    pub book_detail_key: Option<String>,
    #[serde(default)]
    pub flash: BTreeMap<String, Vec<Value>>,
}

/// Хэндл сессии текущего запроса.
#[derive(Debug, Clone)]
pub struct Session {
    id: String,
    data: Arc<Mutex<SessionData>>,
}

impl Session {
    pub fn new(id: String, data: SessionData) -> Self {
        Self {
            id,
            data: Arc::new(Mutex::new(data)),
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub async fn snapshot(&self) -> SessionData {
        self.data.lock().await.clone()
    }

    pub async fn user(&self) -> Option<SessionUser> {
        self.data.lock().await.user.clone()
    }

    pub async fn access_token(&self) -> Option<String> {
        self.data.lock().await.access_token.clone()
    }

    pub async fn office_id(&self) -> Option<Value> {
        self.data.lock().await.office_id.clone()
    }

    pub async fn book_detail_key(&self) -> Option<String> {
        self.data.lock().await.book_detail_key.clone()
    }

    pub async fn set_book_detail_key(&self, key: String) {
        self.data.lock().await.book_detail_key = Some(key);
    }

    pub async fn flash(&self, kind: FlashKind, message: impl Into<Value>) {
        self.data
            .lock()
            .await
            .flash
            .entry(kind.key().to_string())
            .or_default()
            .push(message.into());
    }

    pub async fn flash_all<I>(&self, kind: FlashKind, messages: I)
    where
        I: IntoIterator,
        I::Item: Into<Value>,
    {
        let mut data = self.data.lock().await;
        let channel = data.flash.entry(kind.key().to_string()).or_default();
        channel.extend(messages.into_iter().map(Into::into));
    }

    /// Читает и очищает канал.
    pub async fn take_flash(&self, kind: FlashKind) -> Vec<Value> {
        self.data
            .lock()
            .await
            .flash
            .remove(kind.key())
            .unwrap_or_default()
    }
}

impl<S: Send + Sync> FromRequestParts<S> for Session {
    type Rejection = StatusCode;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        // без session_layer сессии нет
        parts
            .extensions
            .get::<Session>()
            .cloned()
            .ok_or(StatusCode::INTERNAL_SERVER_ERROR)
    }
}
