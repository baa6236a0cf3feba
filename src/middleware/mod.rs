use axum::{
    extract::{FromRequestParts, Request, State},
    http::request::Parts,
    middleware::Next,
    response::{IntoResponse, Response},
};
use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};
use std::sync::Arc;
use tracing::{debug, error};

use crate::models::SessionUser;
use crate::session::{Session, SessionData};
use crate::view::found;
use crate::AppState;

/// Загружает сессию по cookie (или заводит новую), отдаёт её обработчику через
/// extensions и сохраняет после ответа, если в ней что-то есть.
pub async fn session_layer(
    State(state): State<Arc<AppState>>,
    jar: CookieJar,
    mut req: Request,
    next: Next,
) -> Response {
    let cookie_name = state.config.session.cookie_name.clone();

    let existing = match jar.get(&cookie_name).map(|c| c.value().to_string()) {
        Some(id) => match state.sessions.load(&id).await {
            Ok(Some(data)) => Some((id, data)),
            Ok(None) => None,
            Err(e) => {
                // Хранилище недоступно - продолжаем с пустой сессией
                error!("Failed to load session: {}", e);
                None
            }
        },
        None => None,
    };
    let is_new = existing.is_none();
    let (id, data) = existing.unwrap_or_else(|| {
        let id = uuid::Uuid::new_v4().to_string();
        debug!("Starting new session {}", id);
        (id, SessionData::default())
    });

    let session = Session::new(id, data);
    req.extensions_mut().insert(session.clone());

    let response = next.run(req).await;

    let data = session.snapshot().await;
    // Пустую новую сессию не храним и cookie не выдаём
    if is_new && data == SessionData::default() {
        return response;
    }

    if let Err(e) = state.sessions.save(session.id(), &data).await {
        error!("Failed to save session {}: {}", session.id(), e);
    }

    if is_new {
        let cookie = Cookie::build((cookie_name, session.id().to_string()))
            .path("/")
            .http_only(true)
            .same_site(SameSite::Lax);
        (jar.add(cookie), response).into_response()
    } else {
        response
    }
}

/// Пользователь, вошедший через внешний контроллер авторизации.
#[derive(Debug, Clone)]
pub struct AuthUser {
    pub user: SessionUser,
    pub access_token: Option<String>,
    pub session: Session,
}

impl AuthUser {
    pub fn token(&self) -> Option<&str> {
        self.access_token.as_deref()
    }
}

// Session-based auth extractor
impl FromRequestParts<Arc<AppState>> for AuthUser {
    type Rejection = Response;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &Arc<AppState>,
    ) -> Result<Self, Self::Rejection> {
        let session = Session::from_request_parts(parts, state)
            .await
            .map_err(IntoResponse::into_response)?;

        // Нет пользователя в сессии - на страницу входа
        let user = session
            .user()
            .await
            .ok_or_else(|| found(&state.config.routes.login_path))?;
        let access_token = session.access_token().await;

        Ok(AuthUser {
            user,
            access_token,
            session,
        })
    }
}
