//! books.rs
//!
//! Маршруты `/books`: список и фильтр по категории, детальная страница,
//! отзывы и бронирование, формы добавления/редактирования и заявки на одобрение.
//!
//! Все данные живут во внешнем API. Обработчик проверяет вход, ходит в API
//! (несколько вызовов параллельно, если странице нужно несколько секций),
//! собирает данные для шаблона и либо рендерит страницу, либо делает редирект
//! с flash-сообщением.

use axum::{
    extract::{rejection::FormRejection, Path, Query, State},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Form, Router,
};
use serde_json::json;
use std::sync::Arc;
use tracing::{error, info, warn};

use crate::middleware::AuthUser;
use crate::models::BookDetail;
use crate::services::aggregate::ParallelFetch;
use crate::services::booking::assemble_detail;
use crate::services::upstream::{Upstream, Verdict};
use crate::session::{FlashKind, Session};
use crate::validation::{
    self, page_or_first, BookingBody, BookingForm, CategoryParam, FieldError, IdParam, ListQuery,
    PageQuery, ReviewForm,
};
use crate::view::{back, found, View};
use crate::AppState;

const BOOK_NOT_SHOWN: &str = "Don't allow show this book";
const APPROVE_NOT_SHOWN: &str = "Don't allow show approve request page";
const REVIEW_THANKS: &str = "Thank for your review";
const REVIEW_LOGIN: &str = "Please login to review this book";
const REVIEW_FAILED: &str = "Don't allow review this book";
const BOOKING_DONE: &str = "Booking success";
const BOOKING_LOGIN: &str = "Please login to booking this book";
const BOOKING_FAILED: &str = "Don't allow booking this book";

pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/", get(list_books))
        .route("/add", get(add_form))
        .route("/waiting_approve", get(waiting_approve))
        .route("/category/{category_id}", get(books_by_category))
        .route("/review/{id}", post(submit_review))
        .route("/booking/{id}", post(submit_booking))
        .route("/{id}", get(book_detail))
        .route("/{id}/approve-request", get(approve_request))
        .route("/{id}/edit", get(edit_form))
}

/* ---------- helpers ---------- */

fn bad_request(errors: &[FieldError]) -> Response {
    (StatusCode::BAD_REQUEST, validation::report(errors)).into_response()
}

// Ошибки формы уходят во flash, пользователь возвращается к форме отзыва
async fn back_to_form(session: &Session, id: &str, errors: Vec<FieldError>) -> Response {
    session
        .flash_all(FlashKind::Errors, errors.iter().map(|e| json!(e)))
        .await;
    found(&format!("/books/{}#form-review", id))
}

/* ---------- LIST ---------- */

// GET /books?field=&page=&officeId=
async fn list_books(
    State(state): State<Arc<AppState>>,
    session: Session,
    Query(query): Query<ListQuery>,
) -> Response {
    if let Err(errors) = validation::check(&query) {
        return bad_request(&errors);
    }

    let page = page_or_first(query.page.as_deref());
    let mut section = state
        .upstream
        .get("books/")
        .query("field", &query.field)
        .query("page", &page);
    if let Some(office_id) = query.office_id.as_deref().filter(|id| !id.is_empty()) {
        section = section.query("office_id", office_id);
    }

    let fetched = ParallelFetch::new()
        .spawn("section", section.json())
        .spawn("categories", state.upstream.get("categories").json())
        .spawn("sortBookBy", state.upstream.get("books/sort-by").json())
        .join()
        .await;

    let mut results = match fetched {
        Ok(results) => results,
        Err(e) => {
            error!("list_books fetch failed: {}", e);
            return (StatusCode::BAD_REQUEST, e.to_string()).into_response();
        }
    };

    state.render(View::new(
        "books/section",
        json!({
            "field": query.field,
            "page": page,
            "officeId": query.office_id,
            "section": results.take("section"),
            "categories": results.take("categories"),
            "sortBookBy": results.take("sortBookBy"),
            "error": session.take_flash(FlashKind::Error).await,
            "info": session.take_flash(FlashKind::Info).await,
        }),
    ))
}

// GET /books/category/{category_id}?page=
async fn books_by_category(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(category_id): Path<String>,
    Query(query): Query<PageQuery>,
) -> Response {
    let param = CategoryParam { category_id };
    if let Err(errors) = validation::check(&param) {
        return bad_request(&errors);
    }

    let page = page_or_first(query.page.as_deref());
    let books = state
        .upstream
        .get(&format!("books/category/{}/", param.category_id))
        .query("page", &page);

    let fetched = ParallelFetch::new()
        .spawn("books", books.json())
        .spawn("categories", state.upstream.get("categories").json())
        .spawn("sortBookBy", state.upstream.get("books/sort-by").json())
        .join()
        .await;

    let mut results = match fetched {
        Ok(results) => results,
        Err(e) => {
            error!("books_by_category fetch failed: {}", e);
            return back(&headers);
        }
    };

    state.render(View::new(
        "books/category",
        json!({
            "books": results.take("books"),
            "categories": results.take("categories"),
            "sortBookBy": results.take("sortBookBy"),
        }),
    ))
}

/* ---------- DETAIL ---------- */

// GET /books/{id}
//
// Первый просмотр за сессию увеличивает счётчик и перенаправляет на себя же.
// Маркер в сессии один на все книги.
async fn book_detail(
    State(state): State<Arc<AppState>>,
    session: Session,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> Response {
    let param = IdParam { id };
    if let Err(errors) = validation::check(&param) {
        return bad_request(&errors);
    }
    let id = param.id;

    if session.book_detail_key().await.is_none() {
        let counted = state
            .upstream
            .get(&format!("books/{}/increase-view", id))
            .succeeded()
            .await;
        if counted {
            session
                .set_book_detail_key(uuid::Uuid::new_v4().simple().to_string())
                .await;
            return found(&format!("/books/{}", id));
        }
        session.flash(FlashKind::Error, BOOK_NOT_SHOWN).await;
        return back(&headers);
    }

    let detail = match state
        .upstream
        .get(&format!("books/{}", id))
        .json_as::<BookDetail>()
        .await
    {
        Upstream::Ok(detail) => detail,
        Upstream::Unavailable => {
            session.flash(FlashKind::Error, BOOK_NOT_SHOWN).await;
            return back(&headers);
        }
    };

    // Книга без офиса не показывается
    let Some(office_id) = detail.item.office_id() else {
        warn!("Book {} has no office", id);
        session.flash(FlashKind::Error, BOOK_NOT_SHOWN).await;
        return back(&headers);
    };

    let user = session.user().await;
    let data = assemble_detail(detail, user.as_ref(), &state.config.book_status);

    state.render(View::new(
        "books/detail",
        json!({
            "data": data,
            "pageTitle": "Detail",
            "officeId": office_id,
            "messages": session.take_flash(FlashKind::Errors).await,
            "error": session.take_flash(FlashKind::Error).await,
            "info": session.take_flash(FlashKind::Info).await,
        }),
    ))
}

/* ---------- REVIEWS & BOOKING ---------- */

// POST /books/review/{id}
async fn submit_review(
    State(state): State<Arc<AppState>>,
    auth: AuthUser,
    headers: HeaderMap,
    Path(id): Path<String>,
    form: Result<Form<ReviewForm>, FormRejection>,
) -> Response {
    let param = IdParam { id };
    if let Err(errors) = validation::check(&param) {
        return bad_request(&errors);
    }
    let id = param.id;

    let Form(form) = match form {
        Ok(form) => form,
        Err(rejection) => {
            warn!("Unreadable review form for book {}: {}", id, rejection);
            auth.session.flash(FlashKind::Error, REVIEW_FAILED).await;
            return back(&headers);
        }
    };
    if let Err(errors) = validation::check(&form) {
        return back_to_form(&auth.session, &id, errors).await;
    }

    let outcome = state
        .upstream
        .post(&format!("books/review/{}", id))
        .form(&[("item[content]", form.content.clone()), ("item[star]", form.star())])
        .auth(auth.token())
        .send()
        .await;

    let (kind, message) = match outcome.map(|o| o.verdict()) {
        Ok(Verdict::Accepted) => {
            info!("User {} reviewed book {}", auth.user.id, id);
            (FlashKind::Info, REVIEW_THANKS)
        }
        Ok(Verdict::Unauthorized) => (FlashKind::Error, REVIEW_LOGIN),
        Ok(verdict) => {
            warn!("Review of book {} refused: {:?}", id, verdict);
            (FlashKind::Error, REVIEW_FAILED)
        }
        Err(e) => {
            warn!("Review of book {} not sent: {}", id, e);
            (FlashKind::Error, REVIEW_FAILED)
        }
    };
    auth.session.flash(kind, message).await;
    back(&headers)
}

// POST /books/booking/{id}
async fn submit_booking(
    State(state): State<Arc<AppState>>,
    auth: AuthUser,
    headers: HeaderMap,
    Path(id): Path<String>,
    body: Result<Form<BookingBody>, FormRejection>,
) -> Response {
    let Form(body) = match body {
        Ok(body) => body,
        Err(rejection) => {
            warn!("Unreadable booking form: {}", rejection);
            auth.session.flash(FlashKind::Error, BOOKING_FAILED).await;
            return back(&headers);
        }
    };
    let form = BookingForm::new(id, body);
    if let Err(errors) = validation::check(&form) {
        return back_to_form(&auth.session, &form.book_id, errors).await;
    }

    let outcome = state
        .upstream
        .post("books/booking")
        .form(&[
            ("item[book_id]", form.book_id.clone()),
            ("item[owner_id]", form.owner_id.clone()),
            ("item[status]", form.status.clone()),
        ])
        .auth(auth.token())
        .send()
        .await;

    let (kind, message) = match outcome.map(|o| o.verdict()) {
        Ok(Verdict::Accepted) => {
            info!(
                "User {} booked book {} (owner {}, status {})",
                auth.user.id, form.book_id, form.owner_id, form.status
            );
            (FlashKind::Info, BOOKING_DONE.to_string())
        }
        Ok(Verdict::Unauthorized) => (FlashKind::Error, BOOKING_LOGIN.to_string()),
        // API сам объясняет, почему отказал
        Ok(Verdict::Rejected(Some(description))) => (FlashKind::Error, description),
        Ok(verdict) => {
            warn!("Booking of book {} refused: {:?}", form.book_id, verdict);
            (FlashKind::Error, BOOKING_FAILED.to_string())
        }
        Err(e) => {
            warn!("Booking of book {} not sent: {}", form.book_id, e);
            (FlashKind::Error, BOOKING_FAILED.to_string())
        }
    };
    auth.session.flash(kind, message).await;
    back(&headers)
}

/* ---------- FORMS ---------- */

// GET /books/add
async fn add_form(
    State(state): State<Arc<AppState>>,
    auth: AuthUser,
    headers: HeaderMap,
) -> Response {
    let fetched = ParallelFetch::new()
        .spawn("offices", state.upstream.get("offices").json())
        .spawn("categories", state.upstream.get("categories").json())
        .join()
        .await;

    let mut results = match fetched {
        Ok(results) => results,
        Err(e) => {
            error!("add_form fetch failed: {}", e);
            return back(&headers);
        }
    };

    state.render(View::new(
        "books/add",
        json!({
            "categories": results.take("categories"),
            "offices": results.take("offices"),
            "officeId": auth.session.office_id().await,
        }),
    ))
}

// GET /books/{id}/edit
async fn edit_form(
    State(state): State<Arc<AppState>>,
    auth: AuthUser,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> Response {
    let param = IdParam { id };
    if let Err(errors) = validation::check(&param) {
        return bad_request(&errors);
    }

    let book = state
        .upstream
        .get(&format!("books/{}", param.id))
        .auth(auth.token());

    let fetched = ParallelFetch::new()
        .spawn("offices", state.upstream.get("offices").json())
        .spawn("categories", state.upstream.get("categories").json())
        .spawn("book", book.json())
        .join()
        .await;

    let mut results = match fetched {
        Ok(results) => results,
        Err(e) => {
            error!("edit_form fetch failed: {}", e);
            return back(&headers);
        }
    };

    state.render(View::new(
        "books/edit",
        json!({
            "categories": results.take("categories"),
            "offices": results.take("offices"),
            "officeId": auth.session.office_id().await,
            "book": results.take("book"),
        }),
    ))
}

/* ---------- APPROVALS ---------- */

// GET /books/waiting_approve
async fn waiting_approve(State(state): State<Arc<AppState>>, auth: AuthUser) -> Response {
    let books = state
        .upstream
        .get("user/books/waiting_approve")
        .auth(auth.token())
        .json()
        .await;

    match books {
        Upstream::Ok(books) => state.render(View::new(
            "books/waiting_approve",
            json!({
                "books": books,
                "pageTitle": "Home",
                "info": auth.session.take_flash(FlashKind::Info).await,
                "error": auth.session.take_flash(FlashKind::Error).await,
            }),
        )),
        Upstream::Unavailable => found(&state.config.routes.home_path),
    }
}

// GET /books/{id}/approve-request
async fn approve_request(
    State(state): State<Arc<AppState>>,
    auth: AuthUser,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> Response {
    let param = IdParam { id };
    if let Err(errors) = validation::check(&param) {
        return bad_request(&errors);
    }

    let detail = state
        .upstream
        .get(&format!("user/{}/approve/detail", param.id))
        .auth(auth.token())
        .json()
        .await;

    match detail {
        Upstream::Ok(data) => state.render(View::new(
            "books/approve_user",
            json!({
                "data": data,
                "pageTitle": "Approve requests",
            }),
        )),
        Upstream::Unavailable => {
            auth.session.flash(FlashKind::Error, APPROVE_NOT_SHOWN).await;
            back(&headers)
        }
    }
}
