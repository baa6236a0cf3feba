//! booking.rs
//!
//! Сборка view-модели детальной страницы книги для текущего пользователя:
//! его отзыв, кнопка бронирования и экземпляр (владелец), к которому относится бронь.
//!
//! Состояние считается по упорядоченному списку правил `[reading, waiting, returning]`.
//! Правила проверяются все, и более позднее совпадение перекрывает раннее: если API
//! прислал пользователя сразу в нескольких списках, побеждает последний.

use serde::Serialize;
use serde_json::{Map, Value};

use crate::config::BookStatusCodes;
use crate::models::{Book, BookDetail, BookUser, Owner, Review, SessionUser};

/// Отношение пользователя к книге.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BookingState {
    NotBooked,
    Reading,
    Waiting,
    Returning,
}

/// Кнопка бронирования: подпись и код статуса, который уйдёт в `item[status]`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BookingButton {
    pub text: &'static str,
    pub status: i64,
}

impl BookingState {
    pub fn button(self, codes: &BookStatusCodes) -> BookingButton {
        let (text, status) = match self {
            BookingState::NotBooked => ("Want to Read", codes.waiting),
            BookingState::Reading => ("Want to Return", codes.returning),
            BookingState::Waiting => ("Cancel waiting this book", codes.cancel_waiting),
            BookingState::Returning => ("You are returning this book", codes.returned),
        };
        BookingButton { text, status }
    }
}

fn listed(user_id: i64, users: &[BookUser]) -> bool {
    users.iter().any(|u| u.id == user_id)
}

/// Последнее сработавшее правило из `[reading, waiting, returning]`.
pub fn booking_state(
    user_id: i64,
    reading: &[BookUser],
    waiting: &[BookUser],
    returning: &[BookUser],
) -> BookingState {
    [
        (BookingState::Reading, reading),
        (BookingState::Waiting, waiting),
        (BookingState::Returning, returning),
    ]
    .into_iter()
    .filter(|(_, users)| listed(user_id, users))
    .map(|(state, _)| state)
    .last()
    .unwrap_or(BookingState::NotBooked)
}

/// Владелец экземпляра, на который указывает запись пользователя в списке.
/// При нескольких записях берётся последняя, для которой владелец нашёлся.
pub fn owner_for(user_id: i64, users: &[BookUser], owners: &[Owner]) -> Option<Owner> {
    users
        .iter()
        .filter(|u| u.id == user_id)
        .filter_map(|u| {
            let owner_id = u.owner_id?;
            owners.iter().find(|owner| owner.id == owner_id)
        })
        .last()
        .cloned()
}

/// Первый отзыв текущего пользователя в порядке списка.
pub fn review_by(user_id: i64, reviews: &[Review]) -> Option<Review> {
    reviews.iter().find(|r| r.user.id == user_id).cloned()
}

/// Поля, которые добавляются к `item` перед рендером.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BookingView {
    pub btn_booking: BookingButton,
    pub current_user_review: Option<Review>,
    pub return_book_for_owner: Option<Owner>,
    pub cancel_book_for_owner: Option<Owner>,
    pub returning_book_to_owner: Option<Owner>,
}

impl BookingView {
    pub fn derive(book: &Book, user: Option<&SessionUser>, codes: &BookStatusCodes) -> Self {
        let Some(user) = user else {
            return Self {
                btn_booking: BookingState::NotBooked.button(codes),
                current_user_review: None,
                return_book_for_owner: None,
                cancel_book_for_owner: None,
                returning_book_to_owner: None,
            };
        };

        let reading = book.users_reading.as_deref().unwrap_or_default();
        let waiting = book.users_waiting.as_deref().unwrap_or_default();
        let returning = book.users_returning.as_deref().unwrap_or_default();

        Self {
            btn_booking: booking_state(user.id, reading, waiting, returning).button(codes),
            current_user_review: review_by(user.id, &book.reviews_detail),
            return_book_for_owner: owner_for(user.id, reading, &book.owners),
            cancel_book_for_owner: owner_for(user.id, waiting, &book.owners),
            returning_book_to_owner: owner_for(user.id, returning, &book.owners),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct DetailItem {
    #[serde(flatten)]
    pub book: Book,
    #[serde(flatten)]
    pub booking: BookingView,
}

/// Ответ `books/:id` с дополненным `item`.
#[derive(Debug, Clone, Serialize)]
pub struct DetailView {
    pub item: DetailItem,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

pub fn assemble_detail(
    detail: BookDetail,
    user: Option<&SessionUser>,
    codes: &BookStatusCodes,
) -> DetailView {
    let booking = BookingView::derive(&detail.item, user, codes);
    DetailView {
        item: DetailItem {
            book: detail.item,
            booking,
        },
        extra: detail.extra,
    }
}
