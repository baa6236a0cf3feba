//! Проверка входных данных маршрутов.
//!
//! Правила описаны через `validator`; ошибки разворачиваются в плоский список
//! `{location, param, msg, value}`, который понимают шаблоны формы.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::borrow::Cow;
use validator::{Validate, ValidationError, ValidationErrors};

pub fn is_alpha(value: &str) -> Result<(), ValidationError> {
    if !value.is_empty() && value.chars().all(|c| c.is_ascii_alphabetic()) {
        Ok(())
    } else {
        Err(rejected("isAlpha", value))
    }
}

pub fn is_int(value: &str) -> Result<(), ValidationError> {
    if value.trim() == value && value.parse::<i64>().is_ok() {
        Ok(())
    } else {
        Err(rejected("isInt", value))
    }
}

fn rejected(code: &'static str, value: &str) -> ValidationError {
    let mut err = ValidationError::new(code);
    err.add_param(Cow::from("value"), &value);
    err
}

/// Одна ошибка валидации в том виде, в каком её ждут шаблоны.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FieldError {
    pub location: &'static str,
    pub param: &'static str,
    pub msg: String,
    pub value: Value,
}

/// Поля входной структуры в порядке вывода ошибок и откуда они пришли.
pub trait Located {
    const FIELDS: &'static [(&'static str, &'static str)];
}

pub fn check<T: Validate + Located>(input: &T) -> Result<(), Vec<FieldError>> {
    match input.validate() {
        Ok(()) => Ok(()),
        Err(errors) => Err(flatten::<T>(&errors)),
    }
}

fn flatten<T: Located>(errors: &ValidationErrors) -> Vec<FieldError> {
    let by_field = errors.field_errors();
    let mut flat = Vec::new();
    for &(param, location) in T::FIELDS {
        let Some(errs) = by_field.get(param) else {
            continue;
        };
        for err in errs.iter() {
            flat.push(FieldError {
                location,
                param,
                msg: err
                    .message
                    .as_ref()
                    .map(|m| m.to_string())
                    .unwrap_or_else(|| "Invalid value".to_string()),
                value: err.params.get("value").cloned().unwrap_or(Value::Null),
            });
        }
    }
    flat
}

/// Текст ответа 400 для маршрутов чтения.
pub fn report(errors: &[FieldError]) -> String {
    format!(
        "There have been validation errors: {}",
        serde_json::to_string(errors).unwrap_or_default()
    )
}

// --- Входные структуры маршрутов ---

#[derive(Debug, Clone, Default, Deserialize, Validate)]
pub struct ListQuery {
    #[serde(default)]
    #[validate(
        length(min = 1, message = "Invalid field"),
        custom(function = "is_alpha", message = "Invalid field")
    )]
    pub field: String,
    pub page: Option<String>,
    #[serde(rename = "officeId")]
    pub office_id: Option<String>,
}

impl Located for ListQuery {
    const FIELDS: &'static [(&'static str, &'static str)] = &[("field", "query")];
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct PageQuery {
    pub page: Option<String>,
}

/// Пустое значение страницы считается отсутствующим.
pub fn page_or_first(page: Option<&str>) -> String {
    match page {
        Some(page) if !page.is_empty() => page.to_string(),
        _ => "1".to_string(),
    }
}

#[derive(Debug, Clone, Validate)]
pub struct IdParam {
    #[validate(
        length(min = 1, message = "Invalid id"),
        custom(function = "is_int", message = "Invalid id")
    )]
    pub id: String,
}

impl Located for IdParam {
    const FIELDS: &'static [(&'static str, &'static str)] = &[("id", "params")];
}

#[derive(Debug, Clone, Validate)]
pub struct CategoryParam {
    #[validate(
        length(min = 1, message = "Invalid category"),
        custom(function = "is_int", message = "Invalid category")
    )]
    pub category_id: String,
}

impl Located for CategoryParam {
    const FIELDS: &'static [(&'static str, &'static str)] = &[("category_id", "params")];
}

#[derive(Debug, Clone, Default, Deserialize, Validate)]
pub struct ReviewForm {
    #[serde(default)]
    #[validate(length(min = 1, max = 255))]
    pub content: String,
    pub star: Option<String>,
}

impl Located for ReviewForm {
    const FIELDS: &'static [(&'static str, &'static str)] = &[("content", "body")];
}

impl ReviewForm {
    /// Пустая или нулевая оценка превращается в 1.
    pub fn star(&self) -> String {
        match self.star.as_deref().map(str::trim) {
            None | Some("") | Some("0") => "1".to_string(),
            Some(star) if star.parse::<f64>().map(|s| s == 0.0).unwrap_or(false) => "1".to_string(),
            Some(star) => star.to_string(),
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct BookingBody {
    #[serde(default)]
    pub owner_id: String,
    #[serde(default)]
    pub status: String,
}

/// Бронирование: `book_id` из пути, остальное из тела формы.
#[derive(Debug, Clone, Validate)]
pub struct BookingForm {
    #[validate(
        length(min = 1, message = "Invalid book_id"),
        custom(function = "is_int", message = "Invalid book_id")
    )]
    pub book_id: String,
    #[validate(
        length(min = 1, message = "Invalid owner_id"),
        custom(function = "is_int", message = "Invalid owner_id")
    )]
    pub owner_id: String,
    #[validate(
        length(min = 1, message = "Invalid status"),
        custom(function = "is_int", message = "Invalid status")
    )]
    pub status: String,
}

impl Located for BookingForm {
    const FIELDS: &'static [(&'static str, &'static str)] = &[
        ("book_id", "params"),
        ("owner_id", "body"),
        ("status", "body"),
    ];
}

impl BookingForm {
    pub fn new(book_id: String, body: BookingBody) -> Self {
        Self {
            book_id,
            owner_id: body.owner_id,
            status: body.status,
        }
    }
}
