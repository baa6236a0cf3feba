//! Контракт с шаблонизатором: имя шаблона + данные на входе, HTML на выходе.
//! Плюс редиректы, которыми заканчивается большинство обработчиков.

use axum::{
    http::{header, HeaderMap, StatusCode},
    response::{Html, IntoResponse, Response},
};
use serde_json::Value;
use tracing::error;

/// Что отрендерить: имя шаблона (`books/detail`) и данные для него.
#[derive(Debug, Clone, PartialEq)]
pub struct View {
    pub template: &'static str,
    pub data: Value,
}

impl View {
    pub fn new(template: &'static str, data: Value) -> Self {
        Self { template, data }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum RenderError {
    #[error("template `{0}` is not known")]
    UnknownTemplate(String),
    #[error("failed to serialize view data: {0}")]
    Data(#[from] serde_json::Error),
}

pub trait ViewRenderer: Send + Sync {
    fn render(&self, view: &View) -> Result<String, RenderError>;
}

/// Рендерер по умолчанию: минимальный HTML-документ, данные view встроены JSON-ом
/// в `<script type="application/json" id="view-data">` для клиентских шаблонов.
#[derive(Debug, Clone, Default)]
pub struct HtmlShell;

impl ViewRenderer for HtmlShell {
    fn render(&self, view: &View) -> Result<String, RenderError> {
        let title = view
            .data
            .get("pageTitle")
            .and_then(Value::as_str)
            .unwrap_or(view.template);
        // `</` внутри JSON закрыл бы тег script
        let data = serde_json::to_string(&view.data)?.replace("</", "<\\/");

        Ok(format!(
            "<!DOCTYPE html>\n<html>\n<head>\n<meta charset=\"utf-8\">\n<title>{}</title>\n</head>\n\
             <body data-view=\"{}\">\n<script type=\"application/json\" id=\"view-data\">{}</script>\n\
             </body>\n</html>\n",
            escape_html(title),
            escape_html(view.template),
            data
        ))
    }
}

fn escape_html(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    for c in raw.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}

pub fn render(renderer: &dyn ViewRenderer, view: View) -> Response {
    match renderer.render(&view) {
        Ok(html) => Html(html).into_response(),
        Err(e) => {
            error!("Failed to render {}: {}", view.template, e);
            (StatusCode::INTERNAL_SERVER_ERROR, "Failed to render page").into_response()
        }
    }
}

/// 302 на указанный адрес.
pub fn found(location: &str) -> Response {
    (StatusCode::FOUND, [(header::LOCATION, location.to_string())]).into_response()
}

/// 302 туда, откуда пришли (`Referer`), иначе на `/`.
pub fn back(headers: &HeaderMap) -> Response {
    let location = headers
        .get(header::REFERER)
        .and_then(|value| value.to_str().ok())
        .filter(|value| !value.is_empty())
        .unwrap_or("/");
    found(location)
}
