//! upstream.rs
//!
//! Клиент к REST API, которому принадлежат все данные о книгах, офисах и пользователях.
//!
//! Чтения никогда не возвращают ошибку: сетевой сбой, таймаут, статус не 200 или
//! невалидный JSON превращаются в [`Upstream::Unavailable`], и вызывающий код сам решает,
//! показать страницу без этой секции или сделать редирект.
//! Мутации (`post`) отдают статус и тело, чтобы обработчик мог ветвиться по коду ответа.

use reqwest::{header, RequestBuilder, StatusCode};
use serde::{de::DeserializeOwned, Deserialize, Serialize, Serializer};
use serde_json::Value;
use std::time::Duration;
use tracing::{debug, warn};

use crate::config::UpstreamConfig;

/// Результат чтения из API: данные или "секция недоступна".
#[derive(Debug, Clone, PartialEq)]
pub enum Upstream<T> {
    Ok(T),
    Unavailable,
}

impl<T> Upstream<T> {
    pub fn is_available(&self) -> bool {
        matches!(self, Upstream::Ok(_))
    }
}

// Во view недоступная секция приходит как `null`
impl<T: Serialize> Serialize for Upstream<T> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Upstream::Ok(value) => value.serialize(serializer),
            Upstream::Unavailable => serializer.serialize_none(),
        }
    }
}

/// Транспортная ошибка при мутации (ответа нет вообще).
#[derive(Debug, thiserror::Error)]
pub enum UpstreamError {
    #[error("upstream request failed: {0}")]
    Transport(#[from] reqwest::Error),
}

/// Как обработчик должен трактовать ответ на POST.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Verdict {
    /// 200
    Accepted,
    /// 401
    Unauthorized,
    /// 500, с текстом `message.description`, если API его прислал
    Rejected(Option<String>),
    Failed,
}

#[derive(Debug, Clone)]
pub struct PostOutcome {
    pub status: StatusCode,
    pub body: String,
}

#[derive(Deserialize)]
struct ErrorBody {
    message: ErrorMessage,
}

#[derive(Deserialize)]
struct ErrorMessage {
    description: String,
}

impl PostOutcome {
    pub fn verdict(&self) -> Verdict {
        match self.status {
            StatusCode::OK => Verdict::Accepted,
            StatusCode::UNAUTHORIZED => Verdict::Unauthorized,
            StatusCode::INTERNAL_SERVER_ERROR => Verdict::Rejected(
                serde_json::from_str::<ErrorBody>(&self.body)
                    .ok()
                    .map(|body| body.message.description),
            ),
            _ => Verdict::Failed,
        }
    }
}

/// HTTP-клиент к API. Дёшево клонируется: внутри один общий `reqwest::Client`.
#[derive(Clone)]
pub struct UpstreamClient {
    base_url: String,
    http_client: reqwest::Client,
}

impl UpstreamClient {
    pub fn from_config(config: &UpstreamConfig) -> Result<Self, reqwest::Error> {
        let mut headers = header::HeaderMap::new();
        headers.insert(header::ACCEPT, header::HeaderValue::from_static("application/json"));

        let http_client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_seconds))
            .user_agent(config.user_agent.clone())
            .default_headers(headers)
            .build()?;

        Ok(Self {
            base_url: config.base_url.clone(),
            http_client,
        })
    }

    pub fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path.trim_start_matches('/'))
    }

    pub fn get(&self, path: &str) -> Call {
        let url = self.url(path);
        Call {
            builder: self.http_client.get(&url),
            url,
        }
    }

    pub fn post(&self, path: &str) -> Call {
        let url = self.url(path);
        Call {
            builder: self.http_client.post(&url),
            url,
        }
    }
}

/// Один запрос к API, собранный по кусочкам.
pub struct Call {
    builder: RequestBuilder,
    url: String,
}

impl Call {
    pub fn query(mut self, key: &str, value: &str) -> Self {
        self.builder = self.builder.query(&[(key, value)]);
        self
    }

    /// Добавляет `Authorization`, если в сессии есть токен.
    pub fn auth(mut self, token: Option<&str>) -> Self {
        if let Some(token) = token {
            self.builder = self.builder.header(header::AUTHORIZATION, bearer(token));
        }
        self
    }

    /// Тело `application/x-www-form-urlencoded`, ключи вида `item[content]`.
    pub fn form(mut self, pairs: &[(&str, String)]) -> Self {
        self.builder = self.builder.form(pairs);
        self
    }

    pub async fn json(self) -> Upstream<Value> {
        self.json_as::<Value>().await
    }

    pub async fn json_as<T: DeserializeOwned>(self) -> Upstream<T> {
        let response = match self.builder.send().await {
            Ok(response) => response,
            Err(e) => {
                warn!("GET {} failed: {}", self.url, e);
                return Upstream::Unavailable;
            }
        };

        if response.status() != StatusCode::OK {
            warn!("GET {} returned {}", self.url, response.status());
            return Upstream::Unavailable;
        }

        let body = match response.bytes().await {
            Ok(body) => body,
            Err(e) => {
                warn!("GET {} body read failed: {}", self.url, e);
                return Upstream::Unavailable;
            }
        };

        match serde_json::from_slice::<T>(&body) {
            Ok(value) => {
                debug!("GET {} ok", self.url);
                Upstream::Ok(value)
            }
            Err(e) => {
                warn!("GET {} returned malformed JSON: {}", self.url, e);
                Upstream::Unavailable
            }
        }
    }

    /// Только проверка статуса 200, тело не разбирается.
    pub async fn succeeded(self) -> bool {
        match self.builder.send().await {
            Ok(response) if response.status() == StatusCode::OK => true,
            Ok(response) => {
                warn!("GET {} returned {}", self.url, response.status());
                false
            }
            Err(e) => {
                warn!("GET {} failed: {}", self.url, e);
                false
            }
        }
    }

    pub async fn send(self) -> Result<PostOutcome, UpstreamError> {
        let response = self.builder.send().await?;
        let status = response.status();
        let body = response.text().await?;
        debug!("POST {} returned {}", self.url, status);
        Ok(PostOutcome { status, body })
    }
}

fn bearer(token: &str) -> String {
    if token.starts_with("Bearer ") {
        token.to_string()
    } else {
        format!("Bearer {}", token)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use serde_json::json;
    use wiremock::matchers::{body_string_contains, header, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn client_for(server: &MockServer) -> UpstreamClient {
        let config = Config::for_base_url(&server.uri());
        UpstreamClient::from_config(&config.upstream).unwrap()
    }

    #[tokio::test]
    async fn json_returns_payload_on_200() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/categories"))
            .and(header("accept", "application/json"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([{ "id": 1 }])))
            .mount(&server)
            .await;

        let result = client_for(&server).get("categories").json().await;
        assert_eq!(result, Upstream::Ok(json!([{ "id": 1 }])));
    }

    #[tokio::test]
    async fn non_200_and_bad_json_are_unavailable() {
        let server = MockServer::start().await;
        Mock::given(path("/offices"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;
        Mock::given(path("/categories"))
            .respond_with(ResponseTemplate::new(200).set_body_string("<html>oops"))
            .mount(&server)
            .await;

        let client = client_for(&server);
        assert_eq!(client.get("offices").json().await, Upstream::Unavailable);
        assert_eq!(client.get("categories").json().await, Upstream::Unavailable);
    }

    #[tokio::test]
    async fn connection_refused_is_unavailable() {
        let config = Config::for_base_url("http://127.0.0.1:1");
        let client = UpstreamClient::from_config(&config.upstream).unwrap();
        assert_eq!(client.get("categories").json().await, Upstream::Unavailable);
        assert!(!client.get("books/1/increase-view").succeeded().await);
    }

    #[tokio::test]
    async fn query_and_bearer_token_are_attached() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/books/"))
            .and(query_param("field", "title"))
            .and(query_param("page", "2"))
            .and(header("authorization", "Bearer secret"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "items": [] })))
            .expect(1)
            .mount(&server)
            .await;

        let result = client_for(&server)
            .get("books/")
            .query("field", "title")
            .query("page", "2")
            .auth(Some("secret"))
            .json()
            .await;
        assert!(result.is_available());
    }

    #[tokio::test]
    async fn post_sends_bracketed_form_keys() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/books/review/3"))
            .and(body_string_contains("item%5Bcontent%5D=Great"))
            .respond_with(ResponseTemplate::new(200))
            .expect(1)
            .mount(&server)
            .await;

        let outcome = client_for(&server)
            .post("books/review/3")
            .form(&[("item[content]", "Great".to_string()), ("item[star]", "5".to_string())])
            .send()
            .await
            .unwrap();
        assert_eq!(outcome.verdict(), Verdict::Accepted);
    }

    #[test]
    fn verdict_extracts_server_message() {
        let outcome = PostOutcome {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            body: json!({ "message": { "status": false, "description": "Book is not available" } })
                .to_string(),
        };
        assert_eq!(
            outcome.verdict(),
            Verdict::Rejected(Some("Book is not available".to_string()))
        );

        let garbled = PostOutcome {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            body: "gateway exploded".to_string(),
        };
        assert_eq!(garbled.verdict(), Verdict::Rejected(None));

        let forbidden = PostOutcome {
            status: StatusCode::FORBIDDEN,
            body: String::new(),
        };
        assert_eq!(forbidden.verdict(), Verdict::Failed);
    }

    #[test]
    fn unavailable_serializes_as_null() {
        let value = serde_json::to_value(Upstream::<Value>::Unavailable).unwrap();
        assert_eq!(value, Value::Null);
        assert_eq!(serde_json::to_value(Upstream::Ok(3)).unwrap(), json!(3));
    }

    #[test]
    fn bearer_prefix_is_not_doubled() {
        assert_eq!(bearer("abc"), "Bearer abc");
        assert_eq!(bearer("Bearer abc"), "Bearer abc");
    }
}
