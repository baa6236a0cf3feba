use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Пользователь, сохранённый в сессии после входа.
///
/// Нам нужен только `id`, остальные поля API отдаются во view как есть.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionUser {
    pub id: i64,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl SessionUser {
    pub fn new(id: i64) -> Self {
        Self { id, extra: Map::new() }
    }
}
