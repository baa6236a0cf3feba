use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};

/// Ответ `GET books/:id`: сама книга лежит в `item`, остальное уходит во view без изменений.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BookDetail {
    pub item: Book,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Книга в том виде, в каком её отдаёт API.
///
/// Типизированы только поля, из которых считается состояние бронирования
/// текущего пользователя. Всё остальное проходит насквозь через `extra`.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Book {
    #[serde(default)]
    pub id: Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub office: Option<Value>,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub owners: Vec<Owner>,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub reviews_detail: Vec<Review>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub users_reading: Option<Vec<BookUser>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub users_waiting: Option<Vec<BookUser>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub users_returning: Option<Vec<BookUser>>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Book {
    /// `office.id`, если API его прислал.
    pub fn office_id(&self) -> Option<Value> {
        self.office.as_ref()?.get("id").cloned()
    }
}

// API иногда присылает `null` вместо пустого списка
fn null_as_empty<'de, D, T>(deserializer: D) -> Result<Vec<T>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Ok(Option::<Vec<T>>::deserialize(deserializer)?.unwrap_or_default())
}

/// Владелец экземпляра книги.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Owner {
    pub id: i64,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Пользователь в одном из списков `users_reading` / `users_waiting` / `users_returning`.
/// `owner_id` указывает, о чьём экземпляре идёт речь.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BookUser {
    pub id: i64,
    #[serde(default)]
    pub owner_id: Option<i64>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Review {
    pub user: ReviewAuthor,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReviewAuthor {
    pub id: i64,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn unknown_fields_survive_round_trip_through_the_view() {
        let raw = json!({
            "item": {
                "id": 7,
                "title": "Rust in Action",
                "office": { "id": 2, "name": "Hanoi" },
                "owners": [{ "id": 11, "name": "Lan" }],
                "reviews_detail": [],
                "users_reading": [{ "id": 5, "owner_id": 11, "name": "Minh" }]
            },
            "message": { "status": true }
        });

        let detail: BookDetail = serde_json::from_value(raw).unwrap();
        assert_eq!(detail.item.office_id(), Some(json!(2)));
        assert_eq!(detail.item.extra["title"], json!("Rust in Action"));
        assert_eq!(detail.extra["message"], json!({ "status": true }));

        let back = serde_json::to_value(&detail).unwrap();
        assert_eq!(back["item"]["users_reading"][0]["name"], json!("Minh"));
        assert!(back["item"].get("users_waiting").is_none());
    }

    #[test]
    fn missing_lists_default_to_empty() {
        let book: Book = serde_json::from_value(json!({ "id": 1, "owners": null })).unwrap();
        assert!(book.owners.is_empty());
        assert!(book.reviews_detail.is_empty());
        assert!(book.users_reading.is_none());
        assert_eq!(book.office_id(), None);
    }
}
