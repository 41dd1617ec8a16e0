use std::{collections::HashMap, sync::Arc};

use axum::{
    extract::{Path, RawQuery, State},
    http::{HeaderMap, Method, StatusCode},
    routing::{any, get},
    Json, Router,
};
use chrono::{DateTime, SubsecRound, Utc};
use serde::{Deserialize, Serialize};
use tokio::{net::TcpListener, sync::RwLock};
use uuid::Uuid;

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Item {
    pub id: Uuid,
    pub title: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Deserialize)]
pub struct CreateItem {
    pub title: String,
}

/// What the server saw of a request, returned by `/v1/echo`.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Echo {
    pub method: String,
    pub query: Option<String>,
    pub content_type: Option<String>,
    pub authorization: Option<String>,
    pub cache_control: Option<String>,
}

pub type Db = Arc<RwLock<HashMap<Uuid, Item>>>;

pub fn app() -> Router {
    let db: Db = Arc::new(RwLock::new(HashMap::new()));
    Router::new()
        .route("/v1/items", get(list_items).post(create_item))
        .route("/v1/items/{id}", get(get_item).delete(delete_item))
        .route("/v1/status/{code}", any(status))
        .route("/v1/echo", any(echo))
        .route("/v1/blob/{size}", get(blob))
        .with_state(db)
}

pub async fn run(listener: TcpListener) -> Result<(), std::io::Error> {
    axum::serve(listener, app()).await
}

async fn list_items(State(db): State<Db>) -> Json<Vec<Item>> {
    let items = db.read().await;
    let mut items: Vec<Item> = items.values().cloned().collect();
    items.sort_by_key(|item| item.created_at);
    Json(items)
}

async fn create_item(
    State(db): State<Db>,
    Json(input): Json<CreateItem>,
) -> (StatusCode, Json<Item>) {
    let item = Item {
        id: Uuid::new_v4(),
        title: input.title,
        created_at: Utc::now().trunc_subsecs(0),
    };
    tracing::debug!(id = %item.id, "created item");
    db.write().await.insert(item.id, item.clone());
    (StatusCode::CREATED, Json(item))
}

async fn get_item(
    State(db): State<Db>,
    Path(id): Path<Uuid>,
) -> Result<Json<Item>, StatusCode> {
    let items = db.read().await;
    items.get(&id).cloned().map(Json).ok_or(StatusCode::NOT_FOUND)
}

async fn delete_item(
    State(db): State<Db>,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, StatusCode> {
    let mut items = db.write().await;
    items.remove(&id).map(|_| StatusCode::NO_CONTENT).ok_or(StatusCode::NOT_FOUND)
}

/// Answer with the requested status code and an empty JSON object.
async fn status(Path(code): Path<u16>) -> Result<(StatusCode, Json<serde_json::Value>), StatusCode> {
    let code = StatusCode::from_u16(code).map_err(|_| StatusCode::BAD_REQUEST)?;
    Ok((code, Json(serde_json::json!({}))))
}

/// A JSON string of `size` characters.
async fn blob(Path(size): Path<usize>) -> Json<String> {
    Json("x".repeat(size))
}

async fn echo(method: Method, RawQuery(query): RawQuery, headers: HeaderMap) -> Json<Echo> {
    let header = |name: &str| {
        headers
            .get(name)
            .and_then(|value| value.to_str().ok())
            .map(str::to_string)
    };
    Json(Echo {
        method: method.to_string(),
        query,
        content_type: header("content-type"),
        authorization: header("authorization"),
        cache_control: header("cache-control"),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn item_serializes_with_iso8601_timestamp() {
        let item = Item {
            id: Uuid::nil(),
            title: "Test".to_string(),
            created_at: DateTime::parse_from_rfc3339("2024-01-02T03:04:05Z")
                .unwrap()
                .with_timezone(&Utc),
        };
        let json = serde_json::to_value(&item).unwrap();
        assert_eq!(json["id"], "00000000-0000-0000-0000-000000000000");
        assert_eq!(json["title"], "Test");
        assert_eq!(json["created_at"], "2024-01-02T03:04:05Z");
    }

    #[test]
    fn item_roundtrips_through_json() {
        let item = Item {
            id: Uuid::new_v4(),
            title: "Roundtrip".to_string(),
            created_at: Utc::now().trunc_subsecs(0),
        };
        let json = serde_json::to_string(&item).unwrap();
        let back: Item = serde_json::from_str(&json).unwrap();
        assert_eq!(back, item);
    }

    #[test]
    fn create_item_rejects_missing_title() {
        let result: Result<CreateItem, _> = serde_json::from_str(r#"{"name":"x"}"#);
        assert!(result.is_err());
    }
}
