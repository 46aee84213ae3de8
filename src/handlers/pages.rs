use axum::response::Html;
use axum::Json;
use serde_json::{json, Value};

const INDEX_HTML: &str = include_str!("../../static/index.html");

/// The single-page upload client, compiled into the binary.
pub async fn index() -> Html<&'static str> {
    Html(INDEX_HTML)
}

pub async fn health() -> Json<Value> {
    Json(json!({ "status": "ok" }))
}
