//! Status callback receiver
//!
//! The downstream consumer reports progress to `POST /webhook`. Payloads are
//! validated and logged; nothing is stored.

use axum::{
    body::Bytes,
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
    Router,
};
use serde_json::Value;
use tower_http::trace::TraceLayer;
use tracing::info;

use crate::config::WebhookConfig;
use crate::error::CallbackError;

/// A validated status callback
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusCallback {
    pub status: String,
    pub request_id: Option<String>,
    pub row_id: Option<String>,
}

impl StatusCallback {
    /// Decode a raw body; the content type is not checked
    pub fn from_body(body: &[u8]) -> Result<Self, CallbackError> {
        let payload: Value = serde_json::from_slice(body).map_err(|_| CallbackError::InvalidJson)?;
        let fields = payload.as_object().ok_or(CallbackError::InvalidJson)?;

        let status = match fields.get("status") {
            None | Some(Value::Null) => return Err(CallbackError::MissingStatus),
            Some(value) => normalize_status(value).ok_or(CallbackError::InvalidField("status"))?,
        };

        Ok(Self {
            status,
            request_id: optional_field(fields.get("request_id"), "request_id")?,
            row_id: optional_field(fields.get("row_id"), "row_id")?,
        })
    }
}

/// Render a string or number status as text.
///
/// Integers keep no decimal point, so `200` and `"200"` are the same status.
pub fn normalize_status(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(match (n.as_i64(), n.as_u64()) {
            (Some(i), _) => i.to_string(),
            (None, Some(u)) => u.to_string(),
            _ => n.as_f64()?.to_string(),
        }),
        _ => None,
    }
}

fn optional_field(value: Option<&Value>, name: &'static str) -> Result<Option<String>, CallbackError> {
    match value {
        None | Some(Value::Null) => Ok(None),
        Some(v) => normalize_status(v)
            .map(Some)
            .ok_or(CallbackError::InvalidField(name)),
    }
}

pub fn router() -> Router {
    Router::new()
        .route("/webhook", post(receive_status))
        .route("/health", get(health))
        .layer(TraceLayer::new_for_http())
}

async fn receive_status(body: Bytes) -> Result<&'static str, CallbackError> {
    let callback = StatusCallback::from_body(&body)?;

    info!(
        status = %callback.status,
        request_id = callback.request_id.as_deref().unwrap_or("-"),
        row_id = callback.row_id.as_deref().unwrap_or("-"),
        "Status callback received"
    );

    Ok("ok")
}

async fn health() -> impl IntoResponse {
    (StatusCode::OK, "ok")
}

/// Bind and serve until the process exits
pub async fn serve(config: WebhookConfig) -> anyhow::Result<()> {
    let listener = tokio::net::TcpListener::bind(&config.listen_addr).await?;
    info!("Webhook listening on {}", listener.local_addr()?);

    axum::serve(listener, router()).await?;

    Ok(())
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use axum::{
        body::Body,
        extract::Request,
        http::{Method, StatusCode},
    };
    use http_body_util::BodyExt;
    use serde_json::json;
    use tower::ServiceExt;

    async fn post_body(body: &str) -> (StatusCode, String) {
        let response = router()
            .oneshot(
                Request::builder()
                    .method(Method::POST)
                    .uri("/webhook")
                    .body(Body::from(body.to_string()))
                    .unwrap(),
            )
            .await
            .unwrap();

        let status = response.status();
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        (status, String::from_utf8(bytes.to_vec()).unwrap())
    }

    #[test]
    fn test_normalize_status() {
        assert_eq!(normalize_status(&json!(200)).as_deref(), Some("200"));
        assert_eq!(normalize_status(&json!("done")).as_deref(), Some("done"));
        assert_eq!(normalize_status(&json!(-1)).as_deref(), Some("-1"));
        assert_eq!(normalize_status(&json!(2.5)).as_deref(), Some("2.5"));
        assert_eq!(normalize_status(&json!(true)), None);
        assert_eq!(normalize_status(&json!({"code": 1})), None);
    }

    #[test]
    fn test_from_body() {
        let callback =
            StatusCallback::from_body(br#"{"status":200,"request_id":"abc","row_id":7}"#).unwrap();
        assert_eq!(
            callback,
            StatusCallback {
                status: "200".to_string(),
                request_id: Some("abc".to_string()),
                row_id: Some("7".to_string()),
            }
        );

        assert_eq!(
            StatusCallback::from_body(br#"{"status":null}"#).unwrap_err(),
            CallbackError::MissingStatus
        );
        assert_eq!(
            StatusCallback::from_body(br#"{"status":"ok","row_id":[1]}"#).unwrap_err(),
            CallbackError::InvalidField("row_id")
        );
        assert_eq!(
            StatusCallback::from_body(b"[1,2]").unwrap_err(),
            CallbackError::InvalidJson
        );
    }

    #[tokio::test]
    async fn test_numeric_status_accepted() {
        let (status, body) = post_body(r#"{"status": 200}"#).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, "ok");
    }

    #[tokio::test]
    async fn test_text_status_accepted() {
        let (status, _) = post_body(r#"{"status":"done","request_id":"r-1"}"#).await;
        assert_eq!(status, StatusCode::OK);
    }

    #[tokio::test]
    async fn test_missing_status_rejected() {
        let (status, body) = post_body(r#"{"request_id":"r-1"}"#).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body, "missing status");
    }

    #[tokio::test]
    async fn test_invalid_json_rejected() {
        let (status, body) = post_body("{not json").await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body, "invalid json");
    }

    #[tokio::test]
    async fn test_wrong_method() {
        let response = router()
            .oneshot(
                Request::builder()
                    .method(Method::GET)
                    .uri("/webhook")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::METHOD_NOT_ALLOWED);
    }

    #[tokio::test]
    async fn test_health() {
        let response = router()
            .oneshot(
                Request::builder()
                    .uri("/health")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        assert_eq!(&bytes[..], b"ok");
    }
}
