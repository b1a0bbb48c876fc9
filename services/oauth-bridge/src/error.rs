//! HTTP error responses
//!
//! Every failure a handler can produce maps to one `ApiError` variant with a
//! fixed status code. Bodies are JSON; most are `{"message": "..."}`.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use shopify_oauth::ValidationError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ApiError {
    #[error("Unsupported method")]
    UnsupportedMethod,

    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error("Missing authorization code.")]
    MissingCode,

    #[error("Invalid query string: {0}")]
    InvalidQuery(String),

    #[error("Required cookie missing.")]
    MissingCookie,

    #[error("OAuth state mismatch.")]
    StateMismatch,

    /// Shopify rejected the exchange; the payload is handed back verbatim.
    #[error("upstream error")]
    Upstream(serde_json::Value),

    #[error("{0}")]
    Internal(String),
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::UnsupportedMethod => StatusCode::METHOD_NOT_ALLOWED,
            ApiError::Validation(_) | ApiError::MissingCode | ApiError::InvalidQuery(_) => {
                StatusCode::BAD_REQUEST
            }
            ApiError::MissingCookie | ApiError::StateMismatch => StatusCode::FORBIDDEN,
            ApiError::Upstream(_) | ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<shopify_oauth::Error> for ApiError {
    fn from(err: shopify_oauth::Error) -> Self {
        match err {
            shopify_oauth::Error::TokenExchange { body, .. } => ApiError::Upstream(
                serde_json::from_str(&body).unwrap_or(serde_json::Value::String(body)),
            ),
            other => ApiError::Internal(other.to_string()),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let body = match self {
            ApiError::Validation(err) => {
                serde_json::to_value(&err).unwrap_or_else(|_| serde_json::json!({ "message": err.message }))
            }
            ApiError::Upstream(body) => body,
            other => serde_json::json!({ "message": other.to_string() }),
        };
        (
            status,
            [(axum::http::header::CONTENT_TYPE, "application/json")],
            body.to_string(),
        )
            .into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn body_json(err: ApiError) -> (StatusCode, serde_json::Value) {
        let response = err.into_response();
        let status = response.status();
        let body = axum::body::to_bytes(response.into_body(), 1024 * 1024)
            .await
            .unwrap();
        (status, serde_json::from_slice(&body).unwrap())
    }

    #[tokio::test]
    async fn fixed_messages() {
        let (status, json) = body_json(ApiError::UnsupportedMethod).await;
        assert_eq!(status, StatusCode::METHOD_NOT_ALLOWED);
        assert_eq!(json, serde_json::json!({"message": "Unsupported method"}));

        let (status, json) = body_json(ApiError::MissingCookie).await;
        assert_eq!(status, StatusCode::FORBIDDEN);
        assert_eq!(json, serde_json::json!({"message": "Required cookie missing."}));
    }

    #[tokio::test]
    async fn invalid_query_is_json_bad_request() {
        let (status, json) =
            body_json(ApiError::InvalidQuery("duplicate field `code`".into())).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(
            json,
            serde_json::json!({"message": "Invalid query string: duplicate field `code`"})
        );
    }

    #[tokio::test]
    async fn validation_error_keeps_details() {
        let (status, json) = body_json(ApiError::Validation(ValidationError::malformed("eof"))).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(json["details"][0]["type"], "object.base");
    }

    #[tokio::test]
    async fn upstream_json_body_is_passed_through() {
        let err = ApiError::from(shopify_oauth::Error::TokenExchange {
            status: 400,
            body: r#"{"error":"invalid_request"}"#.into(),
        });
        let (status, json) = body_json(err).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(json, serde_json::json!({"error": "invalid_request"}));
    }

    #[tokio::test]
    async fn upstream_text_body_becomes_json_string() {
        let err = ApiError::from(shopify_oauth::Error::TokenExchange {
            status: 502,
            body: "<html>Bad Gateway</html>".into(),
        });
        let (_, json) = body_json(err).await;
        assert_eq!(json, serde_json::json!("<html>Bad Gateway</html>"));
    }

    #[tokio::test]
    async fn transport_errors_become_messages() {
        let err = ApiError::from(shopify_oauth::Error::Http("connection refused".into()));
        let (status, json) = body_json(err).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert!(
            json["message"]
                .as_str()
                .unwrap()
                .contains("connection refused")
        );
    }
}
