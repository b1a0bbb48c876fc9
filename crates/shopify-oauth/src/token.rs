//! Authorization code exchange
//!
//! After the developer approves the app, Shopify redirects back with a
//! single-use `code`. The bridge POSTs it, together with the app's client
//! id/secret, to the shop's `/admin/oauth/access_token` endpoint.
//!
//! No retry: a consumed code cannot be replayed, so a failed exchange is
//! reported to the browser as-is.

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::constants::ACCESS_TOKEN_PATH;
use crate::error::{Error, Result};

/// User an online access token is bound to.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct AssociatedUser {
    pub id: u64,
    #[serde(default)]
    pub first_name: Option<String>,
    #[serde(default)]
    pub last_name: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub email_verified: bool,
    #[serde(default)]
    pub account_owner: bool,
    #[serde(default)]
    pub locale: Option<String>,
    #[serde(default)]
    pub collaborator: bool,
}

/// Response from the token endpoint.
///
/// `expires_in`, `session` and `associated_user` are only returned for online
/// (per-user) tokens, which is what the bridge requests.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct AccessTokenResponse {
    pub access_token: String,
    #[serde(default)]
    pub scope: String,
    #[serde(default)]
    pub session: Option<String>,
    /// Seconds until the access token expires (delta, not absolute)
    #[serde(default)]
    pub expires_in: Option<u64>,
    #[serde(default)]
    pub associated_user_scope: Option<String>,
    #[serde(default)]
    pub associated_user: Option<AssociatedUser>,
}

/// Token endpoint of a shop, e.g.
/// `https://my-shop.myshopify.com/admin/oauth/access_token`.
pub fn access_token_url(shop_domain: &str) -> String {
    format!("https://{shop_domain}{ACCESS_TOKEN_PATH}")
}

/// Exchange an authorization code for an access token.
///
/// A non-success status becomes [`Error::TokenExchange`] carrying the
/// upstream body untouched.
pub async fn exchange_code(
    client: &reqwest::Client,
    token_url: &str,
    client_id: &str,
    client_secret: &str,
    code: &str,
) -> Result<AccessTokenResponse> {
    debug!(token_url, "exchanging authorization code");

    let response = client
        .post(token_url)
        .header(reqwest::header::ACCEPT, "application/json")
        .form(&[
            ("client_id", client_id),
            ("client_secret", client_secret),
            ("code", code),
        ])
        .send()
        .await
        .map_err(|e| Error::Http(format!("token exchange request failed: {e}")))?;

    let status = response.status();
    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        return Err(Error::TokenExchange {
            status: status.as_u16(),
            body,
        });
    }

    response
        .json::<AccessTokenResponse>()
        .await
        .map_err(|e| Error::InvalidToken(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::StatusCode;
    use axum::routing::post;
    use tokio::net::TcpListener;

    /// Serve `router` on an ephemeral port and return its base URL.
    async fn serve(router: axum::Router) -> String {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, router).await.unwrap();
        });
        format!("http://{addr}")
    }

    #[test]
    fn online_token_response_deserializes() {
        let json = r#"{
            "access_token": "f85632530bf277ec9ac6f649fc327f17",
            "scope": "write_orders",
            "session": "f4a1b2c3",
            "expires_in": 86399,
            "associated_user_scope": "write_orders",
            "associated_user": {
                "id": 902541635,
                "first_name": "John",
                "last_name": "Smith",
                "email": "john@example.com",
                "email_verified": true,
                "account_owner": true,
                "locale": "en",
                "collaborator": false
            }
        }"#;
        let token: AccessTokenResponse = serde_json::from_str(json).unwrap();
        assert_eq!(token.access_token, "f85632530bf277ec9ac6f649fc327f17");
        assert_eq!(token.expires_in, Some(86399));
        assert_eq!(token.session.as_deref(), Some("f4a1b2c3"));
        let user = token.associated_user.unwrap();
        assert_eq!(user.locale.as_deref(), Some("en"));
        assert!(user.account_owner);
    }

    #[test]
    fn offline_token_response_deserializes() {
        let json = r#"{"access_token":"shpat_abc","scope":"read_products"}"#;
        let token: AccessTokenResponse = serde_json::from_str(json).unwrap();
        assert_eq!(token.scope, "read_products");
        assert!(token.expires_in.is_none());
        assert!(token.associated_user.is_none());
    }

    #[test]
    fn access_token_url_targets_shop_admin() {
        assert_eq!(
            access_token_url("my-shop.myshopify.com"),
            "https://my-shop.myshopify.com/admin/oauth/access_token"
        );
    }

    #[tokio::test]
    async fn exchange_posts_form_and_parses_token() {
        let router = axum::Router::new().route(
            "/admin/oauth/access_token",
            post(
                |headers: axum::http::HeaderMap,
                 axum::Form(form): axum::Form<std::collections::HashMap<String, String>>| async move {
                    assert_eq!(headers["accept"], "application/json");
                    assert_eq!(form["client_id"], "id-1");
                    assert_eq!(form["client_secret"], "secret-1");
                    assert_eq!(form["code"], "code-1");
                    axum::Json(serde_json::json!({
                        "access_token": "shpua_1",
                        "scope": "read_products",
                        "session": "sess",
                        "expires_in": 60
                    }))
                },
            ),
        );
        let base = serve(router).await;

        let client = reqwest::Client::new();
        let token = exchange_code(
            &client,
            &format!("{base}/admin/oauth/access_token"),
            "id-1",
            "secret-1",
            "code-1",
        )
        .await
        .unwrap();

        assert_eq!(token.access_token, "shpua_1");
        assert_eq!(token.expires_in, Some(60));
    }

    #[tokio::test]
    async fn exchange_keeps_upstream_error_body() {
        let router = axum::Router::new().route(
            "/admin/oauth/access_token",
            post(|| async {
                (
                    StatusCode::BAD_REQUEST,
                    axum::Json(serde_json::json!({
                        "error": "invalid_request",
                        "error_description": "The authorization code was not found or was already used"
                    })),
                )
            }),
        );
        let base = serve(router).await;

        let client = reqwest::Client::new();
        let err = exchange_code(
            &client,
            &format!("{base}/admin/oauth/access_token"),
            "id",
            "secret",
            "used-code",
        )
        .await
        .unwrap_err();

        match err {
            Error::TokenExchange { status, body } => {
                assert_eq!(status, 400);
                assert!(body.contains("already used"), "got: {body}");
            }
            other => panic!("expected TokenExchange, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn exchange_reports_transport_failure() {
        let client = reqwest::Client::new();
        let err = exchange_code(
            &client,
            "http://127.0.0.1:1/admin/oauth/access_token",
            "id",
            "secret",
            "code",
        )
        .await
        .unwrap_err();
        assert!(matches!(err, Error::Http(_)), "got {err:?}");
    }
}
