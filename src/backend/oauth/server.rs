use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::{IntoResponse, Redirect, Response},
    routing::get,
    Router,
};
use serde::Deserialize;
use std::net::SocketAddr;

use crate::backend::twitch::{AuthorizationPrompt, TokenManager};

/// Query parameters Twitch appends when redirecting back to the bot
#[derive(Debug, Default, Deserialize)]
struct CallbackQuery {
    code: Option<String>,
    state: Option<String>,
    error: Option<String>,
    error_description: Option<String>,
}

/// Start the HTTP server that receives the OAuth redirect
pub async fn start_callback_server(
    host: &str,
    port: u16,
    manager: TokenManager,
) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let app = create_router(manager);

    let addr: SocketAddr = format!("{}:{}", host, port).parse()?;
    log::info!("Starting OAuth callback server on http://{}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

/// Create the axum router with all routes
fn create_router(manager: TokenManager) -> Router {
    Router::new()
        .route("/", get(oauth_callback))
        .route("/health", get(health_check))
        .with_state(manager)
}

/// Health check endpoint
async fn health_check() -> impl IntoResponse {
    (StatusCode::OK, "Callback server is running")
}

async fn oauth_callback(
    State(manager): State<TokenManager>,
    Query(query): Query<CallbackQuery>,
) -> Response {
    if let Some(error) = query.error {
        let description = query.error_description.unwrap_or_default();
        log::error!("Twitch refused the authorization: {} {}", error, description);
        return (
            StatusCode::BAD_REQUEST,
            format!("Authorization failed: {} {}", error, description),
        )
            .into_response();
    }

    let Some(code) = query.code else {
        return match manager.pending_authorization() {
            Some(AuthorizationPrompt::Redirect { url, .. }) => {
                Redirect::temporary(&url).into_response()
            }
            Some(AuthorizationPrompt::DeviceCode {
                verification_uri,
                user_code,
            }) => (
                StatusCode::OK,
                format!("Open {} and enter the code {}", verification_uri, user_code),
            )
                .into_response(),
            None => (StatusCode::NOT_FOUND, "No authorization is pending").into_response(),
        };
    };

    match manager
        .submit_authorization_code(&code, query.state.as_deref())
        .await
    {
        Ok(_) => (StatusCode::OK, "Tokens saved! You can close this tab now.").into_response(),
        Err(failure) => {
            log::error!("Authorization callback failed: {}", failure);
            (
                StatusCode::BAD_REQUEST,
                format!("Authorization failed: {}", failure),
            )
                .into_response()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::testing::{settings, FakeAuth, MemoryStore};
    use crate::backend::twitch::{ReauthMode, TokenPair};
    use axum::body::Body;
    use axum::http::{header, Request};
    use std::sync::Arc;
    use std::time::Duration;
    use tower::ServiceExt;

    fn waiting_manager() -> TokenManager {
        TokenManager::new(
            Arc::new(FakeAuth::with_valid(&[])),
            Arc::new(MemoryStore::default()),
            settings(ReauthMode::Redirect),
        )
    }

    async fn get(manager: &TokenManager, uri: &str) -> Response {
        create_router(manager.clone())
            .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
            .await
            .unwrap()
    }

    async fn body_text(response: Response) -> String {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        String::from_utf8(bytes.to_vec()).unwrap()
    }

    async fn pending_state(manager: &TokenManager) -> (String, String) {
        loop {
            if let Some(AuthorizationPrompt::Redirect { url, state }) =
                manager.pending_authorization()
            {
                return (url, state);
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    }

    #[tokio::test]
    async fn test_health_check() {
        let response = get(&waiting_manager(), "/health").await;
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_nothing_pending() {
        let response = get(&waiting_manager(), "/").await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_callback_completes_pending_grant() {
        let manager = waiting_manager();
        let waiter = tokio::spawn({
            let manager = manager.clone();
            async move { manager.ensure_valid().await }
        });
        let (url, state) = pending_state(&manager).await;

        let redirect = get(&manager, "/").await;
        assert_eq!(redirect.status(), StatusCode::TEMPORARY_REDIRECT);
        assert_eq!(redirect.headers()[header::LOCATION], url.as_str());

        let response = get(&manager, &format!("/?code=good-code&state={}", state)).await;
        assert_eq!(response.status(), StatusCode::OK);
        assert!(body_text(response).await.contains("Tokens saved"));

        assert_eq!(
            waiter.await.unwrap().unwrap(),
            TokenPair::new("code-access", "code-refresh")
        );
    }

    #[tokio::test]
    async fn test_error_parameter_is_reported() {
        let response = get(
            &waiting_manager(),
            "/?error=access_denied&error_description=The+user+denied+you+access",
        )
        .await;

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert!(body_text(response)
            .await
            .contains("access_denied The user denied you access"));
    }
}
