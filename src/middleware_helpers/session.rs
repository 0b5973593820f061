use std::sync::Arc;

use axum::{
    extract::{Request, State},
    http::{header, HeaderValue},
    middleware::Next,
    response::Response,
};
use uuid::Uuid;

use crate::session::{Session, SessionStore};

/// Alternative to the cookie for non-browser clients
pub const SESSION_HEADER: &str = "x-session-id";

/// State for [`session_middleware`]
#[derive(Clone)]
pub struct SessionLayer {
    pub store: Arc<dyn SessionStore>,
    pub cookie_name: String,
}

impl SessionLayer {
    pub fn new(store: Arc<dyn SessionStore>, cookie_name: impl Into<String>) -> Self {
        Self {
            store,
            cookie_name: cookie_name.into(),
        }
    }
}

fn cookie_value(request: &Request, name: &str) -> Option<String> {
    request
        .headers()
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(|raw| raw.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(key, _)| *key == name)
        .map(|(_, value)| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

/// Resolves the caller's session and exposes it as an `Extension<Session>`.
/// New sessions are announced with `Set-Cookie`.
pub async fn session_middleware(
    State(layer): State<SessionLayer>,
    mut request: Request,
    next: Next,
) -> Response {
    let presented = cookie_value(&request, &layer.cookie_name).or_else(|| {
        request
            .headers()
            .get(SESSION_HEADER)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string)
            .filter(|v| !v.trim().is_empty())
    });

    let (session_id, is_new) = match presented {
        Some(id) => (id, false),
        None => (Uuid::new_v4().to_string(), true),
    };

    request
        .extensions_mut()
        .insert(Session::new(session_id.clone(), layer.store.clone()));

    let mut response = next.run(request).await;

    if is_new {
        let cookie = format!(
            "{}={}; Path=/; HttpOnly; SameSite=Lax",
            layer.cookie_name, session_id
        );
        match HeaderValue::from_str(&cookie) {
            Ok(value) => {
                response.headers_mut().append(header::SET_COOKIE, value);
            }
            Err(err) => tracing::warn!(error = %err, "could not encode session cookie"),
        }
    }

    response
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::InMemorySessionStore;
    use axum::{
        body::{to_bytes, Body},
        extract::Extension,
        http::Request as HttpRequest,
        routing::get,
        Router,
    };
    use tower::ServiceExt;

    async fn whoami(Extension(session): Extension<Session>) -> String {
        session.id().to_string()
    }

    fn app() -> Router {
        let layer = SessionLayer::new(Arc::new(InMemorySessionStore::new()), "sid");
        Router::new()
            .route("/", get(whoami))
            .layer(axum::middleware::from_fn_with_state(layer, session_middleware))
    }

    #[tokio::test]
    async fn issues_cookie_for_new_sessions() {
        let response = app()
            .oneshot(HttpRequest::builder().uri("/").body(Body::empty()).unwrap())
            .await
            .unwrap();

        let cookie = response
            .headers()
            .get(header::SET_COOKIE)
            .unwrap()
            .to_str()
            .unwrap()
            .to_string();
        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let id = String::from_utf8(body.to_vec()).unwrap();
        assert!(cookie.starts_with(&format!("sid={};", id)));
    }

    #[tokio::test]
    async fn reuses_cookie_or_header() {
        let response = app()
            .oneshot(
                HttpRequest::builder()
                    .uri("/")
                    .header(header::COOKIE, "theme=dark; sid=abc123")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert!(response.headers().get(header::SET_COOKIE).is_none());
        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        assert_eq!(&body[..], b"abc123");

        let response = app()
            .oneshot(
                HttpRequest::builder()
                    .uri("/")
                    .header(SESSION_HEADER, "api-client-1")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        assert_eq!(&body[..], b"api-client-1");
    }
}
