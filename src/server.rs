//! HTTP front end
//!
//! Serves the remote page and turns button presses into queued actions. The
//! handlers never touch the session: they enqueue work, read the fullscreen
//! flag, or ask the automation backend for the foreground title.

use anyhow::Context;
use axum::{
    Router,
    extract::{Json, RawForm, State},
    http::{StatusCode, header},
    response::{Html, IntoResponse},
    routing::{get, post},
};
use serde::Serialize;
use std::sync::Arc;
use tokio::net::TcpListener;

use crate::automation::Automation;
use crate::session::FullscreenFlag;
use crate::worker::ActionQueue;

const INDEX_HTML: &str = include_str!("../static/index.html");
const SCRIPT_JS: &str = include_str!("../static/script.js");

// Shared application state
pub struct AppState {
    pub queue: ActionQueue,
    pub automation: Arc<dyn Automation>,
    pub fullscreen: FullscreenFlag,
    pub app_name: String,
    pub actions: Vec<String>,
}

#[derive(Debug, Serialize, PartialEq)]
struct ActionsResponse {
    app: String,
    actions: Vec<String>,
}

#[derive(Debug, Serialize, PartialEq)]
struct ForegroundResponse {
    title: Option<String>,
}

#[derive(Debug, Serialize, PartialEq)]
struct StateResponse {
    fullscreen: bool,
}

// ============================================================================
// Handlers
// ============================================================================

async fn index() -> Html<&'static str> {
    Html(INDEX_HTML)
}

async fn script() -> impl IntoResponse {
    ([(header::CONTENT_TYPE, "application/javascript")], SCRIPT_JS)
}

async fn actions(State(state): State<Arc<AppState>>) -> Json<ActionsResponse> {
    Json(ActionsResponse {
        app: state.app_name.clone(),
        actions: state.actions.clone(),
    })
}

/// Every `action` field of the form, in order
fn form_actions(body: &[u8]) -> Vec<String> {
    form_urlencoded::parse(body)
        .filter(|(key, _)| key == "action")
        .map(|(_, value)| value.into_owned())
        .collect()
}

async fn run_action(State(state): State<Arc<AppState>>, RawForm(body): RawForm) -> StatusCode {
    let batch = form_actions(&body);
    log::info!("Received actions: {:?}", batch);
    state.queue.submit(batch);
    StatusCode::NO_CONTENT
}

async fn foreground_window(State(state): State<Arc<AppState>>) -> Json<ForegroundResponse> {
    let automation = state.automation.clone();
    let title = match tokio::task::spawn_blocking(move || automation.foreground_title()).await {
        Ok(Ok(title)) => title,
        Ok(Err(e)) => {
            log::warn!("Foreground window query failed: {:#}", e);
            None
        }
        Err(e) => {
            log::warn!("Foreground window query panicked: {}", e);
            None
        }
    };
    Json(ForegroundResponse { title })
}

async fn fullscreen_state(State(state): State<Arc<AppState>>) -> Json<StateResponse> {
    Json(StateResponse {
        fullscreen: state.fullscreen.get(),
    })
}

// ============================================================================
// Router / Serve
// ============================================================================

pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/", get(index))
        .route("/static/script.js", get(script))
        .route("/actions", get(actions))
        .route("/run_action", post(run_action))
        .route("/foreground_window", get(foreground_window))
        .route("/state", get(fullscreen_state))
        .with_state(state)
}

/// Bind `addr` and serve until Ctrl-C
pub async fn serve(addr: &str, state: Arc<AppState>) -> anyhow::Result<()> {
    let listener = TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;
    log::info!("🎛  Remote for '{}' listening on http://{}", state.app_name, listener.local_addr()?);

    axum::serve(listener, router(state))
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("HTTP server failed")
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        log::error!("Failed to listen for Ctrl-C: {}", e);
        std::future::pending::<()>().await;
    }
    log::info!("Shutting down");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::automation::mock::MockAutomation;
    use axum::body::Bytes;
    use tokio::sync::mpsc::UnboundedReceiver;

    fn app_state(mock: Arc<MockAutomation>) -> (Arc<AppState>, UnboundedReceiver<Vec<String>>) {
        let (queue, rx) = ActionQueue::detached();
        let state = AppState {
            queue,
            automation: mock,
            fullscreen: FullscreenFlag::default(),
            app_name: "Player".to_string(),
            actions: vec!["fullscreen".to_string(), "play".to_string()],
        };
        (Arc::new(state), rx)
    }

    #[test]
    fn test_form_actions_keeps_repeats_in_order() {
        let body = b"action=play&other=x&action=volume%20up&action=play";
        assert_eq!(form_actions(body), vec!["play", "volume up", "play"]);
        assert!(form_actions(b"").is_empty());
    }

    #[tokio::test]
    async fn test_run_action_enqueues_and_returns_no_content() {
        let (state, mut rx) = app_state(Arc::new(MockAutomation::new()));

        let status = run_action(
            State(state.clone()),
            RawForm(Bytes::from_static(b"action=play&action=fullscreen")),
        )
        .await;

        assert_eq!(status, StatusCode::NO_CONTENT);
        assert_eq!(rx.recv().await, Some(vec!["play".to_string(), "fullscreen".to_string()]));
    }

    #[tokio::test]
    async fn test_run_action_without_actions_enqueues_nothing() {
        let (state, mut rx) = app_state(Arc::new(MockAutomation::new()));

        let status = run_action(State(state.clone()), RawForm(Bytes::new())).await;

        assert_eq!(status, StatusCode::NO_CONTENT);
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_foreground_window_reports_title_or_null() {
        let mock = Arc::new(MockAutomation::new());
        let (state, _rx) = app_state(mock.clone());

        let Json(empty) = foreground_window(State(state.clone())).await;
        assert_eq!(empty, ForegroundResponse { title: None });

        mock.set_foreground(Some("Player - Movie"));
        let Json(found) = foreground_window(State(state)).await;
        assert_eq!(found.title.as_deref(), Some("Player - Movie"));
    }

    #[tokio::test]
    async fn test_state_and_actions() {
        let (state, _rx) = app_state(Arc::new(MockAutomation::new()));

        let Json(snapshot) = fullscreen_state(State(state.clone())).await;
        assert_eq!(snapshot, StateResponse { fullscreen: false });

        let Json(listing) = actions(State(state)).await;
        assert_eq!(listing.app, "Player");
        assert_eq!(listing.actions, vec!["fullscreen", "play"]);
    }

    #[tokio::test]
    async fn test_router_serves_run_action_and_state() {
        use axum::body::Body;
        use axum::http::{Method, Request};
        use tower::ServiceExt;

        let (state, mut rx) = app_state(Arc::new(MockAutomation::new()));

        let request = Request::builder()
            .method(Method::POST)
            .uri("/run_action")
            .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
            .body(Body::from("action=play&action=fullscreen"))
            .unwrap();
        let response = router(state.clone()).oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::NO_CONTENT);
        assert_eq!(rx.recv().await, Some(vec!["play".to_string(), "fullscreen".to_string()]));

        for uri in ["/", "/static/script.js", "/actions", "/state", "/foreground_window"] {
            let request = Request::builder().uri(uri).body(Body::empty()).unwrap();
            let response = router(state.clone()).oneshot(request).await.unwrap();
            assert_eq!(response.status(), StatusCode::OK, "GET {}", uri);
        }

        // run_action only accepts POST
        let request = Request::builder().uri("/run_action").body(Body::empty()).unwrap();
        let response = router(state).oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::METHOD_NOT_ALLOWED);
    }

    #[test]
    fn test_state_serializes_like_the_page_expects() {
        let body = serde_json::to_string(&StateResponse { fullscreen: true }).unwrap();
        assert_eq!(body, r#"{"fullscreen":true}"#);
        let body = serde_json::to_string(&ForegroundResponse { title: None }).unwrap();
        assert_eq!(body, r#"{"title":null}"#);
    }
}
