use api::AppState;
use axum::{routing::get, Router};
use runtime::SessionHandle;

pub fn build_app(session: SessionHandle, snapshot_window: Option<usize>) -> Router {
    let state = AppState::new(session).with_snapshot_window(snapshot_window);
    api::routes::router(state).route("/health", get(healthcheck))
}

async fn healthcheck() -> &'static str {
    "ok"
}
