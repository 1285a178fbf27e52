use axum::{
    extract::{Query, State},
    http::header,
    response::{Html, IntoResponse},
    routing::{get, post},
    Json, Router,
};
use core_sim::{Action, ActionOutcome, RenderSnapshot, StatusSnapshot, Trade};
use runtime::export::TRADE_CSV_HEADER;
use serde::Deserialize;

use crate::{error::ApiResult, state::AppState, ws};

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/", get(index))
        .route("/static/styles.css", get(styles))
        .route("/static/app.js", get(script))
        .route("/status", get(status))
        .route("/snapshot", get(snapshot))
        .route("/actions", post(act))
        .route("/trades", get(trades))
        .route("/trades.csv", get(trades_csv))
        .route("/stop", post(stop))
        .route("/pause", post(pause))
        .route("/resume", post(resume))
        .route("/restart", post(restart))
        .route("/ws/events", get(ws::events_socket))
        .with_state(state)
}

#[derive(Debug, Deserialize)]
struct SnapshotQuery {
    window: Option<usize>,
}

async fn index() -> Html<&'static str> {
    Html(ui::index_html())
}

async fn styles() -> impl IntoResponse {
    ([(header::CONTENT_TYPE, "text/css")], ui::styles_css())
}

async fn script() -> impl IntoResponse {
    ([(header::CONTENT_TYPE, "text/javascript")], ui::app_js())
}

async fn status(State(state): State<AppState>) -> ApiResult<Json<StatusSnapshot>> {
    Ok(Json(state.session().status().await?))
}

async fn snapshot(
    State(state): State<AppState>,
    Query(query): Query<SnapshotQuery>,
) -> ApiResult<Json<RenderSnapshot>> {
    let window = query.window.or(state.snapshot_window());
    Ok(Json(state.session().snapshot(window).await?))
}

async fn act(
    State(state): State<AppState>,
    Json(action): Json<Action>,
) -> ApiResult<Json<ActionOutcome>> {
    Ok(Json(state.session().act(action).await?))
}

async fn trades(State(state): State<AppState>) -> ApiResult<Json<Vec<Trade>>> {
    Ok(Json(state.session().trades().await?))
}

async fn trades_csv(State(state): State<AppState>) -> ApiResult<impl IntoResponse> {
    let trades = state.session().trades().await?;
    let body = if trades.is_empty() {
        TRADE_CSV_HEADER.to_owned()
    } else {
        runtime::trades_to_csv_string(&trades)?
    };

    Ok(([(header::CONTENT_TYPE, "text/csv")], body))
}

async fn stop(State(state): State<AppState>) -> ApiResult<Json<StatusSnapshot>> {
    Ok(Json(state.session().stop().await?))
}

async fn pause(State(state): State<AppState>) -> ApiResult<Json<StatusSnapshot>> {
    state.session().pause().await?;
    Ok(Json(state.session().status().await?))
}

async fn resume(State(state): State<AppState>) -> ApiResult<Json<StatusSnapshot>> {
    state.session().resume().await?;
    Ok(Json(state.session().status().await?))
}

async fn restart(State(state): State<AppState>) -> ApiResult<Json<StatusSnapshot>> {
    state.session().restart().await?;
    Ok(Json(state.session().status().await?))
}
