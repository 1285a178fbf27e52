pub mod error;
pub mod routes;
pub mod state;
mod ws;

use axum::Router;
use runtime::SessionHandle;

pub use error::{ApiError, ApiResult};
pub use state::AppState;

pub fn app(session: SessionHandle) -> Router {
    routes::router(AppState::new(session))
}
