//! Control panel page
//!
//! Static page polling `/api/status` every 2 seconds, with toggle and reset
//! buttons.

use axum::{
    response::{Html, IntoResponse, Redirect},
    routing::get,
    Router,
};

use crate::AppState;

pub fn panel_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(|| async { Redirect::temporary("/panel") }))
        .route("/panel", get(panel_page))
}

async fn panel_page() -> impl IntoResponse {
    Html(include_str!("panel.html"))
}
