//! Map page

use axum::{extract::State, response::Html};

use crate::AppState;

/// GET /
///
/// Serves the map page
pub async fn serve_index(State(state): State<AppState>) -> Html<String> {
    Html(state.index_html.to_string())
}
