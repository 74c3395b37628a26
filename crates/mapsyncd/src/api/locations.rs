//! Location list endpoint

use axum::{Json, extract::State};
use mapsync_core::Location;

use super::ApiError;
use crate::AppState;

/// GET /api/locations
///
/// Visible locations from every configured source, in source order.
/// Served from the snapshot while it is fresh.
pub async fn get_locations(
    State(state): State<AppState>,
) -> Result<Json<Vec<Location>>, ApiError> {
    let locations = state.gate.locations().await?;
    Ok(Json(locations))
}
