//! Availability search endpoint

use axum::{extract::State, Json};
use tracing::debug;
use validator::Validate;

use crate::middleware::Decoded;
use crate::models::{DateRange, ObjectIdList};
use crate::utils::error::AppResult;
use crate::AppState;

/// POST /search
///
/// Accommodations with an available period covering the whole range.
pub async fn find_available_accommodations(
    State(state): State<AppState>,
    Decoded(range): Decoded<DateRange>,
) -> AppResult<Json<ObjectIdList>> {
    range.validate()?;

    let ids = state.repo.accommodations_available(&range).await?;
    debug!(
        start = %range.start_date,
        end = %range.end_date,
        matches = ids.len(),
        "Availability search"
    );

    Ok(Json(ObjectIdList::from(ids)))
}
