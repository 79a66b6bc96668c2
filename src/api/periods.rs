//! Available period endpoints

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use tracing::{info, warn};
use validator::Validate;

use super::parse_id;
use crate::middleware::{AuthUser, Decoded};
use crate::models::{AvailablePeriod, ObjectIdList};
use crate::resilience::CallContext;
use crate::utils::error::{AppError, AppResult};
use crate::AppState;

/// POST /periods
pub async fn create_period(
    State(state): State<AppState>,
    ctx: CallContext,
    user: AuthUser,
    Decoded(mut period): Decoded<AvailablePeriod>,
) -> AppResult<(StatusCode, Json<AvailablePeriod>)> {
    period.validate()?;

    let host_id = state
        .downstreams
        .profile
        .user_id(&ctx, &user.username, &user.token)
        .await?;

    let exists = state
        .downstreams
        .accommodation
        .exists(&ctx, period.id_accommodation, &user.token)
        .await?;
    if !exists {
        warn!(accommodation_id = %period.id_accommodation, "Accommodation does not exist");
        return Err(AppError::bad_request("Accommodation does not exist"));
    }

    period.id = None;
    period.id_user = Some(host_id);
    let stored = state.repo.insert_period(period).await?;

    info!(
        period_id = ?stored.id,
        accommodation_id = %stored.id_accommodation,
        host = %user.username,
        "Created available period"
    );

    Ok((StatusCode::CREATED, Json(stored)))
}

/// PUT /periods
///
/// Only the host who owns the stored period may change it.
pub async fn update_period(
    State(state): State<AppState>,
    ctx: CallContext,
    user: AuthUser,
    Decoded(mut period): Decoded<AvailablePeriod>,
) -> AppResult<(StatusCode, Json<AvailablePeriod>)> {
    period.validate()?;

    let id = period
        .id
        .ok_or_else(|| AppError::bad_request("Available period id is required"))?;

    let host_id = state
        .downstreams
        .profile
        .user_id(&ctx, &user.username, &user.token)
        .await?;

    let stored = state
        .repo
        .find_period(id, period.id_accommodation)
        .await?
        .ok_or_else(|| AppError::not_found(format!("Available period {}", id)))?;

    let claimed_owner = period.id_user.unwrap_or(host_id);
    if stored.id_user != Some(host_id) || claimed_owner != host_id {
        warn!(period_id = %id, username = %user.username, "Update rejected: caller does not own the period");
        return Err(AppError::bad_request(
            "You are not the owner of available period",
        ));
    }

    period.id_user = Some(host_id);
    let updated = state.repo.update_period(period).await?;

    info!(period_id = %id, host = %user.username, "Updated available period");

    Ok((StatusCode::CREATED, Json(updated)))
}

/// DELETE /periods
///
/// Removes the periods of every listed accommodation.
pub async fn delete_periods_for_accommodations(
    State(state): State<AppState>,
    user: AuthUser,
    Decoded(ids): Decoded<ObjectIdList>,
) -> AppResult<StatusCode> {
    if !ids.object_ids.is_empty() {
        let removed = state
            .repo
            .delete_periods_for_accommodations(&ids.object_ids)
            .await?;
        info!(
            accommodations = ids.object_ids.len(),
            removed,
            host = %user.username,
            "Deleted available periods"
        );
    }

    Ok(StatusCode::NO_CONTENT)
}

/// GET /periods/accommodation/{id}
pub async fn list_for_accommodation(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> AppResult<Json<Vec<AvailablePeriod>>> {
    let accommodation = parse_id(&id)?;
    Ok(Json(state.repo.periods_by_accommodation(accommodation).await?))
}

/// GET /periods/{period_id}/{accommodation_id}
pub async fn find_period(
    State(state): State<AppState>,
    Path((period_id, accommodation_id)): Path<(String, String)>,
) -> AppResult<Json<AvailablePeriod>> {
    let period = parse_id(&period_id)?;
    let accommodation = parse_id(&accommodation_id)?;

    state
        .repo
        .find_period(period, accommodation)
        .await?
        .map(Json)
        .ok_or_else(|| {
            AppError::not_found(format!(
                "No period {} in accommodation {}",
                period, accommodation
            ))
        })
}
