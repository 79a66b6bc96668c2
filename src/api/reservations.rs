//! Reservation endpoints

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use chrono::Utc;
use tracing::{info, warn};
use validator::Validate;

use super::parse_id;
use crate::middleware::{AuthUser, Decoded};
use crate::models::{ObjectId, Reservation};
use crate::resilience::CallContext;
use crate::utils::error::{AppError, AppResult};
use crate::AppState;

/// POST /reservations
pub async fn create_reservation(
    State(state): State<AppState>,
    ctx: CallContext,
    user: AuthUser,
    Decoded(mut reservation): Decoded<Reservation>,
) -> AppResult<(StatusCode, Json<Reservation>)> {
    reservation.validate()?;

    let guest_id = state
        .downstreams
        .profile
        .user_id(&ctx, &user.username, &user.token)
        .await?;

    let exists = state
        .downstreams
        .accommodation
        .exists(&ctx, reservation.id_accommodation, &user.token)
        .await?;
    if !exists {
        warn!(accommodation_id = %reservation.id_accommodation, "Accommodation does not exist");
        return Err(AppError::bad_request("Accommodation does not exist"));
    }

    reservation.id = None;
    reservation.id_user = Some(guest_id);
    let stored = state.repo.insert_reservation(reservation).await?;

    info!(
        reservation_id = ?stored.id,
        period_id = %stored.id_period,
        guest = %user.username,
        "Created reservation"
    );

    let message = format!(
        "New reservation for accommodation {} from {} to {}",
        stored.id_accommodation,
        stored.start_date.format("%Y-%m-%d"),
        stored.end_date.format("%Y-%m-%d")
    );
    notify_host(&state, &ctx, &stored, &message).await;

    Ok((StatusCode::CREATED, Json(stored)))
}

/// GET /reservations/user/{username}
pub async fn list_for_user(
    State(state): State<AppState>,
    ctx: CallContext,
    user: AuthUser,
    Path(username): Path<String>,
) -> AppResult<Json<Vec<Reservation>>> {
    let user_id = state
        .downstreams
        .profile
        .user_id(&ctx, &username, &user.token)
        .await?;

    Ok(Json(state.repo.reservations_by_user(user_id).await?))
}

/// GET /reservations/expired
///
/// Stays of the calling guest that have already ended.
pub async fn list_expired(
    State(state): State<AppState>,
    ctx: CallContext,
    user: AuthUser,
) -> AppResult<Json<Vec<Reservation>>> {
    let user_id = state
        .downstreams
        .profile
        .user_id(&ctx, &user.username, &user.token)
        .await?;

    Ok(Json(
        state
            .repo
            .expired_reservations_by_user(user_id, Utc::now())
            .await?,
    ))
}

/// GET /reservations/period/{id}
pub async fn list_for_period(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> AppResult<Json<Vec<Reservation>>> {
    let period = parse_id(&id)?;
    Ok(Json(state.repo.reservations_by_period(period).await?))
}

/// DELETE /reservations/{period_id}/{reservation_id}
///
/// A guest may only cancel their own reservation.
pub async fn delete_reservation(
    State(state): State<AppState>,
    ctx: CallContext,
    user: AuthUser,
    Path((period_id, reservation_id)): Path<(String, String)>,
) -> AppResult<StatusCode> {
    let period = parse_id(&period_id)?;
    let reservation = parse_id(&reservation_id)?;

    let guest_id = state
        .downstreams
        .profile
        .user_id(&ctx, &user.username, &user.token)
        .await?;

    let removed = state
        .repo
        .delete_reservation(reservation, period, guest_id)
        .await?;

    info!(reservation_id = %reservation, guest = %user.username, "Cancelled reservation");

    let message = format!(
        "Reservation for accommodation {} from {} to {} was cancelled",
        removed.id_accommodation,
        removed.start_date.format("%Y-%m-%d"),
        removed.end_date.format("%Y-%m-%d")
    );
    notify_host(&state, &ctx, &removed, &message).await;

    Ok(StatusCode::ACCEPTED)
}

/// DELETE /reservations/user/{id}
///
/// Clears a user's reservation history, refused while a stay is still active.
pub async fn delete_for_user(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> AppResult<StatusCode> {
    let user: ObjectId = parse_id(&id)?;
    let removed = state
        .repo
        .delete_reservations_for_user(user, Utc::now())
        .await?;

    info!(user_id = %user, removed, "Deleted reservations for user");

    Ok(StatusCode::NO_CONTENT)
}

/// Tell the host of the reservation's period; failures are only logged
async fn notify_host(state: &AppState, ctx: &CallContext, reservation: &Reservation, message: &str) {
    let host = match state
        .repo
        .find_period(reservation.id_period, reservation.id_accommodation)
        .await
    {
        Ok(Some(period)) => period.id_user,
        Ok(None) => None,
        Err(e) => {
            warn!(period_id = %reservation.id_period, error = %e, "Could not load period for notification");
            None
        }
    };

    if let Some(host) = host {
        state
            .downstreams
            .notification
            .notify(ctx, host, message)
            .await;
    }
}
