//! API routes and handlers
//!
//! Every business route is wrapped as
//! `content type → [decode body] → [auth + role] → handler`.

use axum::{
    middleware::{from_fn, from_fn_with_state},
    routing::{delete, get, post, put},
    Router,
};
use tower::ServiceBuilder;

use crate::middleware::{decode_json, json_content_type, require_roles, AllowedRoles, RoleGate};
use crate::models::{AvailablePeriod, DateRange, ObjectId, ObjectIdList, Reservation};
use crate::utils::error::{AppError, AppResult};
use crate::AppState;

mod health;
mod periods;
mod reservations;
mod search;

pub use health::*;

pub const ROLE_HOST: &str = "host";
pub const ROLE_GUEST: &str = "guest";

/// Health endpoints (no chain)
pub fn public_routes() -> Router<AppState> {
    Router::new()
        .route("/health", get(health::health_check))
        .route("/health/detailed", get(health::health_check_detailed))
}

/// Period, reservation and search endpoints
pub fn business_routes(state: &AppState) -> Router<AppState> {
    let hosts = RoleGate::new(state.verifier.clone(), AllowedRoles::only([ROLE_HOST]));
    let guests = RoleGate::new(state.verifier.clone(), AllowedRoles::only([ROLE_GUEST]));
    let anyone = RoleGate::new(state.verifier.clone(), AllowedRoles::Any);

    Router::new()
        .route(
            "/periods",
            post(periods::create_period).layer(
                ServiceBuilder::new()
                    .layer(json_content_type())
                    .layer(from_fn(decode_json::<AvailablePeriod>))
                    .layer(from_fn_with_state(hosts.clone(), require_roles)),
            ),
        )
        .route(
            "/periods",
            put(periods::update_period).layer(
                ServiceBuilder::new()
                    .layer(json_content_type())
                    .layer(from_fn(decode_json::<AvailablePeriod>))
                    .layer(from_fn_with_state(hosts.clone(), require_roles)),
            ),
        )
        .route(
            "/periods",
            delete(periods::delete_periods_for_accommodations).layer(
                ServiceBuilder::new()
                    .layer(json_content_type())
                    .layer(from_fn(decode_json::<ObjectIdList>))
                    .layer(from_fn_with_state(hosts, require_roles)),
            ),
        )
        .route(
            "/periods/accommodation/{id}",
            get(periods::list_for_accommodation).layer(json_content_type()),
        )
        .route(
            "/periods/{period_id}/{accommodation_id}",
            get(periods::find_period).layer(json_content_type()),
        )
        .route(
            "/reservations",
            post(reservations::create_reservation).layer(
                ServiceBuilder::new()
                    .layer(json_content_type())
                    .layer(from_fn(decode_json::<Reservation>))
                    .layer(from_fn_with_state(guests.clone(), require_roles)),
            ),
        )
        .route(
            "/reservations/expired",
            get(reservations::list_expired).layer(
                ServiceBuilder::new()
                    .layer(json_content_type())
                    .layer(from_fn_with_state(guests.clone(), require_roles)),
            ),
        )
        .route(
            "/reservations/user/{user}",
            get(reservations::list_for_user).layer(
                ServiceBuilder::new()
                    .layer(json_content_type())
                    .layer(from_fn_with_state(anyone, require_roles)),
            ),
        )
        .route(
            "/reservations/user/{user}",
            delete(reservations::delete_for_user).layer(json_content_type()),
        )
        .route(
            "/reservations/period/{id}",
            get(reservations::list_for_period).layer(json_content_type()),
        )
        .route(
            "/reservations/{period_id}/{reservation_id}",
            delete(reservations::delete_reservation).layer(
                ServiceBuilder::new()
                    .layer(json_content_type())
                    .layer(from_fn_with_state(guests, require_roles)),
            ),
        )
        .route(
            "/search",
            post(search::find_available_accommodations).layer(
                ServiceBuilder::new()
                    .layer(json_content_type())
                    .layer(from_fn(decode_json::<DateRange>)),
            ),
        )
}

/// Full API router
pub fn routes(state: &AppState) -> Router<AppState> {
    public_routes().merge(business_routes(state))
}

/// Parse an identifier taken from the path
fn parse_id(raw: &str) -> AppResult<ObjectId> {
    raw.parse()
        .map_err(|_| AppError::bad_request(format!("Invalid ID: {}", raw)))
}
