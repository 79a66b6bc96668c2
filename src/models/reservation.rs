//! Reservation data model

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use validator::{Validate, ValidationError};

use super::ObjectId;

/// A guest's booking inside an available period
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
#[validate(schema(function = "validate_reservation_dates"))]
pub struct Reservation {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<ObjectId>,

    pub id_period: ObjectId,

    pub id_accommodation: ObjectId,

    /// Guest who made the booking, resolved from the caller's token
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id_user: Option<ObjectId>,

    pub start_date: DateTime<Utc>,

    pub end_date: DateTime<Utc>,

    #[validate(range(min = 1, message = "at least one guest is required"))]
    pub guest_number: u32,

    #[validate(range(min = 0.0, message = "price cannot be negative"))]
    #[serde(default)]
    pub price: f64,
}

impl Reservation {
    /// A reservation is expired once its stay has ended
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        self.end_date < now
    }
}

fn validate_reservation_dates(reservation: &Reservation) -> Result<(), ValidationError> {
    if reservation.start_date >= reservation.end_date {
        return Err(ValidationError::new("date_order")
            .with_message("startDate must be before endDate".into()));
    }
    Ok(())
}
