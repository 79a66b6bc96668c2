//! Available period data model

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use validator::{Validate, ValidationError};

use super::ObjectId;

/// Window in which a host offers an accommodation for booking
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
#[validate(schema(function = "validate_period_dates"))]
pub struct AvailablePeriod {
    /// Assigned by the server on create; required on update
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<ObjectId>,

    pub id_accommodation: ObjectId,

    /// Owning host, resolved from the caller's token
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id_user: Option<ObjectId>,

    pub start_date: DateTime<Utc>,

    pub end_date: DateTime<Utc>,

    #[validate(range(min = 0.0, message = "price cannot be negative"))]
    pub price: f64,

    /// Whether `price` is charged per guest rather than per stay
    #[serde(default)]
    pub price_per_guest: bool,
}

impl AvailablePeriod {
    /// Whether this period fully covers `[start, end]`
    pub fn covers(&self, start: DateTime<Utc>, end: DateTime<Utc>) -> bool {
        self.start_date <= start && self.end_date >= end
    }
}

fn validate_period_dates(period: &AvailablePeriod) -> Result<(), ValidationError> {
    if period.start_date >= period.end_date {
        return Err(ValidationError::new("date_order")
            .with_message("startDate must be before endDate".into()));
    }
    Ok(())
}
