//! Search payloads shared with the accommodation service

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use validator::{Validate, ValidationError};

use super::ObjectId;

/// Inclusive date window for availability searches
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
#[validate(schema(function = "validate_range"))]
pub struct DateRange {
    pub start_date: DateTime<Utc>,
    pub end_date: DateTime<Utc>,
}

fn validate_range(range: &DateRange) -> Result<(), ValidationError> {
    if range.start_date > range.end_date {
        return Err(ValidationError::new("date_order")
            .with_message("startDate must not be after endDate".into()));
    }
    Ok(())
}

/// List of identifiers, as exchanged on the wire
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ObjectIdList {
    #[serde(default)]
    pub object_ids: Vec<ObjectId>,
}

impl From<Vec<ObjectId>> for ObjectIdList {
    fn from(object_ids: Vec<ObjectId>) -> Self {
        Self { object_ids }
    }
}
