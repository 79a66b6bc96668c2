//! Repository for available periods and reservations
//!
//! The document store is reached through [`ReservationRepository`]. The
//! in-memory implementation backs local runs and tests.

use std::collections::{BTreeMap, BTreeSet};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use thiserror::Error;
use tokio::sync::RwLock;
use tracing::debug;

use crate::models::{AvailablePeriod, DateRange, ObjectId, Reservation};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RepositoryError {
    #[error("{0} not found")]
    NotFound(String),

    /// The write conflicts with stored state
    #[error("{0}")]
    Conflict(String),

    #[error("store unavailable: {0}")]
    Unavailable(String),
}

pub type RepositoryResult<T> = Result<T, RepositoryError>;

/// Storage operations used by the HTTP handlers
#[async_trait]
pub trait ReservationRepository: Send + Sync {
    async fn periods_by_accommodation(
        &self,
        accommodation: ObjectId,
    ) -> RepositoryResult<Vec<AvailablePeriod>>;

    async fn find_period(
        &self,
        period: ObjectId,
        accommodation: ObjectId,
    ) -> RepositoryResult<Option<AvailablePeriod>>;

    /// Store a new period; the id is assigned here when absent
    async fn insert_period(&self, period: AvailablePeriod) -> RepositoryResult<AvailablePeriod>;

    /// Replace a stored period, matched by id and accommodation
    async fn update_period(&self, period: AvailablePeriod) -> RepositoryResult<AvailablePeriod>;

    /// Remove every period (and its reservations) of the given accommodations
    async fn delete_periods_for_accommodations(
        &self,
        accommodations: &[ObjectId],
    ) -> RepositoryResult<usize>;

    async fn reservations_by_period(&self, period: ObjectId) -> RepositoryResult<Vec<Reservation>>;

    async fn reservations_by_user(&self, user: ObjectId) -> RepositoryResult<Vec<Reservation>>;

    /// Reservations of `user` whose stay ended before `now`
    async fn expired_reservations_by_user(
        &self,
        user: ObjectId,
        now: DateTime<Utc>,
    ) -> RepositoryResult<Vec<Reservation>>;

    /// Store a reservation inside an existing period of its accommodation
    async fn insert_reservation(&self, reservation: Reservation) -> RepositoryResult<Reservation>;

    /// Delete the reservation only if it belongs to `period` and `user`
    async fn delete_reservation(
        &self,
        reservation: ObjectId,
        period: ObjectId,
        user: ObjectId,
    ) -> RepositoryResult<Reservation>;

    /// Delete all reservations of `user`, refusing while any is still active at `now`
    async fn delete_reservations_for_user(
        &self,
        user: ObjectId,
        now: DateTime<Utc>,
    ) -> RepositoryResult<usize>;

    /// Accommodations with a period covering the whole range
    async fn accommodations_available(&self, range: &DateRange) -> RepositoryResult<Vec<ObjectId>>;
}

#[derive(Debug, Default)]
struct Store {
    periods: BTreeMap<ObjectId, AvailablePeriod>,
    reservations: BTreeMap<ObjectId, Reservation>,
}

/// Process-local store
#[derive(Debug, Default)]
pub struct InMemoryRepository {
    store: RwLock<Store>,
}

impl InMemoryRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn period_count(&self) -> usize {
        self.store.read().await.periods.len()
    }

    pub async fn reservation_count(&self) -> usize {
        self.store.read().await.reservations.len()
    }
}

#[async_trait]
impl ReservationRepository for InMemoryRepository {
    async fn periods_by_accommodation(
        &self,
        accommodation: ObjectId,
    ) -> RepositoryResult<Vec<AvailablePeriod>> {
        let store = self.store.read().await;
        Ok(store
            .periods
            .values()
            .filter(|p| p.id_accommodation == accommodation)
            .cloned()
            .collect())
    }

    async fn find_period(
        &self,
        period: ObjectId,
        accommodation: ObjectId,
    ) -> RepositoryResult<Option<AvailablePeriod>> {
        let store = self.store.read().await;
        Ok(store
            .periods
            .get(&period)
            .filter(|p| p.id_accommodation == accommodation)
            .cloned())
    }

    async fn insert_period(&self, mut period: AvailablePeriod) -> RepositoryResult<AvailablePeriod> {
        let id = *period.id.get_or_insert_with(ObjectId::new);
        let mut store = self.store.write().await;
        if store.periods.contains_key(&id) {
            return Err(RepositoryError::Conflict(format!(
                "available period {} already exists",
                id
            )));
        }
        store.periods.insert(id, period.clone());
        debug!(period_id = %id, accommodation_id = %period.id_accommodation, "Inserted available period");
        Ok(period)
    }

    async fn update_period(&self, period: AvailablePeriod) -> RepositoryResult<AvailablePeriod> {
        let id = period
            .id
            .ok_or_else(|| RepositoryError::Conflict("available period id is required".to_string()))?;
        let mut store = self.store.write().await;
        match store.periods.get_mut(&id) {
            Some(stored) if stored.id_accommodation == period.id_accommodation => {
                *stored = period.clone();
                Ok(period)
            }
            _ => Err(RepositoryError::NotFound(format!("available period {}", id))),
        }
    }

    async fn delete_periods_for_accommodations(
        &self,
        accommodations: &[ObjectId],
    ) -> RepositoryResult<usize> {
        let targets: BTreeSet<ObjectId> = accommodations.iter().copied().collect();
        let mut store = self.store.write().await;

        let before = store.periods.len();
        store
            .periods
            .retain(|_, p| !targets.contains(&p.id_accommodation));
        store
            .reservations
            .retain(|_, r| !targets.contains(&r.id_accommodation));

        Ok(before - store.periods.len())
    }

    async fn reservations_by_period(&self, period: ObjectId) -> RepositoryResult<Vec<Reservation>> {
        let store = self.store.read().await;
        Ok(store
            .reservations
            .values()
            .filter(|r| r.id_period == period)
            .cloned()
            .collect())
    }

    async fn reservations_by_user(&self, user: ObjectId) -> RepositoryResult<Vec<Reservation>> {
        let store = self.store.read().await;
        Ok(store
            .reservations
            .values()
            .filter(|r| r.id_user == Some(user))
            .cloned()
            .collect())
    }

    async fn expired_reservations_by_user(
        &self,
        user: ObjectId,
        now: DateTime<Utc>,
    ) -> RepositoryResult<Vec<Reservation>> {
        let store = self.store.read().await;
        Ok(store
            .reservations
            .values()
            .filter(|r| r.id_user == Some(user) && r.is_expired_at(now))
            .cloned()
            .collect())
    }

    async fn insert_reservation(&self, mut reservation: Reservation) -> RepositoryResult<Reservation> {
        let id = *reservation.id.get_or_insert_with(ObjectId::new);
        let mut store = self.store.write().await;

        let in_period = store
            .periods
            .get(&reservation.id_period)
            .is_some_and(|p| p.id_accommodation == reservation.id_accommodation);
        if !in_period {
            return Err(RepositoryError::Conflict(format!(
                "available period {} does not belong to accommodation {}",
                reservation.id_period, reservation.id_accommodation
            )));
        }
        if store.reservations.contains_key(&id) {
            return Err(RepositoryError::Conflict(format!(
                "reservation {} already exists",
                id
            )));
        }

        store.reservations.insert(id, reservation.clone());
        debug!(reservation_id = %id, period_id = %reservation.id_period, "Inserted reservation");
        Ok(reservation)
    }

    async fn delete_reservation(
        &self,
        reservation: ObjectId,
        period: ObjectId,
        user: ObjectId,
    ) -> RepositoryResult<Reservation> {
        let mut store = self.store.write().await;
        let owned = store
            .reservations
            .get(&reservation)
            .is_some_and(|r| r.id_period == period && r.id_user == Some(user));
        if !owned {
            return Err(RepositoryError::NotFound(format!("reservation {}", reservation)));
        }
        store
            .reservations
            .remove(&reservation)
            .ok_or_else(|| RepositoryError::NotFound(format!("reservation {}", reservation)))
    }

    async fn delete_reservations_for_user(
        &self,
        user: ObjectId,
        now: DateTime<Utc>,
    ) -> RepositoryResult<usize> {
        let mut store = self.store.write().await;
        let active = store
            .reservations
            .values()
            .filter(|r| r.id_user == Some(user) && !r.is_expired_at(now))
            .count();
        if active > 0 {
            return Err(RepositoryError::Conflict(format!(
                "user {} has {} active reservation(s)",
                user, active
            )));
        }

        let before = store.reservations.len();
        store.reservations.retain(|_, r| r.id_user != Some(user));
        Ok(before - store.reservations.len())
    }

    async fn accommodations_available(&self, range: &DateRange) -> RepositoryResult<Vec<ObjectId>> {
        let store = self.store.read().await;
        let ids: BTreeSet<ObjectId> = store
            .periods
            .values()
            .filter(|p| p.covers(range.start_date, range.end_date))
            .map(|p| p.id_accommodation)
            .collect();
        Ok(ids.into_iter().collect())
    }
}
