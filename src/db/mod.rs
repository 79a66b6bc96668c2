//! Storage layer
//!
//! Periods and reservations live in the document store behind
//! [`ReservationRepository`]. [`InMemoryRepository`] is the process-local
//! implementation used for local runs and tests.

pub mod repository;

pub use repository::{
    InMemoryRepository, RepositoryError, RepositoryResult, ReservationRepository,
};
