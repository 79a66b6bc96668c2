//! Data models

mod object_id;
mod period;
mod reservation;
mod search;

pub use object_id::*;
pub use period::*;
pub use reservation::*;
pub use search::*;
