//! Domain models for refuge-core
//!
//! The canonical shelter record and its coordinate. Records enter the core
//! through [`crate::vocabulary::Vocabulary::shape`] and are read-only inside
//! matching and merging.

pub mod coord;
pub mod record;

pub use coord::{decimal_places, Coord};
pub use record::{Record, ShelterType};
