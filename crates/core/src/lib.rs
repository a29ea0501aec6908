#![forbid(unsafe_code)]

//! Domain model for class lifecycles: schedules, generated sessions, ordered
//! class content and per-member progress through it.
//!
//! Everything here is pure. Persistence and workflows live in the `storage`
//! and `services` crates.

pub mod error;
pub mod model;
pub mod progression;
pub mod scheduler;
pub mod time;

pub use error::Error;
pub use time::Clock;
