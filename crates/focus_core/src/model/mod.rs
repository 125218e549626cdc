//! Domain model for recurring templates and per-day priority lists.
//!
//! # Responsibility
//! - Define canonical records shared by repositories and services.
//! - Own the capacity and rank invariants of a day record.
//!
//! # Invariants
//! - Ownership is one-directional: a `DayRecord` owns its `PriorityEntry`
//!   values; an entry only carries the id of the template that produced it.
//! - A day never holds more than `MAX_PRIORITIES_PER_DAY` entries.

pub mod day;
pub mod rank;
pub mod template;

/// Upper bound of priority entries a single day may hold.
pub const MAX_PRIORITIES_PER_DAY: usize = 3;
