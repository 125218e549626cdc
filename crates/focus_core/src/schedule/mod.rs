//! Time capabilities consumed by the core services.
//!
//! # Responsibility
//! - Decide whether a template schedule fires on a calendar date.
//! - Provide "now" and "today" in the configured timezone.
//!
//! # Invariants
//! - Calendar decisions are made in the configured timezone, never in the
//!   host's local zone.

pub mod clock;
pub mod cron_matcher;
