//! Use-case services over the repository layer.
//!
//! # Responsibility
//! - Orchestrate generation, template lifecycle, relocation and day saves.
//! - Translate repository failures into per-use-case error types.
//!
//! # Invariants
//! - Services hold no database handles of their own; every store access goes
//!   through the repository traits.

pub mod daily_runner;
pub mod day_service;
pub mod recurrence_engine;
pub mod relocation_service;
pub mod reminder_service;
pub mod template_service;
