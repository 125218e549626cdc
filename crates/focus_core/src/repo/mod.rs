//! Repository layer abstractions and SQLite implementations.
//!
//! # Responsibility
//! - Define the store contracts the services consume.
//! - Isolate SQLite query details from generation/relocation orchestration.
//!
//! # Invariants
//! - Repository writes validate aggregates before any SQL mutation.
//! - Every read-check-write on a day record runs inside one immediate
//!   transaction, so concurrent writers on other connections are serialized.
//! - Repository APIs return semantic errors (`*NotFound`) in addition to DB
//!   transport errors.

mod codec;
pub mod day_repo;
mod error;
pub mod template_repo;

pub use error::{RepoError, RepoResult};
