//! Repository lookups.

pub mod repository;

pub use repository::{PgRepoFinder, RepositoryRow};
