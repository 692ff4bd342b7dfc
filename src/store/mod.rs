//! Repository contracts for durable persistence (`§3`/`§6`), plus an
//! in-memory implementation for tests and a `sqlx`/SQLite implementation
//! for real deployments — following the teacher's `LinkIndex` pattern of
//! opening a pool, running idempotent schema migrations, and wrapping
//! query errors in `anyhow::Context`.

mod memory;
mod sqlite;
mod traits;

pub use memory::InMemoryStore;
pub use sqlite::SqliteStore;
pub use traits::{CheckpointRepository, ImageRepository, ScanRepository, StatsRepository, ZipRepository};
