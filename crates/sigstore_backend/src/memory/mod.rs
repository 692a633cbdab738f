//! In-memory model and query backends.
//!
//! Suitable for tests, demos and single-process applications that do not
//! need persistence.

mod model;
mod query;
mod tree;

pub use model::{MemoryModel, MemoryModelConfig};
pub use query::{MemoryQueries, MemoryQuery, QueryDefinition, QueryKind};
