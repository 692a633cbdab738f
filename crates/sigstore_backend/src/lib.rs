//! # Sigstore Backend
//!
//! Path types and the collaborator contracts consumed by the Sigstore handle
//! layer.
//!
//! This crate provides the lowest layer of Sigstore. It knows nothing about
//! handles, aliasing or interception; it only defines how a location is
//! addressed and what a document model and a query must offer.
//!
//! ## Design Principles
//!
//! - [`Path`] values are immutable and cheap to clone
//! - All mutation goes through [`ModelBackend::invoke`] by method name
//! - Backends must be `Send + Sync`
//! - Errors are returned to the caller unmodified, never swallowed
//!
//! ## Available Backends
//!
//! - [`MemoryModel`] - JSON document held in memory, with a change feed
//! - [`MemoryQueries`] - field-equality queries over a [`MemoryModel`]
//!
//! ## Example
//!
//! ```rust
//! use sigstore_backend::{path, MemoryModel, ModelBackend};
//! use serde_json::json;
//!
//! let model = MemoryModel::new();
//! model.invoke(&path!["_session", "userId"], "set", &[json!("u1")]).unwrap();
//! assert_eq!(model.read(&path!["_session", "userId"]).unwrap(), Some(json!("u1")));
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod backend;
mod change_feed;
mod error;
pub mod memory;
mod path;

pub use backend::{ModelBackend, Query};
pub use change_feed::{ChangeEvent, ChangeFeed, ChangeKind, ChangeWatcher};
pub use error::{BackendError, BackendResult};
pub use memory::{MemoryModel, MemoryModelConfig, MemoryQueries, MemoryQuery, QueryDefinition, QueryKind};
pub use path::{Path, Segment};
