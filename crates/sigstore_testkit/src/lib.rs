//! # Sigstore Testkit
//!
//! Test utilities for Sigstore.
//!
//! This crate provides:
//! - Store fixtures over an in-memory model, with seeded data
//! - Property-based test generators using proptest
//! - A recording read observer
//! - Tracing initialisation for tests
//!
//! ## Usage
//!
//! ```rust
//! use sigstore_testkit::prelude::*;
//!
//! with_store(|store| {
//!     let posts = store.root().child("posts").unwrap();
//!     assert_eq!(posts.path().to_string(), "posts");
//! });
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

pub mod fixtures;
pub mod generators;
pub mod observer;
pub mod tracing_init;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::fixtures::*;
    pub use crate::generators::*;
    pub use crate::observer::*;
    pub use crate::tracing_init::*;
}

pub use fixtures::*;
pub use generators::*;
pub use observer::*;
pub use tracing_init::*;
