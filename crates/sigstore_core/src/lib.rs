//! # Sigstore Core
//!
//! Lazy, path-addressable handles over a hierarchical document model.
//!
//! A [`Handle`] stands for one location in the model. Reading a key on a
//! handle yields the handle one segment deeper; the data itself is never
//! copied. Calling a handle invokes the model method named by its last
//! segment on its parent path, which is the only way to change data.
//!
//! ## Layers
//!
//! - **Registry**: one live handle per `(path, query)` pair, so handles can
//!   be compared by identity
//! - **Key resolution**: `$` stripping and root-level collection aliases
//! - **Query adapter**: forwarded query methods, `map` sugar, the virtual
//!   `ids` field and extra-payload traversal
//! - **Interception**: the [`Traps`] every handle routes through
//!
//! ## Example
//!
//! ```rust
//! use sigstore_core::{SignalError, SignalStore};
//! use sigstore_backend::{path, MemoryModel};
//! use serde_json::json;
//! use std::sync::Arc;
//!
//! let store = SignalStore::new(Arc::new(MemoryModel::new()));
//! let visible = store.root().dig(["session", "visible"]).unwrap();
//! assert_eq!(visible.path(), &path!["_session", "visible"]);
//!
//! visible.invoke_method("set", vec![json!(true)]).unwrap();
//! assert_eq!(visible.value().unwrap(), Some(json!(true)));
//!
//! let err = store.root().child("session").unwrap().write("visible", json!(false)).unwrap_err();
//! assert!(matches!(err, SignalError::MutationNotAllowed { .. }));
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod config;
mod error;
mod handle;
mod key;
mod observer;
mod query;
mod registry;
mod resolve;
mod store;
mod traps;

pub use config::{AliasTable, StoreConfig};
pub use error::{Mutation, SignalError, SignalResult, DELETE_NOT_ALLOWED, WRITE_NOT_ALLOWED};
pub use handle::Handle;
pub use key::{Key, Symbol};
pub use observer::ReadObserver;
pub use query::{BoundQueryMethod, QueryBinding, QueryMap, QueryMethod};
pub use resolve::{resolve_key, strip_dollar, ResolvedKey};
pub use store::SignalStore;
pub use traps::{Access, Call, Called, Interceptor, Traps};
