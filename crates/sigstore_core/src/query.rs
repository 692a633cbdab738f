//! Query adapter.
//!
//! Exposes a bound [`Query`] through the handle abstraction: a closed set of
//! forwarded method names, the `map` iteration sugar, the virtual `ids`
//! field and extra-relative traversal.

use crate::error::SignalResult;
use crate::handle::Handle;
use crate::store::StoreInner;
use serde_json::Value;
use sigstore_backend::{Path, Query, Segment};
use std::fmt;
use std::sync::Arc;
use tracing::debug;

/// The method names a query handle forwards to its query.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum QueryMethod {
    /// `get`: the primary result.
    Get,
    /// `getIds`: the ordered ids.
    GetIds,
    /// `getExtra`: the extra payload.
    GetExtra,
    /// `subscribe`: enter live mode.
    Subscribe,
    /// `unsubscribe`: leave live mode.
    Unsubscribe,
    /// `fetch`: load once.
    Fetch,
    /// `unfetch`: release a fetch.
    Unfetch,
}

impl QueryMethod {
    /// Every forwarded method.
    pub const ALL: [Self; 7] = [
        Self::Get,
        Self::GetIds,
        Self::GetExtra,
        Self::Subscribe,
        Self::Unsubscribe,
        Self::Fetch,
        Self::Unfetch,
    ];

    /// Parses a method name.
    pub fn parse(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|method| method.as_str() == name)
    }

    /// Returns the method name.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Get => "get",
            Self::GetIds => "getIds",
            Self::GetExtra => "getExtra",
            Self::Subscribe => "subscribe",
            Self::Unsubscribe => "unsubscribe",
            Self::Fetch => "fetch",
            Self::Unfetch => "unfetch",
        }
    }
}

impl fmt::Display for QueryMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A query attached to a root-of-query handle.
#[derive(Clone)]
pub struct QueryBinding {
    query: Arc<dyn Query>,
    is_extra: bool,
}

impl QueryBinding {
    /// Binds `query`, stating explicitly whether it is an extra query.
    pub fn new(query: Arc<dyn Query>, is_extra: bool) -> Self {
        Self { query, is_extra }
    }

    /// Binds `query`, asking the query whether it is an extra query.
    pub fn from_query(query: Arc<dyn Query>) -> Self {
        let is_extra = query.is_extra();
        Self { query, is_extra }
    }

    /// Returns the bound query.
    pub fn query(&self) -> &Arc<dyn Query> {
        &self.query
    }

    /// Returns true for extra (aggregate payload) queries.
    pub fn is_extra(&self) -> bool {
        self.is_extra
    }

    /// Binds `method` to this query.
    ///
    /// On an extra query `get` is redirected to `getExtra`, so callers can
    /// always ask for the primary result.
    pub fn bind(&self, method: QueryMethod) -> BoundQueryMethod {
        let method = match method {
            QueryMethod::Get if self.is_extra => QueryMethod::GetExtra,
            other => other,
        };
        BoundQueryMethod {
            binding: self.clone(),
            method,
        }
    }

    /// Path of the handle addressed by `segment` under a query handle at `base`.
    ///
    /// Extra queries address their payload tree; the virtual `ids` field of
    /// a normal query addresses the backend's ids list; anything else is a
    /// plain child of `base`.
    pub(crate) fn child_path(&self, base: &Path, segment: Segment) -> Path {
        if self.is_extra {
            return self.query.extra_segments().child(segment);
        }
        match segment.as_key() {
            Some("ids") => self.query.ids_segments(),
            _ => base.child(segment),
        }
    }
}

impl fmt::Debug for QueryBinding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("QueryBinding")
            .field("ids", &self.query.ids_segments())
            .field("is_extra", &self.is_extra)
            .finish()
    }
}

/// A query method bound to its query, ready to be invoked.
#[derive(Debug, Clone)]
pub struct BoundQueryMethod {
    binding: QueryBinding,
    method: QueryMethod,
}

impl BoundQueryMethod {
    /// Returns the method that will actually run.
    pub fn method(&self) -> QueryMethod {
        self.method
    }

    /// Invokes the method on the bound query.
    ///
    /// `getIds` yields an array of strings, lifecycle commands yield `null`,
    /// and `getExtra` yields the payload or `null`.
    ///
    /// # Errors
    ///
    /// Propagates whatever the query backend raises.
    pub fn invoke(&self) -> SignalResult<Value> {
        let query = &self.binding.query;
        let value = match self.method {
            QueryMethod::Get => query.get()?,
            QueryMethod::GetIds => Value::Array(query.get_ids()?.into_iter().map(Value::String).collect()),
            QueryMethod::GetExtra => query.get_extra()?.unwrap_or(Value::Null),
            QueryMethod::Subscribe => lifecycle(self.method, query.subscribe())?,
            QueryMethod::Unsubscribe => lifecycle(self.method, query.unsubscribe())?,
            QueryMethod::Fetch => lifecycle(self.method, query.fetch())?,
            QueryMethod::Unfetch => lifecycle(self.method, query.unfetch())?,
        };
        Ok(value)
    }
}

fn lifecycle(method: QueryMethod, result: sigstore_backend::BackendResult<()>) -> SignalResult<Value> {
    result?;
    debug!(method = %method, "query lifecycle");
    Ok(Value::Null)
}

/// The `map` sugar of a query handle.
///
/// Captures the query's elements when it is read; handles are built when it
/// is applied. Each element becomes one handle whose path is the base path
/// plus one segment: the document id for a normal query, the array index of
/// the payload for an extra query.
#[derive(Clone)]
pub struct QueryMap {
    store: Arc<StoreInner>,
    base: Path,
    segments: Vec<Segment>,
}

impl QueryMap {
    /// Captures the current elements of the query bound to a handle at `path`.
    pub(crate) fn capture(store: &Arc<StoreInner>, binding: &QueryBinding, path: &Path) -> SignalResult<Self> {
        let (base, segments) = if binding.is_extra {
            let count = match binding.query.get_extra()? {
                Some(Value::Array(items)) => items.len(),
                _ => 0,
            };
            (binding.query.extra_segments(), (0..count).map(Segment::Index).collect())
        } else {
            let ids = binding.query.get_ids()?;
            (path.clone(), ids.into_iter().map(Segment::Key).collect())
        };
        Ok(Self {
            store: Arc::clone(store),
            base,
            segments,
        })
    }

    /// Returns the path the element segments are appended to.
    pub fn base(&self) -> &Path {
        &self.base
    }

    /// Returns the number of elements.
    pub fn len(&self) -> usize {
        self.segments.len()
    }

    /// Returns true if there are no elements.
    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }

    /// Builds one handle per element.
    pub fn handles(&self) -> Vec<Handle> {
        self.map(|handle, _| handle.clone())
    }

    /// Applies `f` to the handle of each element, in order.
    pub fn map<R, F>(&self, mut f: F) -> Vec<R>
    where
        F: FnMut(&Handle, usize) -> R,
    {
        self.segments
            .iter()
            .enumerate()
            .map(|(index, segment)| {
                let handle = self.store.handle(self.base.child(segment.clone()), None);
                f(&handle, index)
            })
            .collect()
    }
}

impl fmt::Debug for QueryMap {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("QueryMap")
            .field("base", &self.base)
            .field("segments", &self.segments)
            .finish()
    }
}
