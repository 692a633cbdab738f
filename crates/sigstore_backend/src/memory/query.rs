//! In-memory query backend.
//!
//! Queries select documents of one collection by field equality. Results are
//! materialised into the model under `[query_root, hash, "ids"]` and
//! `[query_root, hash, "extra"]` while the query is fetched or subscribed.

use crate::backend::{ModelBackend, Query};
use crate::change_feed::{ChangeEvent, ChangeWatcher};
use crate::error::BackendResult;
use crate::memory::model::MemoryModel;
use crate::path::Path;
use parking_lot::{Mutex, RwLock};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, warn};

/// What a query computes besides its ids.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum QueryKind {
    /// Plain id-list query, no extra payload.
    Docs,
    /// Extra payload is the number of matches.
    Count,
    /// Extra payload is the distinct values of a field, in first-seen order.
    Distinct(String),
}

/// Declarative description of a query.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueryDefinition {
    /// Root-level collection to select from.
    pub collection: String,
    /// Field equality constraints; empty matches everything.
    pub filter: Map<String, Value>,
    /// What to compute.
    pub kind: QueryKind,
}

impl QueryDefinition {
    /// Selects every document of `collection`.
    pub fn docs(collection: impl Into<String>) -> Self {
        Self {
            collection: collection.into(),
            filter: Map::new(),
            kind: QueryKind::Docs,
        }
    }

    /// Adds a field equality constraint.
    #[must_use]
    pub fn filter(mut self, field: impl Into<String>, value: Value) -> Self {
        self.filter.insert(field.into(), value);
        self
    }

    /// Turns the query into a count query.
    #[must_use]
    pub fn count(mut self) -> Self {
        self.kind = QueryKind::Count;
        self
    }

    /// Turns the query into a distinct-values query over `field`.
    #[must_use]
    pub fn distinct(mut self, field: impl Into<String>) -> Self {
        self.kind = QueryKind::Distinct(field.into());
        self
    }

    /// Returns true if the query carries an extra payload.
    pub fn is_extra(&self) -> bool {
        self.kind != QueryKind::Docs
    }

    /// Canonical JSON form, used as the query's identity.
    ///
    /// # Errors
    ///
    /// Returns an error if the definition cannot be serialized.
    pub fn hash(&self) -> BackendResult<String> {
        Ok(serde_json::to_string(self)?)
    }

    fn matches(&self, doc: &Value) -> bool {
        self.filter
            .iter()
            .all(|(field, expected)| doc.get(field) == Some(expected))
    }
}

#[derive(Default)]
struct QueryState {
    fetches: usize,
    subscriptions: usize,
    evaluated_at: Option<u64>,
    ids: Vec<String>,
    extra: Option<Value>,
}

impl QueryState {
    fn is_active(&self) -> bool {
        self.fetches > 0 || self.subscriptions > 0
    }
}

/// A query over a [`MemoryModel`].
pub struct MemoryQuery {
    definition: QueryDefinition,
    model: Arc<MemoryModel>,
    collection_path: Path,
    entry_path: Path,
    ids_path: Path,
    extra_path: Path,
    state: Mutex<QueryState>,
}

impl MemoryQuery {
    fn new(definition: QueryDefinition, hash: String, model: Arc<MemoryModel>) -> Self {
        let entry_path = Path::from_segments([model.config().query_root.clone(), hash]);
        Self {
            ids_path: entry_path.child("ids"),
            extra_path: entry_path.child("extra"),
            entry_path,
            collection_path: Path::from_segments([definition.collection.as_str()]),
            definition,
            model,
            state: Mutex::new(QueryState::default()),
        }
    }

    /// Returns the definition.
    pub fn definition(&self) -> &QueryDefinition {
        &self.definition
    }

    /// Returns true while fetched or subscribed.
    pub fn is_active(&self) -> bool {
        self.state.lock().is_active()
    }

    /// Returns true while at least one subscription is held.
    pub fn is_live(&self) -> bool {
        self.state.lock().subscriptions > 0
    }

    fn evaluate(&self) -> BackendResult<(Vec<String>, Option<Value>)> {
        let mut ids = Vec::new();
        let mut docs = Vec::new();
        if let Some(Value::Object(members)) = self.model.read(&self.collection_path)? {
            for (id, doc) in members {
                if self.definition.matches(&doc) {
                    ids.push(id);
                    docs.push(doc);
                }
            }
        }
        let extra = match &self.definition.kind {
            QueryKind::Docs => None,
            QueryKind::Count => Some(Value::from(ids.len())),
            QueryKind::Distinct(field) => {
                let mut seen: Vec<Value> = Vec::new();
                for value in docs.iter().filter_map(|doc| doc.get(field)) {
                    if !seen.contains(value) {
                        seen.push(value.clone());
                    }
                }
                Some(Value::Array(seen))
            }
        };
        Ok((ids, extra))
    }

    /// Re-evaluates and writes the result into the model.
    fn materialize(&self, state: &mut QueryState) -> BackendResult<()> {
        let (ids, extra) = self.evaluate()?;
        let ids_json = Value::Array(ids.iter().cloned().map(Value::String).collect());
        self.model.put(&self.ids_path, Some(ids_json))?;
        if self.definition.is_extra() {
            self.model.put(&self.extra_path, extra.clone())?;
        }
        state.ids = ids;
        state.extra = extra;
        state.evaluated_at = Some(self.model.sequence());
        Ok(())
    }

    fn release(&self, state: &mut QueryState) -> BackendResult<()> {
        if state.is_active() {
            return Ok(());
        }
        debug!(collection = %self.definition.collection, "query released");
        self.model.put(&self.entry_path, None)?;
        *state = QueryState::default();
        Ok(())
    }

    /// Returns the current ids and extra payload.
    ///
    /// Live queries re-evaluate when the model changed since their last
    /// evaluation; fetched queries keep their snapshot; inactive queries
    /// are evaluated on demand without being materialised.
    fn current(&self) -> BackendResult<(Vec<String>, Option<Value>)> {
        let mut state = self.state.lock();
        if !state.is_active() {
            drop(state);
            return self.evaluate();
        }
        let stale = state.evaluated_at != Some(self.model.sequence());
        if state.evaluated_at.is_none() || (state.subscriptions > 0 && stale) {
            self.materialize(&mut state)?;
        }
        Ok((state.ids.clone(), state.extra.clone()))
    }
}

/// Subscribed queries rewrite their materialised result as soon as their
/// collection changes, so readers of the model never see stale ids.
impl ChangeWatcher for MemoryQuery {
    fn on_change(&self, event: &ChangeEvent) {
        // Writes under the query root never touch a collection, so this
        // returns before locking when the query's own refresh is emitted.
        if !event.touches(&self.collection_path) {
            return;
        }
        let mut state = self.state.lock();
        if state.subscriptions == 0 {
            return;
        }
        if let Err(err) = self.materialize(&mut state) {
            warn!(collection = %self.definition.collection, sequence = event.sequence, error = %err, "live query refresh failed");
        }
    }
}

impl Query for MemoryQuery {
    fn get(&self) -> BackendResult<Value> {
        if self.definition.is_extra() {
            return Ok(Value::Array(Vec::new()));
        }
        let (ids, _) = self.current()?;
        let mut docs = Vec::with_capacity(ids.len());
        for id in ids {
            if let Some(doc) = self.model.read(&self.collection_path.child(id))? {
                docs.push(doc);
            }
        }
        Ok(Value::Array(docs))
    }

    fn get_ids(&self) -> BackendResult<Vec<String>> {
        Ok(self.current()?.0)
    }

    fn get_extra(&self) -> BackendResult<Option<Value>> {
        Ok(self.current()?.1)
    }

    fn subscribe(&self) -> BackendResult<()> {
        let mut state = self.state.lock();
        state.subscriptions += 1;
        debug!(collection = %self.definition.collection, subscriptions = state.subscriptions, "query subscribed");
        self.materialize(&mut state)
    }

    fn unsubscribe(&self) -> BackendResult<()> {
        let mut state = self.state.lock();
        if state.subscriptions == 0 {
            debug!(collection = %self.definition.collection, "unsubscribe without subscription");
            return Ok(());
        }
        state.subscriptions -= 1;
        self.release(&mut state)
    }

    fn fetch(&self) -> BackendResult<()> {
        let mut state = self.state.lock();
        state.fetches += 1;
        debug!(collection = %self.definition.collection, fetches = state.fetches, "query fetched");
        self.materialize(&mut state)
    }

    fn unfetch(&self) -> BackendResult<()> {
        let mut state = self.state.lock();
        if state.fetches == 0 {
            debug!(collection = %self.definition.collection, "unfetch without fetch");
            return Ok(());
        }
        state.fetches -= 1;
        self.release(&mut state)
    }

    fn ids_segments(&self) -> Path {
        self.ids_path.clone()
    }

    fn extra_segments(&self) -> Path {
        self.extra_path.clone()
    }

    fn is_extra(&self) -> bool {
        self.definition.is_extra()
    }
}

/// Creates and deduplicates [`MemoryQuery`] instances over one model.
///
/// # Example
///
/// ```rust
/// use sigstore_backend::{path, MemoryModel, MemoryQueries, ModelBackend, Query, QueryDefinition};
/// use serde_json::json;
/// use std::sync::Arc;
///
/// let model = Arc::new(MemoryModel::new());
/// model.invoke(&path!["posts"], "add", &[json!({"id": "a", "draft": false})]).unwrap();
/// model.invoke(&path!["posts"], "add", &[json!({"id": "b", "draft": true})]).unwrap();
///
/// let queries = MemoryQueries::new(Arc::clone(&model));
/// let published = queries.query(QueryDefinition::docs("posts").filter("draft", json!(false))).unwrap();
/// assert_eq!(published.get_ids().unwrap(), vec!["a".to_string()]);
/// ```
pub struct MemoryQueries {
    model: Arc<MemoryModel>,
    queries: RwLock<HashMap<String, Arc<MemoryQuery>>>,
}

impl MemoryQueries {
    /// Creates a query backend over `model`.
    pub fn new(model: Arc<MemoryModel>) -> Self {
        Self {
            model,
            queries: RwLock::new(HashMap::new()),
        }
    }

    /// Returns the model the queries run against.
    pub fn model(&self) -> &Arc<MemoryModel> {
        &self.model
    }

    /// Returns the query for `definition`, creating it on first use.
    ///
    /// # Errors
    ///
    /// Returns an error if the definition cannot be hashed.
    pub fn query(&self, definition: QueryDefinition) -> BackendResult<Arc<MemoryQuery>> {
        let hash = definition.hash()?;
        if let Some(query) = self.queries.read().get(&hash) {
            return Ok(Arc::clone(query));
        }
        let mut queries = self.queries.write();
        let query = queries.entry(hash.clone()).or_insert_with(|| {
            debug!(query = %hash, "query created");
            let query = Arc::new(MemoryQuery::new(definition, hash.clone(), Arc::clone(&self.model)));
            let watcher = Arc::downgrade(&query);
            self.model.feed().watch(watcher);
            query
        });
        Ok(Arc::clone(query))
    }

    /// Returns the number of distinct queries created so far.
    pub fn len(&self) -> usize {
        self.queries.read().len()
    }

    /// Returns true if no query has been created.
    pub fn is_empty(&self) -> bool {
        self.queries.read().is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::path;
    use serde_json::json;

    fn seeded() -> (Arc<MemoryModel>, MemoryQueries) {
        let model = Arc::new(MemoryModel::with_data(json!({
            "posts": {
                "a": {"id": "a", "author": "ann", "published": true},
                "b": {"id": "b", "author": "bob", "published": false},
                "c": {"id": "c", "author": "ann", "published": true}
            }
        })));
        let queries = MemoryQueries::new(Arc::clone(&model));
        (model, queries)
    }

    #[test]
    fn ids_follow_insertion_order() {
        let (_, queries) = seeded();
        let q = queries
            .query(QueryDefinition::docs("posts").filter("published", json!(true)))
            .unwrap();
        assert_eq!(q.get_ids().unwrap(), vec!["a", "c"]);
        assert_eq!(q.get_extra().unwrap(), None);
        let docs = q.get().unwrap();
        assert_eq!(docs.as_array().unwrap().len(), 2);
    }

    #[test]
    fn identical_definitions_share_a_query() {
        let (_, queries) = seeded();
        let a = queries.query(QueryDefinition::docs("posts")).unwrap();
        let b = queries.query(QueryDefinition::docs("posts")).unwrap();
        assert!(Arc::ptr_eq(&a, &b));
        assert_eq!(queries.len(), 1);
    }

    #[test]
    fn count_and_distinct_extras() {
        let (_, queries) = seeded();
        let count = queries.query(QueryDefinition::docs("posts").count()).unwrap();
        assert!(count.is_extra());
        assert_eq!(count.get_extra().unwrap(), Some(json!(3)));
        assert_eq!(count.get().unwrap(), json!([]));

        let authors = queries
            .query(QueryDefinition::docs("posts").distinct("author"))
            .unwrap();
        assert_eq!(authors.get_extra().unwrap(), Some(json!(["ann", "bob"])));
    }

    #[test]
    fn fetch_materialises_and_unfetch_releases() {
        let (model, queries) = seeded();
        let q = queries.query(QueryDefinition::docs("posts").count()).unwrap();
        q.fetch().unwrap();
        assert_eq!(model.read(&q.ids_segments()).unwrap(), Some(json!(["a", "b", "c"])));
        assert_eq!(model.read(&q.extra_segments()).unwrap(), Some(json!(3)));

        q.unfetch().unwrap();
        assert!(!q.is_active());
        assert_eq!(model.read(&q.ids_segments()).unwrap(), None);
        // Extra unfetch is a no-op
        q.unfetch().unwrap();
    }

    #[test]
    fn fetched_snapshot_is_not_live() {
        let (model, queries) = seeded();
        let q = queries.query(QueryDefinition::docs("posts")).unwrap();
        q.fetch().unwrap();
        model.invoke(&path!["posts"], "add", &[json!({"id": "d"})]).unwrap();
        assert_eq!(q.get_ids().unwrap(), vec!["a", "b", "c"]);
    }

    #[test]
    fn subscribed_query_follows_changes() {
        let (model, queries) = seeded();
        let q = queries.query(QueryDefinition::docs("posts")).unwrap();
        q.subscribe().unwrap();
        assert!(q.is_live());
        model.invoke(&path!["posts"], "add", &[json!({"id": "d"})]).unwrap();
        model.invoke(&path!["posts", "a"], "del", &[]).unwrap();
        assert_eq!(q.get_ids().unwrap(), vec!["b", "c", "d"]);
        assert_eq!(model.read(&q.ids_segments()).unwrap(), Some(json!(["b", "c", "d"])));
        q.unsubscribe().unwrap();
        assert!(!q.is_live());
    }

    #[test]
    fn subscribed_results_refresh_in_the_model() {
        let (model, queries) = seeded();
        let docs = queries.query(QueryDefinition::docs("posts")).unwrap();
        let count = queries.query(QueryDefinition::docs("posts").count()).unwrap();
        docs.subscribe().unwrap();
        count.subscribe().unwrap();

        model.invoke(&path!["posts"], "add", &[json!({"id": "d"})]).unwrap();
        let ids = model.read(&docs.ids_segments()).unwrap().unwrap();
        assert_eq!(ids.as_array().unwrap().len(), 4);
        assert_eq!(model.read(&count.extra_segments()).unwrap(), Some(json!(4)));

        model.invoke(&path!["posts", "b"], "del", &[]).unwrap();
        assert_eq!(model.read(&count.extra_segments()).unwrap(), Some(json!(3)));
    }

    #[test]
    fn unrelated_writes_and_fetched_queries_are_left_alone() {
        let (model, queries) = seeded();
        let q = queries.query(QueryDefinition::docs("posts")).unwrap();
        q.fetch().unwrap();
        model.invoke(&path!["posts"], "add", &[json!({"id": "d"})]).unwrap();
        model.invoke(&path!["_session", "userId"], "set", &[json!("u1")]).unwrap();
        assert_eq!(model.read(&q.ids_segments()).unwrap(), Some(json!(["a", "b", "c"])));
        assert_eq!(model.feed().watcher_count(), 1);
    }

    #[test]
    fn segments_live_under_query_root() {
        let (_, queries) = seeded();
        let q = queries.query(QueryDefinition::docs("posts")).unwrap();
        let ids = q.ids_segments();
        assert_eq!(ids.segments()[0].as_key(), Some("$queries"));
        assert_eq!(ids.leaf().and_then(|s| s.as_key()), Some("ids"));
        assert_eq!(q.extra_segments().parent(), ids.parent());
    }
}
