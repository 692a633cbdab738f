//! End-to-end behaviour of handles over the in-memory backends.

use serde_json::{json, Value};
use sigstore_backend::{path, ChangeKind, ModelBackend, Path, Query, QueryDefinition};
use sigstore_core::{Access, AliasTable, Key, SignalError, StoreConfig, Symbol, DELETE_NOT_ALLOWED, WRITE_NOT_ALLOWED};
use sigstore_testkit::prelude::*;
use std::sync::Arc;

#[test]
fn query_map_yields_one_handle_per_id() {
    init_tracing();
    with_store(|store| {
        let news = store.query(QueryDefinition::docs("posts").filter("tag", json!("news")));
        assert_eq!(news.get_ids().unwrap(), vec!["a".to_string(), "b".to_string()]);

        let handle = store.store.query(path!["posts"], news);
        let Access::Map(map) = handle.at("map").unwrap() else {
            panic!("expected map sugar");
        };
        let handles = map.map(|handle, _| handle.clone());

        assert_eq!(handles.len(), 2);
        assert_eq!(handles[0].path(), &path!["posts", "a"]);
        assert_eq!(handles[1].path(), &path!["posts", "b"]);
        assert!(handles[0].ptr_eq(&store.handle(path!["posts", "a"])));
        assert!(handles[1].ptr_eq(&store.root().dig(["posts", "b"]).unwrap()));
    });
}

#[test]
fn aliased_session_write_targets_real_key() {
    init_tracing();
    let config = StoreConfig::new().aliases(AliasTable::empty().with("session", "_session"));
    let store = TestStore::with_config(blog_data(), config);

    let visible = store.root().dig(["session", "visible"]).unwrap();
    assert_eq!(visible.path(), &path!["_session", "visible"]);

    visible.invoke_method("set", vec![json!(true)]).unwrap();
    assert_eq!(store.model.read(&path!["_session", "visible"]).unwrap(), Some(json!(true)));
    assert_eq!(store.model.read(&path!["session", "visible"]).unwrap(), None);

    // only the configured alias applies
    assert_eq!(store.root().child("page").unwrap().path(), &path!["page"]);
}

#[test]
fn direct_write_throws_and_leaves_state() {
    init_tracing();
    with_store(|store| {
        let before = store.model.snapshot();
        let sequence = store.model.sequence();

        let post = store.root().dig(["posts", "a"]).unwrap();
        let err = post.write("x", json!(5)).unwrap_err();
        assert_eq!(err.to_string(), WRITE_NOT_ALLOWED);
        let err = post.child("title").unwrap().write("length", json!(0)).unwrap_err();
        assert!(err.is_mutation_not_allowed());
        let err = store.root().write("posts", json!(null)).unwrap_err();
        assert!(err.is_mutation_not_allowed());

        let err = post.delete("title").unwrap_err();
        assert_eq!(err.to_string(), DELETE_NOT_ALLOWED);
        let err = post.delete(Symbol::internal("state")).unwrap_err();
        assert!(err.is_mutation_not_allowed());

        assert_eq!(store.model.snapshot(), before);
        assert_eq!(store.model.sequence(), sequence);
        assert_eq!(store.model.read(&path!["posts", "a", "x"]).unwrap(), None);
    });
}

#[test]
fn extra_get_matches_get_extra() {
    with_store(|store| {
        let count = store.query(QueryDefinition::docs("posts").filter("author", json!("u1")).count());
        let expected = count.get_extra().unwrap().unwrap_or(Value::Null);
        let handle = store.store.query(path!["posts"], count);

        assert!(handle.is_extra_query());
        assert_eq!(handle.invoke_method("get", vec![]).unwrap(), expected);
        assert_eq!(expected, json!(2));
    });
}

#[test]
fn ids_field_addresses_materialised_ids() {
    with_store(|store| {
        let drafts = store.query(QueryDefinition::docs("posts").filter("draft", json!(false)));
        let ids_path = drafts.ids_segments();
        let handle = store.store.query(path!["posts"], drafts);

        handle.invoke_method("fetch", vec![]).unwrap();
        let ids = handle.child("ids").unwrap();
        assert_eq!(ids.path(), &ids_path);
        assert_eq!(ids.value().unwrap(), Some(json!(["a", "c"])));

        handle.invoke_method("unfetch", vec![]).unwrap();
        assert_eq!(ids.value().unwrap(), None);
    });
}

#[test]
fn live_query_follows_writes_through_handles() {
    with_store(|store| {
        let news = store.query(QueryDefinition::docs("posts").filter("tag", json!("news")));
        let handle = store.store.query(path!["posts"], news);
        handle.invoke_method("subscribe", vec![]).unwrap();

        store
            .root()
            .dig(["posts", "c", "tag"])
            .unwrap()
            .invoke_method("set", vec![json!("news")])
            .unwrap();

        assert_eq!(handle.invoke_method("getIds", vec![]).unwrap(), json!(["a", "b", "c"]));
        assert_eq!(handle.child("ids").unwrap().value().unwrap(), Some(json!(["a", "b", "c"])));

        handle.invoke_method("unsubscribe", vec![]).unwrap();
        assert_eq!(handle.child("ids").unwrap().value().unwrap(), None);
    });
}

#[test]
fn live_ids_are_current_without_a_query_call() {
    with_store(|store| {
        let news = store.query(QueryDefinition::docs("posts").filter("tag", json!("news")));
        let handle = store.store.query(path!["posts"], news);
        handle.invoke_method("subscribe", vec![]).unwrap();
        let ids = handle.child("ids").unwrap();
        assert_eq!(ids.value().unwrap(), Some(json!(["a", "b"])));

        store
            .root()
            .dig(["posts", "c", "tag"])
            .unwrap()
            .invoke_method("set", vec![json!("news")])
            .unwrap();
        assert_eq!(ids.value().unwrap(), Some(json!(["a", "b", "c"])));

        let count = store.query(QueryDefinition::docs("posts").count());
        let counted = store.store.query(path!["posts"], count.clone());
        counted.invoke_method("subscribe", vec![]).unwrap();
        let extra = store.handle(count.extra_segments());
        assert_eq!(extra.value().unwrap(), Some(json!(3)));

        store
            .root()
            .child("posts")
            .unwrap()
            .invoke_method("add", vec![json!({"id": "d", "tag": "news"})])
            .unwrap();
        assert_eq!(extra.value().unwrap(), Some(json!(4)));
        assert_eq!(ids.value().unwrap(), Some(json!(["a", "b", "c", "d"])));
    });
}

#[test]
fn sanctioned_mutations_emit_change_events() {
    with_store(|store| {
        let events = store.model.subscribe();
        let users = store.root().child("users").unwrap();

        let id = users.invoke_method("add", vec![json!({"id": "u3", "name": "Cy"})]).unwrap();
        assert_eq!(id, json!("u3"));
        users.dig(["u3", "name"]).unwrap().invoke_method("del", vec![]).unwrap();

        let first = events.try_recv().unwrap();
        assert_eq!(first.path, path!["users", "u3"]);
        assert_eq!(first.kind, ChangeKind::Insert);
        let second = events.try_recv().unwrap();
        assert_eq!(second.path, path!["users", "u3", "name"]);
        assert_eq!(second.kind, ChangeKind::Delete);
        assert!(second.sequence > first.sequence);
    });
}

#[test]
fn array_map_sugar_over_model_arrays() {
    with_store(|store| {
        let tags = store.root().child("tags").unwrap();
        let values = tags
            .child("map")
            .unwrap()
            .map(|tag, _| tag.value().unwrap())
            .unwrap();
        assert_eq!(values, vec![Some(json!("news")), Some(json!("howto"))]);

        tags.invoke_method("push", vec![json!("rust")]).unwrap();
        let paths = tags.child("map").unwrap().map(|tag, _| tag.path().clone()).unwrap();
        assert_eq!(paths.last(), Some(&path!["tags", 2usize]));
    });
}

#[test]
fn observer_records_reads_in_order() {
    with_store(|store| {
        let observer = Arc::new(RecordingObserver::new());
        store.set_observer(observer.clone());

        store.root().dig(["$session", "userId"]).unwrap();
        let reads = observer.take();
        assert_eq!(
            reads,
            vec![
                (Path::root(), Key::from("$session")),
                (path!["_session"], Key::from("userId")),
            ]
        );

        store.clear_observer();
        store.root().child("users").unwrap();
        assert!(observer.is_empty());
    });
}

#[test]
fn internal_symbols_survive_as_long_as_the_handle() {
    with_store(|store| {
        let marker = Symbol::internal("subscribed");
        let post = store.root().dig(["posts", "a"]).unwrap();
        post.write(&marker, json!(true)).unwrap();
        assert!(store.root().dig(["posts", "a"]).unwrap().has(&marker));

        let path = post.path().clone();
        drop(post);
        assert!(!store.handle(path).has(&marker));
    });
}

#[test]
fn backend_errors_surface_unchanged() {
    with_store(|store| {
        let title = store.root().dig(["posts", "a", "title"]).unwrap();
        let err = title.invoke_method("push", vec![json!(1)]).unwrap_err();
        assert!(matches!(err, SignalError::Backend(_)));
        let err = title.invoke_method("teleport", vec![]).unwrap_err();
        assert!(err.to_string().contains("teleport"));
    });
}
