//! Key resolution rules.
//!
//! Turns a raw accessed [`Key`] into the segment actually appended to a
//! path:
//!
//! 1. symbols are tunnelled untouched;
//! 2. one leading `$` is stripped from a name (`$count` is `count`,
//!    `$$count` is the literal `$count`);
//! 3. at the root, the alias table substitutes reserved collection names;
//! 4. anything else is used unchanged.

use crate::config::StoreConfig;
use crate::key::{Key, Symbol};
use sigstore_backend::{Path, Segment};

/// Outcome of [`resolve_key`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResolvedKey {
    /// A bookkeeping symbol, never part of a path.
    Symbol(Symbol),
    /// The segment to append to the path.
    Segment(Segment),
}

/// Strips exactly one leading `$` when something follows it.
///
/// A bare `"$"` is returned unchanged.
pub fn strip_dollar(name: &str) -> &str {
    match name.strip_prefix('$') {
        Some(rest) if !rest.is_empty() => rest,
        _ => name,
    }
}

/// Resolves `key`, accessed on the handle at `path`.
pub fn resolve_key(path: &Path, key: &Key, config: &StoreConfig) -> ResolvedKey {
    let name = match key {
        Key::Symbol(symbol) => return ResolvedKey::Symbol(symbol.clone()),
        Key::Index(index) => return ResolvedKey::Segment(Segment::Index(*index)),
        Key::Name(name) => name.as_str(),
    };
    let name = if config.strip_dollar {
        strip_dollar(name)
    } else {
        name
    };
    let name = if path.is_root() {
        config.aliases.get(name).unwrap_or(name)
    } else {
        name
    };
    ResolvedKey::Segment(Segment::Key(name.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AliasTable;
    use proptest::prelude::*;

    fn resolve(path: &Path, key: &str) -> Segment {
        match resolve_key(path, &Key::from(key), &StoreConfig::default()) {
            ResolvedKey::Segment(segment) => segment,
            ResolvedKey::Symbol(symbol) => panic!("unexpected symbol {symbol}"),
        }
    }

    #[test]
    fn dollar_is_stripped_once() {
        assert_eq!(strip_dollar("$count"), "count");
        assert_eq!(strip_dollar("$$count"), "$count");
        assert_eq!(strip_dollar("count"), "count");
        assert_eq!(strip_dollar("$"), "$");
        assert_eq!(strip_dollar("a$b"), "a$b");
    }

    #[test]
    fn root_aliases() {
        let root = Path::root();
        assert_eq!(resolve(&root, "session"), Segment::from("_session"));
        assert_eq!(resolve(&root, "page"), Segment::from("_page"));
        assert_eq!(resolve(&root, "render"), Segment::from("$render"));
        assert_eq!(resolve(&root, "system"), Segment::from("$system"));
        assert_eq!(resolve(&root, "$session"), Segment::from("_session"));
        assert_eq!(resolve(&root, "users"), Segment::from("users"));
    }

    #[test]
    fn aliases_do_not_apply_below_root() {
        let nested = Path::from_segments(["a"]);
        assert_eq!(resolve(&nested, "session"), Segment::from("session"));
        assert_eq!(resolve(&nested, "$session"), Segment::from("session"));
    }

    #[test]
    fn double_dollar_reaches_literal_key() {
        assert_eq!(resolve(&Path::root(), "$$count"), Segment::from("$count"));
        assert_eq!(resolve(&Path::root(), "$$system"), Segment::from("$system"));
    }

    #[test]
    fn symbols_and_indices_pass_through() {
        let config = StoreConfig::default();
        let symbol = Symbol::internal("state");
        assert_eq!(
            resolve_key(&Path::root(), &Key::from(&symbol), &config),
            ResolvedKey::Symbol(symbol)
        );
        assert_eq!(
            resolve_key(&Path::root(), &Key::Index(4), &config),
            ResolvedKey::Segment(Segment::Index(4))
        );
    }

    #[test]
    fn stripping_can_be_disabled() {
        let config = StoreConfig::new().strip_dollar(false).aliases(AliasTable::empty());
        assert_eq!(
            resolve_key(&Path::root(), &Key::from("$count"), &config),
            ResolvedKey::Segment(Segment::from("$count"))
        );
    }

    proptest! {
        #[test]
        fn dollar_prefix_resolves_like_bare_name(name in "[a-z][a-zA-Z0-9_]{0,15}") {
            let nested = Path::from_segments(["doc"]);
            prop_assert_eq!(resolve(&nested, &format!("${name}")), resolve(&nested, &name));
        }

        #[test]
        fn escaped_dollar_keeps_one_dollar(name in "[a-z][a-zA-Z0-9_]{0,15}") {
            let nested = Path::from_segments(["doc"]);
            prop_assert_eq!(resolve(&nested, &format!("$${name}")), Segment::Key(format!("${name}")));
        }
    }
}
