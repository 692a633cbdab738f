//! Property-based test generators using proptest.
//!
//! Provides strategies for keys and paths that respect the resolution
//! rules: plain names never start with `$` and never collide with the
//! default root aliases.

use proptest::prelude::*;
use sigstore_backend::{Path, Segment};

const ALIASES: [&str; 4] = ["session", "page", "render", "system"];

/// Strategy for plain property names.
pub fn name_strategy() -> impl Strategy<Value = String> {
    prop::string::string_regex("[a-zA-Z_][a-zA-Z0-9_]{0,11}")
        .expect("Invalid regex")
        .prop_filter("Name must not be a root alias", |name| !ALIASES.contains(&name.as_str()))
}

/// Strategy for `$`-prefixed names, paired with the name they resolve to.
pub fn dollar_name_strategy() -> impl Strategy<Value = (String, String)> {
    name_strategy().prop_map(|name| (format!("${name}"), name))
}

/// Strategy for path segments: mostly names, sometimes indices.
pub fn segment_strategy() -> impl Strategy<Value = Segment> {
    prop_oneof![
        3 => name_strategy().prop_map(Segment::Key),
        1 => (0usize..16).prop_map(Segment::Index),
    ]
}

/// Strategy for paths whose first segment is a plain name.
pub fn path_strategy() -> impl Strategy<Value = Path> {
    (name_strategy(), prop::collection::vec(segment_strategy(), 0..6)).prop_map(|(first, rest)| {
        Path::from_segments(std::iter::once(Segment::Key(first)).chain(rest))
    })
}

/// Strategy for one of the default root aliases.
pub fn alias_strategy() -> impl Strategy<Value = &'static str> {
    prop::sample::select(ALIASES.to_vec())
}
