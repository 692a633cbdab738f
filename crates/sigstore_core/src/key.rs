//! Raw access keys.

use sigstore_backend::Segment;
use std::borrow::Cow;
use std::fmt;

/// A bookkeeping key that never addresses document data.
///
/// Symbol keys are tunnelled to the handle's own slot table. Only
/// internal symbols may be written through a handle.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Symbol {
    name: Cow<'static, str>,
    internal: bool,
}

impl Symbol {
    /// Creates an ordinary symbol; writes through it are rejected.
    pub fn new(name: impl Into<Cow<'static, str>>) -> Self {
        Self {
            name: name.into(),
            internal: false,
        }
    }

    /// Creates a framework-internal symbol; writes through it are allowed.
    pub fn internal(name: impl Into<Cow<'static, str>>) -> Self {
        Self {
            name: name.into(),
            internal: true,
        }
    }

    /// Returns the symbol's name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns true for framework-internal symbols.
    pub const fn is_internal(&self) -> bool {
        self.internal
    }
}

impl fmt::Display for Symbol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Symbol({})", self.name)
    }
}

/// A key as accessed by application code, before resolution.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Key {
    /// A property name.
    Name(String),
    /// An array position.
    Index(usize),
    /// A bookkeeping symbol.
    Symbol(Symbol),
}

impl Key {
    /// Returns the property name, if this is a name key.
    pub fn as_name(&self) -> Option<&str> {
        match self {
            Self::Name(name) => Some(name),
            _ => None,
        }
    }

    /// Returns true for symbol keys.
    pub const fn is_symbol(&self) -> bool {
        matches!(self, Self::Symbol(_))
    }
}

impl fmt::Display for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Name(name) => f.write_str(name),
            Self::Index(index) => write!(f, "{index}"),
            Self::Symbol(symbol) => write!(f, "{symbol}"),
        }
    }
}

impl From<&str> for Key {
    fn from(name: &str) -> Self {
        Self::Name(name.to_string())
    }
}

impl From<String> for Key {
    fn from(name: String) -> Self {
        Self::Name(name)
    }
}

impl From<usize> for Key {
    fn from(index: usize) -> Self {
        Self::Index(index)
    }
}

impl From<Symbol> for Key {
    fn from(symbol: Symbol) -> Self {
        Self::Symbol(symbol)
    }
}

impl From<&Symbol> for Key {
    fn from(symbol: &Symbol) -> Self {
        Self::Symbol(symbol.clone())
    }
}

impl From<Segment> for Key {
    fn from(segment: Segment) -> Self {
        match segment {
            Segment::Key(name) => Self::Name(name),
            Segment::Index(index) => Self::Index(index),
        }
    }
}
