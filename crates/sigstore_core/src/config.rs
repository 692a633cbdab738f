//! Store configuration.

/// Root-level aliases for framework-reserved collections.
///
/// An alias lets application code say `session` where the model stores
/// `_session`, without claiming the name `session` for every level of the
/// tree: aliases only apply to the first segment of a path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AliasTable {
    entries: Vec<(String, String)>,
}

impl AliasTable {
    /// Creates an empty table.
    #[must_use]
    pub fn empty() -> Self {
        Self {
            entries: Vec::new(),
        }
    }

    /// Adds (or replaces) an alias.
    #[must_use]
    pub fn with(mut self, alias: impl Into<String>, real: impl Into<String>) -> Self {
        self.insert(alias, real);
        self
    }

    /// Adds (or replaces) an alias in place.
    pub fn insert(&mut self, alias: impl Into<String>, real: impl Into<String>) {
        let alias = alias.into();
        let real = real.into();
        match self.entries.iter_mut().find(|(name, _)| *name == alias) {
            Some(entry) => entry.1 = real,
            None => self.entries.push((alias, real)),
        }
    }

    /// Returns the real key for `alias`.
    pub fn get(&self, alias: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|(name, _)| name == alias)
            .map(|(_, real)| real.as_str())
    }

    /// Iterates over `(alias, real)` pairs in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(a, r)| (a.as_str(), r.as_str()))
    }

    /// Returns the number of aliases.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns true if the table has no aliases.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl Default for AliasTable {
    fn default() -> Self {
        Self::empty()
            .with("session", "_session")
            .with("page", "_page")
            .with("render", "$render")
            .with("system", "$system")
    }
}

/// Configuration for a [`crate::SignalStore`].
#[derive(Debug, Clone)]
pub struct StoreConfig {
    /// Root-level collection aliases.
    pub aliases: AliasTable,

    /// Whether `$name` resolves as `name`.
    pub strip_dollar: bool,

    /// Registry size at which dead entries are swept.
    pub prune_threshold: usize,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            aliases: AliasTable::default(),
            strip_dollar: true,
            prune_threshold: 1024,
        }
    }
}

impl StoreConfig {
    /// Creates a new configuration with default values.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the alias table.
    #[must_use]
    pub fn aliases(mut self, aliases: AliasTable) -> Self {
        self.aliases = aliases;
        self
    }

    /// Sets whether a leading `$` is stripped from names.
    #[must_use]
    pub const fn strip_dollar(mut self, value: bool) -> Self {
        self.strip_dollar = value;
        self
    }

    /// Sets the registry prune threshold.
    #[must_use]
    pub const fn prune_threshold(mut self, value: usize) -> Self {
        self.prune_threshold = value;
        self
    }
}
