use indexmap::IndexMap;
use std::hash::Hash;

pub trait Combine {
    /// Combine two values, preferring the values in `self`.
    ///
    /// The logic follows that of Cargo's `config.toml`: a key specified in several config
    /// files takes the value from the file with the highest precedence, while tables are
    /// merged key by key.
    #[must_use]
    fn combine(self, other: Self) -> Self;
}

impl<K, V> Combine for IndexMap<K, V>
where
    K: Eq + Hash,
{
    /// Merge two tables. Keys only present in `other` keep their position; keys present in
    /// `self` replace the value from `other` in place or are appended after it.
    fn combine(self, other: Self) -> Self {
        let mut merged = other;
        for (key, value) in self {
            merged.insert(key, value);
        }
        merged
    }
}

/// Pick `preferred` unless it still holds the default value.
pub(crate) fn prefer<T: PartialEq>(preferred: T, fallback: T, default: &T) -> T {
    if preferred == *default {
        fallback
    } else {
        preferred
    }
}
