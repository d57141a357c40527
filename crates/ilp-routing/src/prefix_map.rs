use std::collections::HashMap;

use serde::ser::{Serialize, SerializeMap, Serializer};

use crate::error::RoutingError;

/// A map whose keys are address prefixes, resolved by longest match.
///
/// Keys are kept ordered by length (descending), then reverse-lexicographically,
/// so the first key in the list that matches an address is its longest match.
///
/// ```
/// use ilp_routing::PrefixMap;
///
/// let mut map = PrefixMap::new();
/// map.insert("foo", 1);
/// map.insert("bar", 2);
/// assert_eq!(map.resolve("foo.bar"), Some(&1));
/// assert_eq!(map.resolve("random"), None);
/// ```
#[derive(Debug, Clone)]
pub struct PrefixMap<T> {
    prefixes: Vec<String>,
    items: HashMap<String, T>,
}

impl<T> Default for PrefixMap<T> {
    fn default() -> Self {
        Self {
            prefixes: Vec::new(),
            items: HashMap::new(),
        }
    }
}

impl<T> PrefixMap<T> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.prefixes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.prefixes.is_empty()
    }

    /// All keys, in resolution order.
    pub fn keys(&self) -> &[String] {
        &self.prefixes
    }

    /// Exact-key lookup.
    pub fn get(&self, prefix: &str) -> Option<&T> {
        self.items.get(prefix)
    }

    /// Value of the longest key that equals `key` or is a segment prefix of it.
    pub fn resolve(&self, key: &str) -> Option<&T> {
        self.resolve_prefix(key).and_then(|p| self.items.get(p))
    }

    /// The longest key that equals `key` or is a segment prefix of it.
    pub fn resolve_prefix(&self, key: &str) -> Option<&str> {
        if let Some((exact, _)) = self.items.get_key_value(key) {
            return Some(exact.as_str());
        }
        self.prefixes
            .iter()
            .find(|p| {
                key.len() > p.len() && key.starts_with(p.as_str()) && key.as_bytes()[p.len()] == b'.'
            })
            .map(String::as_str)
    }

    /// Insert or replace, keeping the key order invariant. Returns the previous value.
    pub fn insert(&mut self, prefix: impl Into<String>, value: T) -> Option<T> {
        let prefix = prefix.into();
        if !self.items.contains_key(&prefix) {
            let index = self
                .prefixes
                .iter()
                .position(|existing| sorts_before(&prefix, existing))
                .unwrap_or(self.prefixes.len());
            self.prefixes.insert(index, prefix.clone());
        }
        self.items.insert(prefix, value)
    }

    /// Remove a key. Unknown keys are ignored.
    pub fn delete(&mut self, prefix: &str) -> Option<T> {
        let removed = self.items.remove(prefix)?;
        if let Some(index) = self.prefixes.iter().position(|p| p == prefix) {
            self.prefixes.remove(index);
        }
        Some(removed)
    }

    /// Keys that start with `prefix` (plain string match, `prefix` itself included).
    pub fn keys_starting_with(&self, prefix: &str) -> Vec<String> {
        self.prefixes
            .iter()
            .filter(|key| key.starts_with(prefix))
            .cloned()
            .collect()
    }

    /// Keys that are strict segment prefixes of `search`, longest first.
    pub fn keys_prefixes_of(&self, search: &str) -> Vec<String> {
        self.prefixes
            .iter()
            .filter(|key| {
                search.len() > key.len()
                    && search.starts_with(key.as_str())
                    && search.as_bytes()[key.len()] == b'.'
            })
            .cloned()
            .collect()
    }

    /// Iterate over entries in key order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &T)> {
        self.prefixes
            .iter()
            .filter_map(move |p| self.items.get(p).map(|v| (p.as_str(), v)))
    }

    /// Find the least specific prefix of `address` (never shorter than
    /// `min_prefix`) that no other known key extends.
    ///
    /// The most specific route for `a.b.c` may be `a`, but if `a.c` is also
    /// known then the route only applies unambiguously to `a.b`.
    pub fn shortest_unambiguous_prefix(
        &self,
        address: &str,
        min_prefix: &str,
    ) -> Result<String, RoutingError> {
        if !address.starts_with(min_prefix) {
            return Err(RoutingError::PrefixMismatch {
                address: address.to_string(),
                prefix: min_prefix.to_string(),
            });
        }

        let mut prefix = min_prefix.to_string();
        for key in &self.prefixes {
            if *key == prefix {
                continue;
            }
            while key.starts_with(prefix.as_str()) {
                if *key == prefix {
                    break;
                }
                let next_segment_end = address
                    .get(prefix.len() + 1..)
                    .and_then(|rest| rest.find('.'))
                    .map(|i| i + prefix.len() + 1);
                match next_segment_end {
                    Some(end) => prefix = address[..end].to_string(),
                    None => {
                        prefix = address.to_string();
                        break;
                    }
                }
            }
        }
        Ok(prefix)
    }
}

/// Ordering rule: longer keys first; equal lengths in reverse-lexicographic order.
fn sorts_before(prefix: &str, existing: &str) -> bool {
    if prefix.len() == existing.len() {
        prefix > existing
    } else {
        prefix.len() > existing.len()
    }
}

impl<T: Serialize> Serialize for PrefixMap<T> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.len()))?;
        for (key, value) in self.iter() {
            map.serialize_entry(key, value)?;
        }
        map.end()
    }
}
