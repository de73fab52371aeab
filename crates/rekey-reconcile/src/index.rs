//! Lookup index over the authoritative entity collection.

use std::collections::{HashMap, HashSet};

use crate::reconcile::Verdict;

/// A canonical record in the authoritative collection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntityRecord {
    /// The store-assigned document key. Stable and unique.
    pub key: String,
    /// An older identifier once used as a foreign key elsewhere.
    /// May be absent and may not equal `key`.
    pub legacy_id: Option<String>,
}

impl EntityRecord {
    pub fn new(key: impl Into<String>, legacy_id: Option<String>) -> Self {
        Self {
            key: key.into(),
            legacy_id,
        }
    }
}

/// Index built once per migration run from a full entity scan.
///
/// Holds the set of valid canonical keys and the legacy-id-to-key mapping.
/// Never persisted; a run always reconciles against the index built in the
/// same run.
#[derive(Debug, Default)]
pub struct LookupIndex {
    valid_keys: HashSet<String>,
    legacy_to_key: HashMap<String, String>,
}

impl LookupIndex {
    /// Build the index from entity records in iteration order.
    ///
    /// Empty legacy ids are skipped. If two records share a legacy id, the
    /// later one wins. That silent overwrite matches the data this tool
    /// repairs; duplicates in the source are not deduplicated.
    pub fn build<I>(entities: I) -> Self
    where
        I: IntoIterator<Item = EntityRecord>,
    {
        let mut index = Self::default();
        for entity in entities {
            if let Some(legacy) = entity.legacy_id.filter(|l| !l.is_empty()) {
                index.legacy_to_key.insert(legacy, entity.key.clone());
            }
            index.valid_keys.insert(entity.key);
        }
        index
    }

    /// Decide what to do with a single reference value.
    pub fn resolve(&self, value: &str) -> Verdict {
        if self.valid_keys.contains(value) {
            Verdict::Keep
        } else if let Some(key) = self.legacy_to_key.get(value) {
            Verdict::Rewrite(key.clone())
        } else {
            Verdict::Drop
        }
    }

    /// Whether a value is a canonical key.
    pub fn is_valid_key(&self, value: &str) -> bool {
        self.valid_keys.contains(value)
    }

    /// Number of canonical keys indexed.
    pub fn len(&self) -> usize {
        self.valid_keys.len()
    }

    /// True when no entities were indexed.
    pub fn is_empty(&self) -> bool {
        self.valid_keys.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entity(key: &str, legacy: Option<&str>) -> EntityRecord {
        EntityRecord::new(key, legacy.map(str::to_string))
    }

    #[test]
    fn valid_keys_match_entity_keys_exactly() {
        let index = LookupIndex::build(vec![
            entity("A", Some("old1")),
            entity("B", None),
            entity("C", Some("old3")),
        ]);

        assert_eq!(index.len(), 3);
        assert!(index.is_valid_key("A"));
        assert!(index.is_valid_key("B"));
        assert!(index.is_valid_key("C"));
        assert!(!index.is_valid_key("old1"));
    }

    #[test]
    fn resolve_prefers_valid_key_over_legacy_mapping() {
        // "B" is both a valid key and someone else's legacy id; valid wins.
        let index = LookupIndex::build(vec![entity("A", Some("B")), entity("B", None)]);
        assert_eq!(index.resolve("B"), Verdict::Keep);
    }

    #[test]
    fn resolve_rewrites_known_legacy_id() {
        let index = LookupIndex::build(vec![entity("A", Some("old1"))]);
        assert_eq!(index.resolve("old1"), Verdict::Rewrite("A".to_string()));
    }

    #[test]
    fn resolve_drops_unknown_value() {
        let index = LookupIndex::build(vec![entity("A", Some("old1"))]);
        assert_eq!(index.resolve("ghost"), Verdict::Drop);
    }

    #[test]
    fn duplicate_legacy_ids_last_write_wins() {
        let index = LookupIndex::build(vec![entity("A", Some("old")), entity("B", Some("old"))]);
        assert_eq!(index.resolve("old"), Verdict::Rewrite("B".to_string()));
    }

    #[test]
    fn empty_legacy_id_is_not_indexed() {
        let index = LookupIndex::build(vec![entity("A", Some(""))]);
        assert_eq!(index.resolve(""), Verdict::Drop);
    }

    #[test]
    fn empty_index() {
        let index = LookupIndex::build(Vec::new());
        assert!(index.is_empty());
        assert_eq!(index.resolve("anything"), Verdict::Drop);
    }
}
