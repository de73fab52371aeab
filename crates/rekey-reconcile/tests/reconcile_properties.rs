//! Property-based tests for the reconciliation engine.

use proptest::prelude::*;
use rekey_reconcile::{EntityRecord, FieldSite, LookupIndex, Verdict, reconcile_list};

// Strategy for generating identifier-shaped strings
fn identifier() -> impl Strategy<Value = String> {
    "[a-z][a-z0-9]{0,15}".prop_map(|s| s.to_string())
}

// Strategy for a small entity set with optional legacy ids
fn entities() -> impl Strategy<Value = Vec<EntityRecord>> {
    prop::collection::vec(
        (identifier(), prop::option::of(identifier())),
        0..20,
    )
    .prop_map(|pairs| {
        pairs
            .into_iter()
            .map(|(key, legacy)| EntityRecord::new(key, legacy))
            .collect()
    })
}

fn site() -> FieldSite<'static> {
    FieldSite::new("doc", "refs")
}

proptest! {
    // Resolution is total and consistent with the index contents.
    #[test]
    fn resolve_verdicts_are_consistent(ents in entities(), value in identifier()) {
        let keys: std::collections::HashSet<String> =
            ents.iter().map(|e| e.key.clone()).collect();
        let index = LookupIndex::build(ents.clone());

        match index.resolve(&value) {
            Verdict::Keep => prop_assert!(keys.contains(&value)),
            Verdict::Rewrite(key) => {
                prop_assert!(!keys.contains(&value));
                prop_assert!(keys.contains(&key));
                // The mapping comes from the last entity carrying this legacy id.
                let expected = ents
                    .iter()
                    .rev()
                    .find(|e| e.legacy_id.as_deref() == Some(value.as_str()))
                    .map(|e| e.key.clone());
                prop_assert_eq!(Some(key), expected);
            }
            Verdict::Drop => {
                prop_assert!(!keys.contains(&value));
                let known_legacy = ents.iter().any(|e| {
                    e.legacy_id.as_deref() == Some(value.as_str()) && keys.contains(&e.key)
                });
                prop_assert!(!known_legacy);
            }
        }
    }

    // Reconciling never grows a list, and count always matches length.
    #[test]
    fn list_never_grows_and_count_matches(
        ents in entities(),
        values in prop::collection::vec(identifier(), 0..30),
    ) {
        let index = LookupIndex::build(ents);
        let outcome = reconcile_list(site(), &values, &index);

        prop_assert!(outcome.list.len() <= values.len());
        prop_assert_eq!(outcome.count, outcome.list.len());
    }

    // Every element of the output is a valid canonical key.
    #[test]
    fn list_output_is_fully_canonical(
        ents in entities(),
        values in prop::collection::vec(identifier(), 0..30),
    ) {
        let index = LookupIndex::build(ents);
        let outcome = reconcile_list(site(), &values, &index);

        for v in &outcome.list {
            prop_assert!(index.is_valid_key(v));
        }
    }

    // Reconciling an already-reconciled list is a no-op.
    #[test]
    fn list_reconciliation_is_idempotent(
        ents in entities(),
        values in prop::collection::vec(identifier(), 0..30),
    ) {
        let index = LookupIndex::build(ents);
        let first = reconcile_list(site(), &values, &index);
        let second = reconcile_list(site(), &first.list, &index);

        prop_assert!(!second.changed);
        prop_assert_eq!(second.list, first.list);
        prop_assert!(second.diagnostics.is_empty());
    }

    // Kept/rewritten elements preserve their relative order.
    #[test]
    fn list_preserves_relative_order(
        ents in entities(),
        values in prop::collection::vec(identifier(), 0..30),
    ) {
        let index = LookupIndex::build(ents);
        let outcome = reconcile_list(site(), &values, &index);

        // Rebuild the expected output by applying the verdict per element.
        let expected: Vec<String> = values
            .iter()
            .filter_map(|v| match index.resolve(v) {
                Verdict::Keep => Some(v.clone()),
                Verdict::Rewrite(key) => Some(key),
                Verdict::Drop => None,
            })
            .collect();
        prop_assert_eq!(outcome.list, expected);
    }

    // changed is true iff the output differs from the input.
    #[test]
    fn changed_flag_tracks_actual_difference(
        ents in entities(),
        values in prop::collection::vec(identifier(), 0..30),
    ) {
        let index = LookupIndex::build(ents);
        let outcome = reconcile_list(site(), &values, &index);

        prop_assert_eq!(outcome.changed, outcome.list != values);
        prop_assert_eq!(outcome.changed, !outcome.diagnostics.is_empty());
    }
}
