//! Denormalization-fill pass over embedded mention sub-records.
//!
//! A mention is an element of a document's mentions array wrapping a
//! sub-record that references a canonical record by key. Mentions whose
//! designated required property is falsy get the designated fields copied in
//! from the canonical record, with documented defaults when the record or a
//! field is missing.

use std::collections::{BTreeSet, HashMap};

use serde_json::{Map, Value};

/// One field copied from the canonical record into the mention.
#[derive(Debug, Clone)]
pub struct CopyField {
    /// Property name on the rewritten mention.
    pub target: String,
    /// Dotted path into the canonical record's fields.
    pub source: String,
    /// Value used when the canonical record or the source field is missing.
    pub default: Value,
}

impl CopyField {
    pub fn new(target: impl Into<String>, source: impl Into<String>, default: Value) -> Self {
        Self {
            target: target.into(),
            source: source.into(),
            default,
        }
    }
}

/// Shape of a fill pass: which mentions are eligible and what gets copied.
#[derive(Debug, Clone)]
pub struct FillRule {
    /// Property wrapping the sub-record (`"cigarMention"`).
    pub wrapper: String,
    /// Property inside the wrapper naming the canonical record's key.
    pub reference_property: String,
    /// A mention needs fill iff this wrapper property is falsy or absent.
    pub required_property: String,
    /// Wrapper properties carried over verbatim from the old mention.
    pub carried: Vec<String>,
    /// Fields copied from the canonical record, with defaults.
    pub copied: Vec<CopyField>,
    /// Fixed values always stamped onto a rewritten mention.
    pub fixed: Map<String, Value>,
}

/// JavaScript-style falsy check: the original tool gated enrichment on
/// `!mention.brand`, so empty strings, zero, and false all count as missing.
fn is_falsy(value: Option<&Value>) -> bool {
    match value {
        None | Some(Value::Null) => true,
        Some(Value::Bool(b)) => !b,
        Some(Value::String(s)) => s.is_empty(),
        Some(Value::Number(n)) => n.as_f64() == Some(0.0),
        Some(_) => false,
    }
}

/// Dotted-path lookup into a canonical record's fields.
fn get_path<'a>(fields: &'a Map<String, Value>, path: &str) -> Option<&'a Value> {
    let mut current: Option<&Value> = None;
    for segment in path.split('.') {
        current = match current {
            None => fields.get(segment),
            Some(Value::Object(map)) => map.get(segment),
            Some(_) => return None,
        };
        current?;
    }
    current
}

fn wrapper<'a>(mention: &'a Value, rule: &FillRule) -> Option<&'a Map<String, Value>> {
    mention.get(&rule.wrapper)?.as_object()
}

/// Whether a mention is eligible for the fill pass.
pub fn needs_fill(mention: &Value, rule: &FillRule) -> bool {
    wrapper(mention, rule).is_some_and(|w| is_falsy(w.get(&rule.required_property)))
}

/// Distinct canonical keys referenced by mentions needing fill.
///
/// Ordered so batched lookups are deterministic.
pub fn collect_fill_keys(mentions: &[Value], rule: &FillRule) -> BTreeSet<String> {
    mentions
        .iter()
        .filter(|m| needs_fill(m, rule))
        .filter_map(|m| wrapper(m, rule))
        .filter_map(|w| w.get(&rule.reference_property))
        .filter_map(Value::as_str)
        .map(str::to_string)
        .collect()
}

/// Rewrite eligible mentions from the canonical-record map.
///
/// Returns the full rewritten mentions array (unchanged mentions pass
/// through verbatim) when at least one mention changed, `None` otherwise.
/// `extra` carries per-document values stamped onto every rewritten mention,
/// e.g. `smokedAt` taken from the owning session's `createdAt`.
pub fn fill_mentions(
    mentions: &[Value],
    rule: &FillRule,
    canon: &HashMap<String, Map<String, Value>>,
    extra: &Map<String, Value>,
) -> Option<Vec<Value>> {
    let mut changed = false;
    let new_mentions: Vec<Value> = mentions
        .iter()
        .map(|mention| {
            let Some(old) = wrapper(mention, rule) else {
                return mention.clone();
            };
            if !is_falsy(old.get(&rule.required_property)) {
                return mention.clone();
            }

            let record = old
                .get(&rule.reference_property)
                .and_then(Value::as_str)
                .and_then(|key| canon.get(key));

            let mut filled = Map::new();
            for prop in &rule.carried {
                if let Some(value) = old.get(prop) {
                    filled.insert(prop.clone(), value.clone());
                }
            }
            for copy in &rule.copied {
                let value = record
                    .and_then(|fields| get_path(fields, &copy.source))
                    .filter(|v| !is_falsy(Some(v)))
                    .cloned()
                    .unwrap_or_else(|| copy.default.clone());
                filled.insert(copy.target.clone(), value);
            }
            for (prop, value) in &rule.fixed {
                filled.insert(prop.clone(), value.clone());
            }
            for (prop, value) in extra {
                filled.insert(prop.clone(), value.clone());
            }

            let mut new_mention = Map::new();
            new_mention.insert(rule.wrapper.clone(), Value::Object(filled));
            let new_mention = Value::Object(new_mention);
            if &new_mention != mention {
                changed = true;
            }
            new_mention
        })
        .collect();

    changed.then_some(new_mentions)
}
