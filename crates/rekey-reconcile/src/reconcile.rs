//! Scalar, list, and object reference reconcilers.

use serde_json::Value;

use crate::index::LookupIndex;

/// What to do with a single reference value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Verdict {
    /// The value already names a canonical key.
    Keep,
    /// The value names a legacy id; replace it with the mapped key.
    Rewrite(String),
    /// The value names nothing we know about; remove it.
    Drop,
}

/// Identifies the field being reconciled, for diagnostics.
#[derive(Debug, Clone, Copy)]
pub struct FieldSite<'a> {
    /// Key of the owning document.
    pub document: &'a str,
    /// Field name, dotted for nested fields (`"admins.list"`).
    pub field: &'a str,
}

impl<'a> FieldSite<'a> {
    pub fn new(document: &'a str, field: &'a str) -> Self {
        Self { document, field }
    }
}

/// What happened to one reference value that was not kept.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DiagnosticAction {
    Rewrote { new: String },
    Dropped,
}

/// A record of a non-keep outcome, one per affected reference value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Diagnostic {
    pub document: String,
    pub field: String,
    pub old: String,
    pub action: DiagnosticAction,
}

impl Diagnostic {
    fn new(site: FieldSite<'_>, old: &str, action: DiagnosticAction) -> Self {
        Self {
            document: site.document.to_string(),
            field: site.field.to_string(),
            old: old.to_string(),
            action,
        }
    }
}

impl std::fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.action {
            DiagnosticAction::Rewrote { new } => write!(
                f,
                "{}: updated {} from {} to {}",
                self.document, self.field, self.old, new
            ),
            DiagnosticAction::Dropped => write!(
                f,
                "{}: removed {} {} as it was not found",
                self.document, self.field, self.old
            ),
        }
    }
}

/// Result of reconciling a scalar reference field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScalarOutcome {
    /// The corrected value; `None` means the field should be nulled out.
    pub value: Option<String>,
    pub changed: bool,
    pub diagnostics: Vec<Diagnostic>,
}

/// Reconcile a single scalar reference against the index.
///
/// An absent or empty value is a no-op, not a change: an empty string never
/// held a real reference, so there is nothing to repair.
pub fn reconcile_scalar(
    site: FieldSite<'_>,
    value: Option<&str>,
    index: &LookupIndex,
) -> ScalarOutcome {
    let Some(value) = value.filter(|v| !v.is_empty()) else {
        return ScalarOutcome {
            value: value.map(str::to_string),
            changed: false,
            diagnostics: Vec::new(),
        };
    };

    match index.resolve(value) {
        Verdict::Keep => ScalarOutcome {
            value: Some(value.to_string()),
            changed: false,
            diagnostics: Vec::new(),
        },
        Verdict::Rewrite(key) => ScalarOutcome {
            diagnostics: vec![Diagnostic::new(
                site,
                value,
                DiagnosticAction::Rewrote { new: key.clone() },
            )],
            value: Some(key),
            changed: true,
        },
        Verdict::Drop => ScalarOutcome {
            value: None,
            changed: true,
            diagnostics: vec![Diagnostic::new(site, value, DiagnosticAction::Dropped)],
        },
    }
}

/// Result of reconciling a list reference field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListOutcome {
    /// Corrected list: dropped entries omitted, order otherwise preserved.
    pub list: Vec<String>,
    /// New list length. The paired count field must always match this.
    pub count: usize,
    pub changed: bool,
    pub diagnostics: Vec<Diagnostic>,
}

/// Reconcile an ordered list of references against the index.
pub fn reconcile_list(site: FieldSite<'_>, values: &[String], index: &LookupIndex) -> ListOutcome {
    let mut list = Vec::with_capacity(values.len());
    let mut changed = false;
    let mut diagnostics = Vec::new();

    for value in values {
        match index.resolve(value) {
            Verdict::Keep => list.push(value.clone()),
            Verdict::Rewrite(key) => {
                diagnostics.push(Diagnostic::new(
                    site,
                    value,
                    DiagnosticAction::Rewrote { new: key.clone() },
                ));
                list.push(key);
                changed = true;
            }
            Verdict::Drop => {
                diagnostics.push(Diagnostic::new(site, value, DiagnosticAction::Dropped));
                changed = true;
            }
        }
    }

    ListOutcome {
        count: list.len(),
        list,
        changed,
        diagnostics,
    }
}

/// Result of reconciling an embedded object reference.
#[derive(Debug, Clone, PartialEq)]
pub struct ObjectOutcome {
    /// The corrected object; `None` means the whole field should be nulled.
    pub value: Option<Value>,
    pub changed: bool,
    pub diagnostics: Vec<Diagnostic>,
}

/// Reconcile a reference held at a named property of an embedded object.
///
/// On rewrite, only that property is replaced; everything else in the object
/// passes through. On drop, the entire object field is nulled, matching the
/// scalar drop policy applied at the object level. An absent object or a
/// missing, empty, or non-string id property is a no-op.
pub fn reconcile_object(
    site: FieldSite<'_>,
    object: Option<&Value>,
    id_property: &str,
    index: &LookupIndex,
) -> ObjectOutcome {
    let unchanged = ObjectOutcome {
        value: object.cloned(),
        changed: false,
        diagnostics: Vec::new(),
    };

    let Some(Value::Object(map)) = object else {
        return unchanged;
    };
    let Some(Value::String(id)) = map.get(id_property) else {
        return unchanged;
    };
    if id.is_empty() {
        return unchanged;
    }

    match index.resolve(id) {
        Verdict::Keep => unchanged,
        Verdict::Rewrite(key) => {
            let mut updated = map.clone();
            updated.insert(id_property.to_string(), Value::String(key.clone()));
            ObjectOutcome {
                diagnostics: vec![Diagnostic::new(
                    site,
                    id,
                    DiagnosticAction::Rewrote { new: key },
                )],
                value: Some(Value::Object(updated)),
                changed: true,
            }
        }
        Verdict::Drop => ObjectOutcome {
            value: None,
            changed: true,
            diagnostics: vec![Diagnostic::new(site, id, DiagnosticAction::Dropped)],
        },
    }
}
