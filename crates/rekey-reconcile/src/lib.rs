//! Pure reference-reconciliation engine for Rekey.
//!
//! This crate decides, for every reference a document holds, whether the
//! reference already names a canonical key (`keep`), names a legacy
//! identifier that maps to one (`rewrite`), or names nothing we know about
//! (`drop`). It never performs I/O: callers build a [`LookupIndex`] from a
//! full entity scan, run the reconcilers over in-memory documents, and act
//! on the outcomes and [`Diagnostic`]s themselves.

mod fill;
mod index;
mod reconcile;

pub use fill::{CopyField, FillRule, collect_fill_keys, fill_mentions, needs_fill};
pub use index::{EntityRecord, LookupIndex};
pub use reconcile::{
    Diagnostic, DiagnosticAction, FieldSite, ListOutcome, ObjectOutcome, ScalarOutcome, Verdict,
    reconcile_list, reconcile_object, reconcile_scalar,
};
