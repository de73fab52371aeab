//! Read-only reports over the store.

use miette::{Result, miette};
use serde_json::Value;

use rekey_store::DocumentStore;

use crate::migrate::CIGARS_COLLECTION;

/// Fields the cigar report checks for already-filled values.
const REPORTED_FIELDS: [&str; 3] = ["characteristics", "rating", "reviewsCount"];

fn is_filled(value: Option<&Value>) -> bool {
    match value {
        Some(Value::Array(items)) => !items.is_empty(),
        Some(Value::Number(n)) => n.as_f64() != Some(0.0),
        Some(Value::String(s)) => !s.is_empty(),
        Some(Value::Bool(b)) => *b,
        Some(Value::Object(map)) => !map.is_empty(),
        Some(Value::Null) | None => false,
    }
}

/// List cigars that already carry values in the reported fields.
///
/// Purely informational; prints document keys per field and writes nothing.
pub async fn run_cigar_fields_report(store: &dyn DocumentStore) -> Result<()> {
    let cigars = store
        .list_all(CIGARS_COLLECTION)
        .await
        .map_err(|e| miette!("{}", e))?;

    for field in REPORTED_FIELDS {
        println!("--- Searching for cigars with {field} field filled...");
        let matches: Vec<&str> = cigars
            .iter()
            .filter(|doc| is_filled(doc.get(field)))
            .map(|doc| doc.key.as_str())
            .collect();

        if matches.is_empty() {
            println!("No cigars found.");
            continue;
        }
        println!("Found {} cigars. Key list:", matches.len());
        for key in matches {
            println!("Cigar {key}");
        }
    }

    Ok(())
}
