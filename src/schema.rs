use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};

use serde_json::{Map, Value};
use tracing::{debug, trace};

/// One flat record as delivered by the API. Field order follows the JSON document.
pub type Row = Map<String, Value>;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Column {
    pub key: String,
    pub label: String,
}

impl Column {
    pub fn new(key: &str) -> Self {
        Column {
            key: key.to_string(),
            label: derive_label(key),
        }
    }
}

/// Derive the column list from the shape of the first row.
///
/// An empty row sequence yields no columns. Later rows are not inspected, so a
/// field that only appears further down the list never becomes a column.
pub fn infer_columns(rows: &[Row]) -> Vec<Column> {
    match rows.first() {
        Some(first) => first.keys().map(|key| Column::new(key)).collect(),
        None => Vec::new(),
    }
}

/// Turn a field name into a header label.
///
/// `id` and `ssn` are abbreviations and map to `ID` / `SSN`. Everything else
/// gets a space in front of each upper-case ASCII letter and a capitalized
/// first character, so `firstName` becomes `First Name`. Digits are not word
/// boundaries: `addressLine1` becomes `Address Line1`.
pub fn derive_label(key: &str) -> String {
    match key {
        "id" => return "ID".to_string(),
        "ssn" => return "SSN".to_string(),
        _ => {}
    }

    let mut spaced = String::with_capacity(key.len() + 4);
    for c in key.chars() {
        if c.is_ascii_uppercase() {
            spaced.push(' ');
        }
        spaced.push(c);
    }

    let mut chars = spaced.chars();
    let capitalized: String = match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    };
    capitalized.trim().to_string()
}

/// Structural hash over the ordered field names of the first row.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SchemaFingerprint(u64);

impl SchemaFingerprint {
    pub fn of(rows: &[Row]) -> Option<Self> {
        let first = rows.first()?;
        let mut hasher = DefaultHasher::new();
        first.len().hash(&mut hasher);
        for key in first.keys() {
            key.hash(&mut hasher);
        }
        Some(SchemaFingerprint(hasher.finish()))
    }
}

/// The inferred column list. Only data refreshes write to it.
#[derive(Debug, Default)]
pub struct ColumnSet {
    columns: Vec<Column>,
    fingerprint: Option<SchemaFingerprint>,
}

impl ColumnSet {
    /// Re-infer the columns for a new row sequence.
    ///
    /// Returns true if the column list changed. Inference is skipped when the
    /// field names are structurally identical to the previous load.
    pub fn update(&mut self, rows: &[Row]) -> bool {
        let fingerprint = SchemaFingerprint::of(rows);
        if fingerprint == self.fingerprint {
            trace!("Schema unchanged, reusing {} columns", self.columns.len());
            return false;
        }

        self.columns = infer_columns(rows);
        self.fingerprint = fingerprint;
        debug!(
            "Schema changed: [{}]",
            self.keys().collect::<Vec<&str>>().join(", ")
        );
        true
    }

    pub fn columns(&self) -> &[Column] {
        &self.columns
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.columns.iter().map(|c| c.key.as_str())
    }

    pub fn len(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn row(value: Value) -> Row {
        match value {
            Value::Object(map) => map,
            other => panic!("not an object: {other}"),
        }
    }

    #[test]
    fn no_rows_no_columns() {
        assert!(infer_columns(&[]).is_empty());
    }

    #[test]
    fn columns_follow_first_row_order() {
        let rows = vec![row(json!({"b": 2, "a": 1})), row(json!({"z": 0}))];
        let keys: Vec<String> = infer_columns(&rows).into_iter().map(|c| c.key).collect();
        assert_eq!(keys, vec!["b", "a"]);
    }

    #[test]
    fn first_row_is_authoritative() {
        let rows = vec![
            row(json!({"id": 1})),
            row(json!({"id": 2, "city": "Austin"})),
        ];
        assert_eq!(infer_columns(&rows), vec![Column::new("id")]);
    }

    #[test]
    fn labels() {
        assert_eq!(derive_label("id"), "ID");
        assert_eq!(derive_label("ssn"), "SSN");
        assert_eq!(derive_label("firstName"), "First Name");
        assert_eq!(derive_label("addressLine1"), "Address Line1");
        assert_eq!(derive_label("stateCode"), "State Code");
        assert_eq!(derive_label("zip"), "Zip");
    }

    #[test]
    fn label_edge_cases() {
        assert_eq!(derive_label(""), "");
        assert_eq!(derive_label("FirstName"), "First Name");
        assert_eq!(derive_label("userID"), "User I D");
        // Only the exact keys are special-cased.
        assert_eq!(derive_label("Id"), "Id");
    }

    #[test]
    fn fingerprint_tracks_names_and_order() {
        let a = vec![row(json!({"id": 1, "city": "x"}))];
        let b = vec![row(json!({"id": 7, "city": null}))];
        let c = vec![row(json!({"city": "x", "id": 1}))];
        assert_eq!(SchemaFingerprint::of(&a), SchemaFingerprint::of(&b));
        assert_ne!(SchemaFingerprint::of(&a), SchemaFingerprint::of(&c));
        assert_eq!(SchemaFingerprint::of(&[]), None);
        assert_ne!(SchemaFingerprint::of(&[Row::new()]), None);
    }

    #[test]
    fn column_set_skips_unchanged_schema() {
        let mut set = ColumnSet::default();
        assert!(set.update(&[row(json!({"id": 1, "ssn": "1"}))]));
        assert!(!set.update(&[row(json!({"id": 2, "ssn": "2"}))]));
        assert_eq!(set.keys().collect::<Vec<_>>(), vec!["id", "ssn"]);

        assert!(set.update(&[]));
        assert!(set.is_empty());
        assert_eq!(set.len(), 0);
    }
}
