use tracing::{debug, trace};

use crate::schema::Column;

/// Reconcile a visible-key list against a new column list.
///
/// Keys that still exist keep their relative order, keys that disappeared are
/// dropped, and every column key that is not visible yet is appended in column
/// order. Applying it twice with the same columns yields the same result.
pub fn reconcile(columns: &[Column], visible_keys: &[String]) -> Vec<String> {
    let mut result: Vec<String> = visible_keys
        .iter()
        .filter(|key| columns.iter().any(|c| &c.key == *key))
        .cloned()
        .collect();

    for column in columns {
        if !result.contains(&column.key) {
            result.push(column.key.clone());
        }
    }
    result
}

/// The ordered set of column keys the user wants to see.
///
/// Always a subset of the keys of the columns it was last reconciled against.
/// Only user commands and [`VisibilitySet::reconcile`] write to it.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct VisibilitySet {
    keys: Vec<String>,
}

impl VisibilitySet {
    /// All columns visible, in column order.
    pub fn initialize(columns: &[Column]) -> Self {
        VisibilitySet {
            keys: columns.iter().map(|c| c.key.clone()).collect(),
        }
    }

    pub fn reconcile(&mut self, columns: &[Column]) {
        let keys = reconcile(columns, &self.keys);
        if keys != self.keys {
            debug!("Visible columns reconciled: {:?} -> {:?}", self.keys, keys);
        }
        self.keys = keys;
    }

    /// Hide a visible key, or append a hidden one.
    ///
    /// Keys that are not part of `columns` are ignored and leave the set
    /// untouched. Returns whether the set changed.
    pub fn toggle(&mut self, key: &str, columns: &[Column]) -> bool {
        if !columns.iter().any(|c| c.key == key) {
            debug!("Ignoring toggle of unknown column \"{key}\"");
            return false;
        }

        if let Some(pos) = self.keys.iter().position(|k| k == key) {
            self.keys.remove(pos);
            trace!("Hide column \"{key}\"");
        } else {
            self.keys.push(key.to_string());
            trace!("Show column \"{key}\"");
        }
        true
    }

    pub fn show_all(&mut self, columns: &[Column]) {
        self.keys = columns.iter().map(|c| c.key.clone()).collect();
    }

    pub fn hide_all(&mut self) {
        self.keys.clear();
    }

    pub fn contains(&self, key: &str) -> bool {
        self.keys.iter().any(|k| k == key)
    }

    pub fn keys(&self) -> &[String] {
        &self.keys
    }

    /// Columns to render. Ordered by the schema, not by toggle history.
    pub fn visible_columns<'a>(&self, columns: &'a [Column]) -> Vec<&'a Column> {
        columns.iter().filter(|c| self.contains(&c.key)).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn columns(keys: &[&str]) -> Vec<Column> {
        keys.iter().map(|k| Column::new(k)).collect()
    }

    fn keys(keys: &[&str]) -> Vec<String> {
        keys.iter().map(|k| k.to_string()).collect()
    }

    fn visible_keys(set: &VisibilitySet, cols: &[Column]) -> Vec<String> {
        set.visible_columns(cols)
            .into_iter()
            .map(|c| c.key.clone())
            .collect()
    }

    #[test]
    fn initialize_shows_everything() {
        let cols = columns(&["id", "firstName", "ssn"]);
        let set = VisibilitySet::initialize(&cols);
        assert_eq!(set.keys(), keys(&["id", "firstName", "ssn"]).as_slice());
    }

    #[test]
    fn reconcile_after_schema_drift() {
        let cols = columns(&["id", "firstName", "city"]);
        let result = reconcile(&cols, &keys(&["firstName"]));
        assert_eq!(result, keys(&["firstName", "id", "city"]));
    }

    #[test]
    fn reconcile_drops_missing_and_keeps_order() {
        let cols = columns(&["a", "b", "c", "d"]);
        let result = reconcile(&cols, &keys(&["c", "x", "a"]));
        assert_eq!(result, keys(&["c", "a", "b", "d"]));
    }

    #[test]
    fn reconcile_is_idempotent() {
        let cases: Vec<(Vec<Column>, Vec<String>)> = vec![
            (columns(&[]), keys(&[])),
            (columns(&[]), keys(&["a"])),
            (columns(&["a", "b"]), keys(&[])),
            (columns(&["a", "b", "c"]), keys(&["c", "a"])),
            (columns(&["id", "firstName", "city"]), keys(&["ssn", "firstName"])),
        ];
        for (cols, visible) in cases {
            let once = reconcile(&cols, &visible);
            let twice = reconcile(&cols, &once);
            assert_eq!(once, twice);
            assert!(once.iter().all(|k| cols.iter().any(|c| &c.key == k)));
        }
    }

    #[test]
    fn toggle_round_trip() {
        let cols = columns(&["id", "firstName", "ssn"]);
        let mut set = VisibilitySet {
            keys: keys(&["id", "firstName"]),
        };

        assert!(set.toggle("ssn", &cols));
        assert_eq!(set.keys(), keys(&["id", "firstName", "ssn"]).as_slice());
        assert!(set.toggle("ssn", &cols));
        assert_eq!(set.keys(), keys(&["id", "firstName"]).as_slice());
    }

    #[test]
    fn toggle_unknown_key_is_ignored() {
        let cols = columns(&["id"]);
        let mut set = VisibilitySet::initialize(&cols);
        assert!(!set.toggle("ssn", &cols));
        assert_eq!(set.keys(), keys(&["id"]).as_slice());
    }

    #[test]
    fn visible_columns_follow_schema_order() {
        let cols = columns(&["id", "firstName", "ssn"]);
        let mut set = VisibilitySet::initialize(&cols);
        set.toggle("id", &cols);
        set.toggle("id", &cols);
        assert_eq!(set.keys(), keys(&["firstName", "ssn", "id"]).as_slice());
        assert_eq!(visible_keys(&set, &cols), keys(&["id", "firstName", "ssn"]));
    }

    #[test]
    fn hide_all_and_show_all() {
        let cols = columns(&["id", "firstName"]);
        let mut set = VisibilitySet::initialize(&cols);
        set.hide_all();
        assert!(set.keys().is_empty());
        assert!(set.visible_columns(&cols).is_empty());

        set.show_all(&cols);
        assert_eq!(visible_keys(&set, &cols), keys(&["id", "firstName"]));
    }

    fn unique(keys: Vec<String>) -> Vec<String> {
        let mut seen = Vec::new();
        for key in keys {
            if !seen.contains(&key) {
                seen.push(key);
            }
        }
        seen
    }

    fn key_list(max: usize) -> impl Strategy<Value = Vec<String>> {
        prop::collection::vec("[a-g]", 0..max).prop_map(unique)
    }

    fn columns_of(keys: &[String]) -> Vec<Column> {
        keys.iter().map(|k| Column::new(k)).collect()
    }

    #[derive(Debug, Clone)]
    enum Command {
        Toggle(String),
        ShowAll,
        HideAll,
        Reconcile(Vec<String>),
    }

    fn command() -> impl Strategy<Value = Command> {
        prop_oneof![
            "[a-h]".prop_map(Command::Toggle),
            Just(Command::ShowAll),
            Just(Command::HideAll),
            key_list(7).prop_map(Command::Reconcile),
        ]
    }

    proptest! {
        #[test]
        fn reconcile_twice_equals_once(cols in key_list(7), visible in key_list(8)) {
            let cols = columns_of(&cols);
            let once = reconcile(&cols, &visible);
            let twice = reconcile(&cols, &once);
            prop_assert_eq!(twice, once);
        }

        #[test]
        fn reconcile_keeps_surviving_keys_first(cols in key_list(7), visible in key_list(8)) {
            let col_set = columns_of(&cols);
            let result = reconcile(&col_set, &visible);

            let surviving: Vec<String> =
                visible.iter().filter(|k| cols.contains(*k)).cloned().collect();
            prop_assert_eq!(&result[..surviving.len()], surviving.as_slice());

            // Everything else is appended in column order
            let appended: Vec<String> =
                cols.iter().filter(|k| !surviving.contains(*k)).cloned().collect();
            prop_assert_eq!(&result[surviving.len()..], appended.as_slice());
        }

        #[test]
        fn commands_keep_visible_keys_within_columns(
            initial in key_list(7),
            commands in prop::collection::vec(command(), 0..24),
        ) {
            let mut cols = columns_of(&initial);
            let mut set = VisibilitySet::initialize(&cols);

            for command in commands {
                let before = set.clone();
                match command {
                    Command::Toggle(key) => {
                        let known = cols.iter().any(|c| c.key == key);
                        prop_assert_eq!(set.toggle(&key, &cols), known);
                        if !known {
                            prop_assert_eq!(&set, &before);
                        }
                    }
                    Command::ShowAll => set.show_all(&cols),
                    Command::HideAll => set.hide_all(),
                    Command::Reconcile(keys) => {
                        cols = columns_of(&keys);
                        set.reconcile(&cols);
                    }
                }

                prop_assert!(set.keys().iter().all(|k| cols.iter().any(|c| &c.key == k)));
                prop_assert_eq!(unique(set.keys().to_vec()), set.keys().to_vec());

                // Rendering order is the column order
                let rendered: Vec<&str> =
                    set.visible_columns(&cols).into_iter().map(|c| c.key.as_str()).collect();
                let expected: Vec<&str> = cols
                    .iter()
                    .filter(|c| set.contains(&c.key))
                    .map(|c| c.key.as_str())
                    .collect();
                prop_assert_eq!(rendered, expected);
            }
        }
    }
}
