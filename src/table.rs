use tracing::{debug, info};

use crate::format::{CellFormatter, PlainFormatter};
use crate::schema::{Column, ColumnSet, Row};
use crate::visibility::VisibilitySet;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TableState {
    /// Nothing has been loaded yet.
    Loading,
    /// The last load failed. Holds the message to show.
    Failed(String),
    /// Loaded, but there are no rows (or the rows have no fields).
    NoData,
    /// Rows exist, the user has hidden every column.
    NoColumnsSelected,
    Ready,
}

/// Consistent read of the store for one render pass.
pub struct TableSnapshot<'a> {
    pub state: TableState,
    pub columns: Vec<&'a Column>,
    pub rows: &'a [Row],
    pub total_columns: usize,
}

/// Reactive store behind one displayed table.
///
/// New data goes through [`TableStore::on_data_changed`], which infers the
/// columns and reconciles the visible set in one step. User commands only touch
/// the visible set.
pub struct TableStore {
    rows: Vec<Row>,
    columns: ColumnSet,
    visibility: Option<VisibilitySet>,
    formatter: Box<dyn CellFormatter>,
    error: Option<String>,
    loaded: bool,
}

impl Default for TableStore {
    fn default() -> Self {
        TableStore::with_formatter(Box::new(PlainFormatter))
    }
}

impl TableStore {
    pub fn with_formatter(formatter: Box<dyn CellFormatter>) -> Self {
        TableStore {
            rows: Vec::new(),
            columns: ColumnSet::default(),
            visibility: None,
            formatter,
            error: None,
            loaded: false,
        }
    }

    pub fn on_data_changed(&mut self, rows: Vec<Row>) {
        let schema_changed = self.columns.update(&rows);
        match self.visibility.as_mut() {
            None => {
                self.visibility = Some(VisibilitySet::initialize(self.columns.columns()));
            }
            Some(visibility) => visibility.reconcile(self.columns.columns()),
        }
        info!(
            "Loaded {} rows with {} columns (schema changed: {schema_changed})",
            rows.len(),
            self.columns.len()
        );
        self.rows = rows;
        self.error = None;
        self.loaded = true;
    }

    /// Keep the last rows and columns around, but report the failure.
    pub fn on_fetch_failed(&mut self, reason: impl Into<String>) {
        let reason = reason.into();
        debug!("Fetch failed: {reason}");
        self.error = Some(reason);
    }

    pub fn toggle(&mut self, key: &str) -> bool {
        match self.visibility.as_mut() {
            Some(visibility) => visibility.toggle(key, self.columns.columns()),
            None => false,
        }
    }

    pub fn show_all(&mut self) {
        if let Some(visibility) = self.visibility.as_mut() {
            visibility.show_all(self.columns.columns());
        }
    }

    pub fn hide_all(&mut self) {
        if let Some(visibility) = self.visibility.as_mut() {
            visibility.hide_all();
        }
    }

    pub fn is_visible(&self, key: &str) -> bool {
        self.visibility.as_ref().is_some_and(|v| v.contains(key))
    }

    pub fn columns(&self) -> &[Column] {
        self.columns.columns()
    }

    pub fn visible_keys(&self) -> &[String] {
        match &self.visibility {
            Some(visibility) => visibility.keys(),
            None => &[],
        }
    }

    pub fn visible_columns(&self) -> Vec<&Column> {
        match &self.visibility {
            Some(visibility) => visibility.visible_columns(self.columns.columns()),
            None => Vec::new(),
        }
    }

    pub fn rows(&self) -> &[Row] {
        &self.rows
    }

    pub fn state(&self) -> TableState {
        if let Some(error) = &self.error {
            TableState::Failed(error.clone())
        } else if !self.loaded {
            TableState::Loading
        } else if self.rows.is_empty() || self.columns.is_empty() {
            TableState::NoData
        } else if self.visible_keys().is_empty() {
            TableState::NoColumnsSelected
        } else {
            TableState::Ready
        }
    }

    pub fn snapshot(&self) -> TableSnapshot<'_> {
        TableSnapshot {
            state: self.state(),
            columns: self.visible_columns(),
            rows: &self.rows,
            total_columns: self.columns.len(),
        }
    }

    pub fn cell(&self, row: &Row, key: &str) -> String {
        self.formatter.format(key, row.get(key))
    }

    /// Formatted cells of one row for the visible columns.
    pub fn visible_cells(&self, row_idx: usize) -> Vec<String> {
        match self.rows.get(row_idx) {
            Some(row) => self
                .visible_columns()
                .iter()
                .map(|c| self.cell(row, &c.key))
                .collect(),
            None => Vec::new(),
        }
    }
}
