use arboard::Clipboard;
use ratatui::crossterm::event::KeyEvent;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{error, info, trace, warn};

use crate::domain::{HELP_TEXT, JTVError, Message, TVConfig};
use crate::fetcher::{Fetcher, Reply};
use crate::format::{fit_to_width, text_width, to_csv_field};
use crate::inputter::{InputOutcome, Inputter};
use crate::schema::Row;
use crate::source::{DataSource, Request};
use crate::table::{TableState, TableStore};
use crate::ui::{COLUMN_SPACING, FOOTER_HEIGHT, STATUSLINE_HEIGHT, TABLE_HEADER_HEIGHT, TITLE_HEIGHT};

#[derive(Debug, PartialEq)]
pub enum Status {
    Loading,
    Ready,
    Quitting,
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum Modus {
    Table,
    Columns,
    Popup,
    Input,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ColumnView {
    pub name: String,
    pub width: usize,
    pub data: Vec<String>,
}

#[derive(Debug, Default)]
struct TableView {
    curser_row: usize,      // Row inside the rendered window
    offset_row: usize,      // First data row of the window
    selected_column: usize, // Index into the visible columns
    offset_column: usize,   // First visible column that is rendered
}

impl TableView {
    fn abs_row(&self) -> usize {
        self.offset_row + self.curser_row
    }

    fn select_row(&mut self, row: usize, nrows: usize, height: usize) {
        if nrows == 0 {
            self.offset_row = 0;
            self.curser_row = 0;
            return;
        }
        let row = std::cmp::min(row, nrows - 1);
        let height = std::cmp::max(height, 1);
        if row < self.offset_row {
            self.offset_row = row;
        } else if row >= self.offset_row + height {
            self.offset_row = row + 1 - height;
        }
        self.curser_row = row - self.offset_row;
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ChooserEntry {
    pub key: String,
    pub label: String,
    pub visible: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ChooserView {
    pub entries: Vec<ChooserEntry>,
    pub selected: usize,
}

#[derive(Debug, Clone, PartialEq)]
pub struct InputView {
    pub prompt: String,
    pub input: String,
    pub cursor: usize,
}

#[derive(Default, Clone, Debug, PartialEq)]
pub struct UILayout {
    pub width: usize,
    pub height: usize,
    pub table_width: usize,
    pub table_height: usize,
}

impl UILayout {
    pub fn from_values(ui_width: usize, ui_height: usize) -> Self {
        let chrome = TITLE_HEIGHT + TABLE_HEADER_HEIGHT + FOOTER_HEIGHT + STATUSLINE_HEIGHT;
        let layout = UILayout {
            width: ui_width,
            height: ui_height,
            table_width: ui_width,
            table_height: ui_height.saturating_sub(chrome),
        };
        trace!("Build UILayout: {:?}", layout);
        layout
    }
}

/// Everything the ui needs to draw one frame.
#[derive(Debug, Clone)]
pub struct UIData {
    pub title: String,
    pub subtitle: String,
    pub health: String,
    pub state: TableState,
    pub loading: bool,
    pub table: Vec<ColumnView>,
    pub nrows: usize,
    pub selected_row: usize,
    pub selected_column: usize,
    pub abs_selected_row: usize,
    pub hidden_columns: usize,
    pub chooser: Option<ChooserView>,
    pub input: Option<InputView>,
    pub popup_message: Option<String>,
    pub status_message: String,
}

impl UIData {
    fn empty() -> Self {
        UIData {
            title: String::new(),
            subtitle: String::new(),
            health: String::new(),
            state: TableState::Loading,
            loading: false,
            table: Vec::new(),
            nrows: 0,
            selected_row: 0,
            selected_column: 0,
            abs_selected_row: 0,
            hidden_columns: 0,
            chooser: None,
            input: None,
            popup_message: None,
            status_message: String::new(),
        }
    }
}

/// Fit columns of the given widths into `table_width`, starting at `offset`.
///
/// Returns `(index, render_width)` pairs. The last column may be cut to the
/// remaining width.
pub fn fit_columns(widths: &[usize], offset: usize, table_width: usize) -> Vec<(usize, usize)> {
    let mut fitted = Vec::new();
    let mut used = 0;
    for (idx, &width) in widths.iter().enumerate().skip(offset) {
        if used + width + COLUMN_SPACING <= table_width {
            fitted.push((idx, width));
            used += width + COLUMN_SPACING;
        } else {
            // Add the last partial visible column
            if used < table_width {
                fitted.push((idx, table_width - used));
            }
            break;
        }
    }
    fitted
}

pub struct Model {
    config: TVConfig,
    pub status: Status,
    modus: Modus,
    previous_modus: Modus,
    store: TableStore,
    fetcher: Fetcher,
    current_request: Request,
    request_started: Instant,
    column_widths: HashMap<String, usize>,
    table: TableView,
    chooser_row: usize,
    uilayout: UILayout,
    uidata: UIData,
    clipboard: Option<Clipboard>,
    input: Inputter,
    health: String,
    status_message: String,
}

impl Model {
    pub fn init(
        config: &TVConfig,
        source: Arc<dyn DataSource>,
        request: Request,
        ui_width: usize,
        ui_height: usize,
    ) -> Result<Self, JTVError> {
        let uilayout = UILayout::from_values(ui_width, ui_height);
        let mut model = Self {
            config: config.clone(),
            status: Status::Ready,
            modus: Modus::Table,
            previous_modus: Modus::Table,
            store: TableStore::default(),
            fetcher: Fetcher::new(source),
            current_request: request.clone(),
            request_started: Instant::now(),
            column_widths: HashMap::new(),
            table: TableView::default(),
            chooser_row: 0,
            uidata: UIData::empty(),
            uilayout,
            clipboard: None,
            input: Inputter::default(),
            health: String::new(),
            status_message: "Started jtv!".to_string(),
        };
        model.fetcher.check_health();
        model.load(request);
        Ok(model)
    }

    pub fn get_uidata(&self) -> &UIData {
        &self.uidata
    }

    pub fn raw_keyevents(&self) -> bool {
        self.modus == Modus::Input
    }

    pub fn quit(&mut self) {
        self.status = Status::Quitting;
    }

    pub fn update(&mut self, message: Option<Message>) -> Result<(), JTVError> {
        while let Some(reply) = self.fetcher.poll(Duration::ZERO) {
            self.handle_reply(reply);
        }

        if let Some(msg) = message {
            match self.modus {
                Modus::Table => match msg {
                    Message::Quit => self.quit(),
                    Message::MoveDown => self.move_table_selection_down(1),
                    Message::MoveUp => self.move_table_selection_up(1),
                    Message::MoveLeft => self.move_table_selection_left(),
                    Message::MoveRight => self.move_table_selection_right(),
                    Message::MovePageDown => {
                        self.move_table_selection_down(self.uilayout.table_height)
                    }
                    Message::MovePageUp => self.move_table_selection_up(self.uilayout.table_height),
                    Message::MoveBeginning => self.move_table_selection_beginning(),
                    Message::MoveEnd => self.move_table_selection_end(),
                    Message::Refresh => self.load(self.current_request.clone()),
                    Message::HideColumn => self.hide_selected_column(),
                    Message::ChooseColumns => self.enter_modus(Modus::Columns),
                    Message::ShowAllColumns => self.store.show_all(),
                    Message::HideAllColumns => self.store.hide_all(),
                    Message::FetchById => {
                        self.input.start("Client id: ");
                        self.enter_modus(Modus::Input);
                    }
                    Message::CopyCell => self.copy_table_cell(),
                    Message::CopyRow => self.copy_table_row(),
                    Message::Help => self.enter_modus(Modus::Popup),
                    Message::Exit => self.exit(),
                    Message::Resize(width, height) => self.ui_resize(width, height),
                    _ => (),
                },
                Modus::Columns => match msg {
                    Message::Quit => self.quit(),
                    Message::MoveDown => self.move_chooser_selection(1),
                    Message::MoveUp => self.move_chooser_selection(-1),
                    Message::ToggleColumn => self.toggle_chooser_column(),
                    Message::ShowAllColumns => self.store.show_all(),
                    Message::HideAllColumns => self.store.hide_all(),
                    Message::Refresh => self.load(self.current_request.clone()),
                    Message::ChooseColumns | Message::Exit => self.exit(),
                    Message::Help => self.enter_modus(Modus::Popup),
                    Message::Resize(width, height) => self.ui_resize(width, height),
                    _ => (),
                },
                Modus::Popup => match msg {
                    Message::Quit => self.quit(),
                    Message::Resize(width, height) => self.ui_resize(width, height),
                    Message::Exit | Message::Help => self.exit(),
                    _ => (),
                },
                Modus::Input => {
                    if let Message::RawKey(key) = msg {
                        self.raw_input(key)
                    } else if let Message::Resize(width, height) = msg {
                        self.ui_resize(width, height)
                    }
                }
            }
        }

        self.update_table_data();
        Ok(())
    }

    // -------------------- Data handling functions ---------------------- //

    fn load(&mut self, request: Request) {
        let sequence = self.fetcher.request(request.clone());
        info!("Loading {request:?} (request #{sequence})");
        self.current_request = request;
        self.request_started = Instant::now();
        self.status = Status::Loading;
        self.set_status_message("Loading ...");
    }

    fn handle_reply(&mut self, reply: Reply) {
        match reply {
            Reply::Rows {
                request, result, ..
            } => {
                if self.status != Status::Quitting {
                    self.status = Status::Ready;
                }
                let duration = self.request_started.elapsed().as_millis();
                match result {
                    Ok(rows) => {
                        let nrows = rows.len();
                        self.compute_column_widths(&rows);
                        self.store.on_data_changed(rows);
                        self.table.select_row(0, nrows, self.uilayout.table_height);
                        self.set_status_message(format!(
                            "Loaded {nrows} {} in {duration}ms",
                            if nrows == 1 { "row" } else { "rows" }
                        ));
                    }
                    Err(e) => {
                        error!("Error fetching {request:?}: {e}");
                        self.store.on_fetch_failed(e.to_string());
                        self.set_status_message("Failed to fetch clients");
                    }
                }
            }
            Reply::Health(Ok(health)) => self.health = health.describe(),
            Reply::Health(Err(e)) => {
                warn!("Health check failed: {e}");
                self.health = "API unreachable".to_string();
            }
        }
    }

    fn compute_column_widths(&mut self, rows: &[Row]) {
        self.column_widths.clear();
        let Some(first) = rows.first() else {
            return;
        };
        for key in first.keys() {
            let label_width = text_width(&crate::schema::derive_label(key));
            let max_width = rows
                .iter()
                .map(|row| text_width(&self.store.cell(row, key)))
                .max()
                .unwrap_or(0);
            let width = std::cmp::max(label_width, max_width);
            self.column_widths
                .insert(key.clone(), std::cmp::min(width, self.config.max_column_width));
        }
    }

    fn update_table_data(&mut self) {
        self.chooser_row = std::cmp::min(
            self.chooser_row,
            self.store.columns().len().saturating_sub(1),
        );
        let snapshot = self.store.snapshot();
        let nrows = snapshot.rows.len();
        let height = self.uilayout.table_height;
        let table = &mut self.table;

        let widths: Vec<usize> = snapshot
            .columns
            .iter()
            .map(|c| self.column_widths.get(&c.key).copied().unwrap_or(0))
            .collect();

        // Keep the selected column on screen
        table.selected_column = std::cmp::min(table.selected_column, widths.len().saturating_sub(1));
        let fitted = loop {
            if table.selected_column < table.offset_column {
                table.offset_column = table.selected_column;
            }
            let fitted = fit_columns(&widths, table.offset_column, self.uilayout.table_width);
            if table.selected_column < table.offset_column + fitted.len()
                || table.offset_column >= table.selected_column
            {
                break fitted;
            }
            table.offset_column += 1;
        };
        table.select_row(table.abs_row(), nrows, height);

        let rbegin = table.offset_row;
        let rend = std::cmp::min(rbegin + height, nrows);

        let data: Vec<ColumnView> = fitted
            .iter()
            .map(|&(idx, width)| {
                let column = snapshot.columns[idx];
                ColumnView {
                    name: fit_to_width(&column.label, width),
                    width,
                    data: snapshot.rows[rbegin..rend]
                        .iter()
                        .map(|row| fit_to_width(&self.store.cell(row, &column.key), width))
                        .collect(),
                }
            })
            .collect();

        let chooser = (self.modus == Modus::Columns).then(|| ChooserView {
            entries: self
                .store
                .columns()
                .iter()
                .map(|c| ChooserEntry {
                    key: c.key.clone(),
                    label: c.label.clone(),
                    visible: self.store.is_visible(&c.key),
                })
                .collect(),
            selected: self.chooser_row,
        });

        let input = (self.modus == Modus::Input).then(|| InputView {
            prompt: self.input.prompt().to_string(),
            input: self.input.input().to_string(),
            cursor: self.input.cursor(),
        });

        let title = match &self.current_request {
            Request::AllClients => self.config.title.clone(),
            Request::Client(id) => format!("{} {}", self.config.title, id),
        };

        self.uidata = UIData {
            title,
            subtitle: format!(
                "{nrows} {} in database",
                if nrows == 1 { "client" } else { "clients" }
            ),
            health: self.health.clone(),
            state: snapshot.state,
            loading: self.fetcher.is_pending(),
            table: data,
            nrows,
            selected_row: table.curser_row,
            selected_column: table.selected_column - table.offset_column,
            abs_selected_row: table.abs_row(),
            hidden_columns: snapshot.total_columns - snapshot.columns.len(),
            chooser,
            input,
            popup_message: (self.modus == Modus::Popup).then(|| HELP_TEXT.to_string()),
            status_message: self.status_message.clone(),
        };
    }

    fn set_status_message(&mut self, message: impl Into<String>) {
        self.status_message = message.into();
    }

    fn ui_resize(&mut self, width: usize, height: usize) {
        trace!(
            "UI was resized! w:{}->{}, h:{}->{}",
            self.uilayout.width, width, self.uilayout.height, height
        );
        self.uilayout = UILayout::from_values(width, height);
    }

    // -------------------- Control handling functions ---------------------- //

    fn enter_modus(&mut self, modus: Modus) {
        trace!("Modus {:?} -> {:?}", self.modus, modus);
        self.previous_modus = self.modus;
        self.modus = modus;
    }

    fn exit(&mut self) {
        match self.modus {
            Modus::Table => {
                // Leaving a single client view goes back to the full list
                if let Request::Client(_) = self.current_request {
                    self.load(Request::AllClients);
                }
            }
            Modus::Columns | Modus::Input => {
                self.previous_modus = self.modus;
                self.modus = Modus::Table;
            }
            Modus::Popup => {
                self.modus = self.previous_modus;
                self.previous_modus = Modus::Popup;
            }
        }
    }

    fn raw_input(&mut self, key: KeyEvent) {
        match self.input.read(key) {
            InputOutcome::Editing => {}
            InputOutcome::Submitted(id) => {
                self.exit();
                self.load(Request::Client(id));
            }
            InputOutcome::Canceled => self.exit(),
        }
    }

    fn selected_key(&self) -> Option<String> {
        self.store
            .visible_columns()
            .get(self.table.selected_column)
            .map(|c| c.key.clone())
    }

    fn hide_selected_column(&mut self) {
        if let Some(key) = self.selected_key() {
            self.store.toggle(&key);
            self.set_status_message(format!("Column \"{key}\" hidden"));
        }
    }

    fn move_chooser_selection(&mut self, step: isize) {
        let ncolumns = self.store.columns().len();
        if ncolumns == 0 {
            return;
        }
        self.chooser_row = self
            .chooser_row
            .saturating_add_signed(step)
            .min(ncolumns - 1);
    }

    fn toggle_chooser_column(&mut self) {
        let key = self
            .store
            .columns()
            .get(self.chooser_row)
            .map(|c| c.key.clone());
        if let Some(key) = key {
            self.store.toggle(&key);
        }
    }

    fn copy_to_clipboard(&mut self, text: String) {
        if self.clipboard.is_none() {
            match Clipboard::new() {
                Ok(clipboard) => self.clipboard = Some(clipboard),
                Err(e) => {
                    warn!("Clipboard not available: {e:?}");
                    self.set_status_message("Clipboard not available");
                    return;
                }
            }
        }
        if let Some(clipboard) = self.clipboard.as_mut() {
            match clipboard.set_text(text) {
                Ok(_) => self.set_status_message("Copied to clipboard."),
                Err(e) => trace!("Error copying to clipboard: {:?}", e),
            }
        }
    }

    fn copy_table_cell(&mut self) {
        let cell = self
            .store
            .visible_cells(self.table.abs_row())
            .get(self.table.selected_column)
            .cloned();
        if let Some(cell) = cell {
            trace!("Cell content: {}", cell);
            self.copy_to_clipboard(cell);
        }
    }

    fn copy_table_row(&mut self) {
        let cells = self.store.visible_cells(self.table.abs_row());
        if !cells.is_empty() {
            let line = cells
                .iter()
                .map(|c| to_csv_field(c))
                .collect::<Vec<String>>()
                .join(",");
            self.copy_to_clipboard(line);
        }
    }

    fn nrows(&self) -> usize {
        self.store.rows().len()
    }

    fn move_table_selection_beginning(&mut self) {
        let nrows = self.nrows();
        self.table.select_row(0, nrows, self.uilayout.table_height);
    }

    fn move_table_selection_end(&mut self) {
        let nrows = self.nrows();
        self.table
            .select_row(nrows.saturating_sub(1), nrows, self.uilayout.table_height);
    }

    fn move_table_selection_up(&mut self, size: usize) {
        let nrows = self.nrows();
        let row = self.table.abs_row().saturating_sub(size);
        self.table.select_row(row, nrows, self.uilayout.table_height);
    }

    fn move_table_selection_down(&mut self, size: usize) {
        let nrows = self.nrows();
        let row = self.table.abs_row() + size;
        self.table.select_row(row, nrows, self.uilayout.table_height);
    }

    fn move_table_selection_left(&mut self) {
        self.table.selected_column = self.table.selected_column.saturating_sub(1);
    }

    fn move_table_selection_right(&mut self) {
        let ncolumns = self.store.visible_columns().len();
        if self.table.selected_column + 1 < ncolumns {
            self.table.selected_column += 1;
        }
    }
}
