use ratatui::{
    Frame,
    layout::{Alignment, Constraint, Flex, Layout, Rect},
    style::{Color, Modifier, Style, Stylize},
    text::{Line, Span, Text},
    widgets::{Block, Cell, Clear, List, ListItem, ListState, Paragraph, Row, Table, Wrap},
};

use crate::domain::TVConfig;
use crate::model::{ChooserView, InputView, Model, UIData};
use crate::table::TableState;

pub const TITLE_HEIGHT: usize = 2;
pub const TABLE_HEADER_HEIGHT: usize = 1;
pub const FOOTER_HEIGHT: usize = 1;
pub const STATUSLINE_HEIGHT: usize = 1;
pub const COLUMN_SPACING: usize = 1;

#[derive(Debug)]
pub struct TableUI {
    header_style: Style,
    selected_row_style: Style,
    selected_cell_style: Style,
}

impl TableUI {
    pub fn new(_cfg: &TVConfig) -> Self {
        Self {
            header_style: Style::new().bold().fg(Color::Yellow),
            selected_row_style: Style::new().bg(Color::DarkGray),
            selected_cell_style: Style::new().add_modifier(Modifier::REVERSED),
        }
    }

    pub fn draw(&mut self, model: &Model, frame: &mut Frame) {
        let uidata = model.get_uidata();
        let [title_area, table_area, footer_area, status_area] = Layout::vertical([
            Constraint::Length(TITLE_HEIGHT as u16),
            Constraint::Min(0),
            Constraint::Length(FOOTER_HEIGHT as u16),
            Constraint::Length(STATUSLINE_HEIGHT as u16),
        ])
        .areas(frame.area());

        self.render_title(uidata, frame, title_area);
        match &uidata.state {
            TableState::Ready => {
                self.render_table(uidata, frame, table_area);
                self.render_footer(uidata, frame, footer_area);
            }
            state => self.render_placeholder(state, uidata.loading, frame, table_area),
        }
        self.render_statusline(uidata, frame, status_area);

        if let Some(chooser) = &uidata.chooser {
            self.render_chooser(chooser, frame);
        }
        if let Some(message) = &uidata.popup_message {
            self.render_popup(message, frame);
        }
    }

    fn render_title(&self, uidata: &UIData, frame: &mut Frame, area: Rect) {
        let text = Text::from(vec![
            Line::from(uidata.title.clone().bold()),
            Line::from(uidata.subtitle.clone().dark_gray()),
        ]);
        frame.render_widget(Paragraph::new(text), area);
        frame.render_widget(
            Paragraph::new(uidata.health.clone().dark_gray()).alignment(Alignment::Right),
            area,
        );
    }

    fn render_table(&self, uidata: &UIData, frame: &mut Frame, area: Rect) {
        let header = Row::new(
            uidata
                .table
                .iter()
                .map(|c| Cell::from(c.name.clone()))
                .collect::<Vec<Cell>>(),
        )
        .style(self.header_style);

        let nrows = uidata.table.first().map(|c| c.data.len()).unwrap_or(0);
        let rows = (0..nrows).map(|ridx| {
            let cells = uidata.table.iter().enumerate().map(|(cidx, column)| {
                let cell = Cell::from(column.data[ridx].clone());
                if ridx == uidata.selected_row && cidx == uidata.selected_column {
                    cell.style(self.selected_cell_style)
                } else {
                    cell
                }
            });
            let row = Row::new(cells.collect::<Vec<Cell>>());
            if ridx == uidata.selected_row {
                row.style(self.selected_row_style)
            } else {
                row
            }
        });

        let widths = uidata
            .table
            .iter()
            .map(|c| Constraint::Length(c.width as u16));

        let table = Table::new(rows, widths)
            .header(header)
            .column_spacing(COLUMN_SPACING as u16);
        frame.render_widget(table, area);
    }

    fn render_footer(&self, uidata: &UIData, frame: &mut Frame, area: Rect) {
        let mut spans = vec![Span::from(format!(
            "Showing {} {}",
            uidata.nrows,
            if uidata.nrows == 1 { "row" } else { "rows" }
        ))];
        if uidata.hidden_columns > 0 {
            spans.push(Span::from(format!(", {} hidden", uidata.hidden_columns)).dark_gray());
        }
        frame.render_widget(Paragraph::new(Line::from(spans)), area);
    }

    fn render_placeholder(&self, state: &TableState, loading: bool, frame: &mut Frame, area: Rect) {
        let lines = match state {
            _ if loading => vec![Line::from("Loading clients...".bold())],
            TableState::Loading => vec![Line::from("Waiting for data ...".bold())],
            TableState::Failed(message) => vec![
                Line::from("Error Loading Data".bold().red()),
                Line::from(message.clone()),
                Line::from(""),
                Line::from(vec!["Press ".into(), "<r>".blue().bold(), " to try again".into()]),
            ],
            TableState::NoData => vec![
                Line::from("No data available".bold()),
                Line::from("There are no clients in the database yet."),
            ],
            TableState::NoColumnsSelected => vec![
                Line::from("No columns selected".bold()),
                Line::from(vec![
                    "Press ".into(),
                    "<c>".blue().bold(),
                    " to choose columns or ".into(),
                    "<a>".blue().bold(),
                    " to show all".into(),
                ]),
            ],
            TableState::Ready => Vec::new(),
        };

        let [centered] = Layout::vertical([Constraint::Length(lines.len() as u16)])
            .flex(Flex::Center)
            .areas(area);
        frame.render_widget(
            Paragraph::new(Text::from(lines)).alignment(Alignment::Center),
            centered,
        );
    }

    fn render_statusline(&self, uidata: &UIData, frame: &mut Frame, area: Rect) {
        if let Some(input) = &uidata.input {
            self.render_input(input, frame, area);
            return;
        }

        let [left, right] =
            Layout::horizontal([Constraint::Min(0), Constraint::Length(24)]).areas(area);
        frame.render_widget(
            Paragraph::new(uidata.status_message.clone().italic()),
            left,
        );
        let position = if uidata.nrows > 0 {
            format!("{}/{}  ?:help", uidata.abs_selected_row + 1, uidata.nrows)
        } else {
            "?:help".to_string()
        };
        frame.render_widget(
            Paragraph::new(position).alignment(Alignment::Right),
            right,
        );
    }

    fn render_input(&self, input: &InputView, frame: &mut Frame, area: Rect) {
        let line = Line::from(vec![
            input.prompt.clone().blue().bold(),
            Span::from(input.input.clone()),
        ]);
        frame.render_widget(Paragraph::new(line), area);
        let x = area.x + (input.prompt.chars().count() + input.cursor) as u16;
        frame.set_cursor_position((x.min(area.right().saturating_sub(1)), area.y));
    }

    fn render_chooser(&self, chooser: &ChooserView, frame: &mut Frame) {
        let area = popup_area(frame.area(), 50, 70);
        let items: Vec<ListItem> = chooser
            .entries
            .iter()
            .map(|entry| {
                let mark = if entry.visible { "[x] " } else { "[ ] " };
                ListItem::new(Line::from(vec![
                    Span::from(mark),
                    Span::from(entry.label.clone()),
                    Span::from(format!("  {}", entry.key)).dark_gray(),
                ]))
            })
            .collect();

        let block = Block::bordered()
            .title(Line::from(" Columns ".bold()).centered())
            .title_bottom(Line::from(" <Space> toggle  <a> all  <n> none  <Esc> close ").centered());
        let list = List::new(items)
            .block(block)
            .highlight_style(self.selected_cell_style);
        let mut state = ListState::default().with_selected(Some(chooser.selected));

        frame.render_widget(Clear, area);
        frame.render_stateful_widget(list, area, &mut state);
    }

    fn render_popup(&self, message: &str, frame: &mut Frame) {
        let area = popup_area(frame.area(), 60, 80);
        let block = Block::bordered()
            .title(Line::from(" Help ".bold()).centered())
            .title_bottom(Line::from(" <Esc> close ").centered());
        let paragraph = Paragraph::new(message.to_string())
            .block(block)
            .wrap(Wrap { trim: false });

        frame.render_widget(Clear, area);
        frame.render_widget(paragraph, area);
    }
}

fn popup_area(area: Rect, percent_x: u16, percent_y: u16) -> Rect {
    let [area] = Layout::vertical([Constraint::Percentage(percent_y)])
        .flex(Flex::Center)
        .areas(area);
    let [area] = Layout::horizontal([Constraint::Percentage(percent_x)])
        .flex(Flex::Center)
        .areas(area);
    area
}
