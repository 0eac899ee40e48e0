use std::fmt;
use std::io::Error;
use std::time::Duration;

use derive_setters::Setters;
use ratatui::crossterm::event::KeyEvent;

pub const DEFAULT_API_URL: &str = "http://localhost:5000/api";

pub const HELP_TEXT: &str = "
Table
  q          Quit
  ←↓↑→ hjkl  Move cursor
  PgUp PgDn  Move one page
  g G        First / last row
  r          Refresh data
  x          Hide current column
  c          Choose columns
  a          Show all columns
  n          Hide all columns
  /          Load a single client by id
  y          Copy cell
  Y          Copy row (visible columns, CSV)
  ?          Help

Column chooser
  ↓↑ jk      Move
  Space      Show / hide column
  a n        Show all / hide all
  Esc        Close
";

#[derive(Debug)]
pub enum JTVError {
    IoError(Error),
    HttpError(reqwest::Error),
    JsonError(serde_json::Error),
    Upstream(String),
    FileNotFound,
    PermissionDenied,
    InvalidSource(String),
}

impl fmt::Display for JTVError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            JTVError::IoError(e) => write!(f, "I/O error: {e}"),
            JTVError::HttpError(e) => write!(f, "Unable to connect to server: {e}"),
            JTVError::JsonError(e) => write!(f, "Malformed response: {e}"),
            JTVError::Upstream(msg) => write!(f, "{msg}"),
            JTVError::FileNotFound => write!(f, "File not found"),
            JTVError::PermissionDenied => write!(f, "Permission denied"),
            JTVError::InvalidSource(msg) => write!(f, "Invalid data source: {msg}"),
        }
    }
}

impl std::error::Error for JTVError {}

impl From<Error> for JTVError {
    fn from(err: Error) -> Self {
        JTVError::IoError(err)
    }
}

impl From<reqwest::Error> for JTVError {
    fn from(err: reqwest::Error) -> Self {
        JTVError::HttpError(err)
    }
}

impl From<serde_json::Error> for JTVError {
    fn from(err: serde_json::Error) -> Self {
        JTVError::JsonError(err)
    }
}

#[derive(Debug, Clone, Setters)]
#[setters(prefix = "with_")]
pub struct TVConfig {
    pub title: String,
    pub event_poll_time: u64,
    pub max_column_width: usize,
    pub request_timeout: Duration,
}

impl Default for TVConfig {
    fn default() -> Self {
        TVConfig {
            title: "Clients".to_string(),
            event_poll_time: 100,
            max_column_width: 30,
            request_timeout: Duration::from_secs(10),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Message {
    Quit,
    MoveUp,
    MoveDown,
    MoveLeft,
    MoveRight,
    MovePageUp,
    MovePageDown,
    MoveBeginning,
    MoveEnd,
    Refresh,
    HideColumn,
    ChooseColumns,
    ShowAllColumns,
    HideAllColumns,
    ToggleColumn,
    FetchById,
    CopyCell,
    CopyRow,
    Help,
    Exit,
    Resize(usize, usize),
    RawKey(KeyEvent),
}
