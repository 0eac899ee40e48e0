use ratatui::crossterm::event::{KeyCode, KeyEvent, KeyModifiers};
use tracing::trace;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InputOutcome {
    Editing,
    Submitted(String),
    Canceled,
}

/// Single line text input, used for the client id prompt.
#[derive(Debug, Default)]
pub struct Inputter {
    prompt: String,
    current_input: String,
    cursor_pos: usize, // In chars, not bytes
}

impl Inputter {
    pub fn start(&mut self, prompt: &str) {
        self.prompt = prompt.to_string();
        self.current_input.clear();
        self.cursor_pos = 0;
    }

    pub fn read(&mut self, key: KeyEvent) -> InputOutcome {
        trace!("Input key {:?}", key.code);
        match (key.code, key.modifiers) {
            (KeyCode::Enter, _) => {
                let input = self.current_input.trim().to_string();
                self.current_input.clear();
                self.cursor_pos = 0;
                if input.is_empty() {
                    InputOutcome::Canceled
                } else {
                    InputOutcome::Submitted(input)
                }
            }
            (KeyCode::Esc, _) => {
                self.current_input.clear();
                self.cursor_pos = 0;
                InputOutcome::Canceled
            }
            (KeyCode::Backspace, _) => {
                if self.cursor_pos > 0 {
                    self.cursor_pos -= 1;
                    let at = self.byte_pos();
                    self.current_input.remove(at);
                }
                InputOutcome::Editing
            }
            (KeyCode::Delete, _) => {
                if self.cursor_pos < self.len() {
                    let at = self.byte_pos();
                    self.current_input.remove(at);
                }
                InputOutcome::Editing
            }
            (KeyCode::Left, _) => {
                self.cursor_pos = self.cursor_pos.saturating_sub(1);
                InputOutcome::Editing
            }
            (KeyCode::Right, _) => {
                self.cursor_pos = std::cmp::min(self.cursor_pos + 1, self.len());
                InputOutcome::Editing
            }
            (KeyCode::Home, _) => {
                self.cursor_pos = 0;
                InputOutcome::Editing
            }
            (KeyCode::End, _) => {
                self.cursor_pos = self.len();
                InputOutcome::Editing
            }
            (KeyCode::Char(chr), KeyModifiers::NONE | KeyModifiers::SHIFT) => {
                let at = self.byte_pos();
                self.current_input.insert(at, chr);
                self.cursor_pos += 1;
                InputOutcome::Editing
            }
            _ => InputOutcome::Editing,
        }
    }

    pub fn prompt(&self) -> &str {
        &self.prompt
    }

    pub fn input(&self) -> &str {
        &self.current_input
    }

    pub fn cursor(&self) -> usize {
        self.cursor_pos
    }

    fn len(&self) -> usize {
        self.current_input.chars().count()
    }

    fn byte_pos(&self) -> usize {
        self.current_input
            .char_indices()
            .nth(self.cursor_pos)
            .map(|(byte_idx, _)| byte_idx)
            .unwrap_or(self.current_input.len())
    }
}
