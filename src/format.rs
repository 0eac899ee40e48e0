use serde_json::Value;

/// Placeholder for null or missing cells.
pub const EMPTY_CELL: &str = "-";

/// Render a cell value as text.
///
/// `null` and absent values become [`EMPTY_CELL`]. Everything else is shown as
/// is: strings without quotes, numbers as written, booleans as `true`/`false`.
/// Nothing is masked, including fields like `ssn`.
pub fn format_cell(value: Option<&Value>) -> String {
    match value {
        None | Some(Value::Null) => EMPTY_CELL.to_string(),
        Some(Value::String(s)) => s.clone(),
        Some(Value::Bool(b)) => b.to_string(),
        Some(Value::Number(n)) => n.to_string(),
        // Rows are expected to be flat, fall back to compact JSON.
        Some(other) => other.to_string(),
    }
}

/// Hook for column specific cell rendering.
///
/// This is where masking of sensitive fields (e.g. `ssn`) would live. No
/// masking rule is defined yet, so the only implementation passes values
/// through [`format_cell`].
pub trait CellFormatter {
    fn format(&self, key: &str, value: Option<&Value>) -> String;
}

#[derive(Debug, Default, Clone, Copy)]
pub struct PlainFormatter;

impl CellFormatter for PlainFormatter {
    fn format(&self, _key: &str, value: Option<&Value>) -> String {
        format_cell(value)
    }
}

/// Shorten text to `width` characters, ending in `...` when cut.
/// Line breaks are shown as ` ↵ ` so a cell stays on one line.
pub fn fit_to_width(text: &str, width: usize) -> String {
    let single_line = text.replace("\r\n", " ↵ ").replace('\n', " ↵ ");
    if single_line.chars().count() <= width {
        return single_line;
    }
    if width < 3 {
        return single_line.chars().take(width).collect();
    }
    let mut reduced: String = single_line.chars().take(width - 3).collect();
    reduced.push_str("...");
    reduced
}

/// Display width of a text in characters.
pub fn text_width(text: &str) -> usize {
    text.chars().count()
}

/// Quote a cell for a comma separated line.
pub fn to_csv_field(cell: &str) -> String {
    let needs_escaping = cell.contains('"');
    let needs_wrapping = cell.chars().any(|c| matches!(c, ' ' | '\t' | ',' | '\n'));
    let mut out = cell.to_string();

    if needs_escaping {
        out = out.replace('"', "\"\"");
    }
    if needs_escaping || needs_wrapping {
        out = format!("\"{out}\"");
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn null_and_missing_are_placeholders() {
        assert_eq!(format_cell(None), "-");
        assert_eq!(format_cell(Some(&Value::Null)), "-");
    }

    #[test]
    fn falsy_values_are_present() {
        assert_eq!(format_cell(Some(&json!(0))), "0");
        assert_eq!(format_cell(Some(&json!(false))), "false");
        assert_eq!(format_cell(Some(&json!(""))), "");
    }

    #[test]
    fn scalars_are_unmodified() {
        assert_eq!(format_cell(Some(&json!("123-45-6789"))), "123-45-6789");
        assert_eq!(format_cell(Some(&json!(42.5))), "42.5");
        assert_eq!(format_cell(Some(&json!(-7))), "-7");
        assert_eq!(format_cell(Some(&json!([1, 2]))), "[1,2]");
    }

    #[test]
    fn plain_formatter_does_not_mask() {
        let value = json!("123-45-6789");
        assert_eq!(PlainFormatter.format("ssn", Some(&value)), "123-45-6789");
    }

    #[test]
    fn fit() {
        assert_eq!(fit_to_width("Austin", 10), "Austin");
        assert_eq!(fit_to_width("Springfield", 8), "Sprin...");
        assert_eq!(fit_to_width("Springfield", 2), "Sp");
        assert_eq!(fit_to_width("a\nb", 10), "a ↵ b");
        assert_eq!(fit_to_width("Zürich-Örlikon", 6), "Zür...");
    }

    #[test]
    fn csv_fields() {
        assert_eq!(to_csv_field("Austin"), "Austin");
        assert_eq!(to_csv_field("New York"), "\"New York\"");
        assert_eq!(to_csv_field("a,b"), "\"a,b\"");
        assert_eq!(to_csv_field("say \"hi\""), "\"say \"\"hi\"\"\"");
    }
}
