/*!
format.rs

Human and JSON rendering of command output.

  - StyleOptions::detect() -> StyleOptions (NO_COLOR, COLUMNS)
  - color(role, text, &StyleOptions) -> String
  - box_header(title, subtitle, &StyleOptions) -> String
  - Table: title + columns + rows, rendered with `render` or `to_json`
  - size2str / str2size: byte counts for humans and from humans

Rendering returns strings; printing is left to the caller.
*/

use std::borrow::Cow;

use serde_json::{Map, Value, json};

use crate::error::{Error, Result};

/* -------------------------------------------------------------------------- */
/* Style                                                                      */
/* -------------------------------------------------------------------------- */

#[derive(Debug, Clone)]
pub struct StyleOptions {
    pub use_color: bool,
    pub term_width: usize,
}

impl Default for StyleOptions {
    fn default() -> Self {
        Self::detect()
    }
}

impl StyleOptions {
    pub fn detect() -> Self {
        let width = std::env::var("COLUMNS")
            .ok()
            .and_then(|v| v.parse::<usize>().ok())
            .map(|w| w.clamp(40, 250))
            .unwrap_or(120);

        StyleOptions {
            use_color: std::env::var_os("NO_COLOR").is_none(),
            term_width: width,
        }
    }

    /// No escape codes, generous width.
    #[cfg(test)]
    pub fn plain() -> Self {
        StyleOptions {
            use_color: false,
            term_width: 250,
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub enum Role {
    Header,
    Title,
    Dim,
    Error,
    Warning,
}

pub fn color(role: Role, text: impl AsRef<str>, style: &StyleOptions) -> String {
    if !style.use_color {
        return text.as_ref().to_string();
    }
    let code = match role {
        Role::Header => "1",
        Role::Title => "38;5;45",
        Role::Dim => "2",
        Role::Error => "38;5;196",
        Role::Warning => "38;5;214",
    };
    format!("\x1b[{code}m{}\x1b[0m", text.as_ref())
}

/// One-line boxed header, e.g. the host name in front of its output.
pub fn box_header(title: impl AsRef<str>, subtitle: Option<&str>, style: &StyleOptions) -> String {
    let plain = match subtitle {
        Some(s) => format!("{}  {}", title.as_ref(), s),
        None => title.as_ref().to_string(),
    };
    let inner = truncate_ellipsis(&plain, style.term_width.saturating_sub(4).max(8));
    let width = inner.chars().count() + 2;
    let styled = match subtitle {
        Some(s) if inner == plain => format!(
            "{}  {}",
            color(Role::Title, title.as_ref(), style),
            color(Role::Dim, s, style)
        ),
        _ => color(Role::Title, &inner, style),
    };
    format!(
        "┌{h}┐\n│ {styled} │\n└{h}┘",
        h = "─".repeat(width)
    )
}

/* -------------------------------------------------------------------------- */
/* Tables                                                                     */
/* -------------------------------------------------------------------------- */

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Table {
    title: Option<String>,
    columns: Vec<String>,
    rows: Vec<Vec<String>>,
}

impl Table {
    pub fn new(columns: &[&str]) -> Self {
        Self {
            title: None,
            columns: columns.iter().map(|c| c.to_string()).collect(),
            rows: Vec::new(),
        }
    }

    pub fn title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    pub fn rows(mut self, rows: Vec<Vec<String>>) -> Self {
        self.rows = rows;
        self
    }

    /// Column-aligned text. Widest columns shrink first when the table does
    /// not fit the terminal; shrunk cells end in an ellipsis.
    pub fn render(&self, style: &StyleOptions) -> String {
        let cols = self.columns.len();
        if cols == 0 {
            return String::new();
        }
        let mut widths: Vec<usize> = self.columns.iter().map(|c| display_width(c)).collect();
        for row in &self.rows {
            for (i, cell) in row.iter().enumerate().take(cols) {
                widths[i] = widths[i].max(display_width(cell));
            }
        }

        let gap = 2;
        let mut total = widths.iter().sum::<usize>() + gap * (cols - 1);
        while total > style.term_width {
            let (idx, widest) = widths
                .iter()
                .copied()
                .enumerate()
                .max_by_key(|(_, w)| *w)
                .unwrap_or((0, 0));
            if widest <= 4 {
                break;
            }
            let shrink = (total - style.term_width).min(widest - 4);
            widths[idx] -= shrink;
            total -= shrink;
        }

        let mut lines = Vec::with_capacity(self.rows.len() + 3);
        if let Some(title) = &self.title {
            lines.push(color(Role::Title, title, style));
        }
        lines.push(color(Role::Header, join_cells(&self.columns, &widths, gap), style));
        lines.push(color(
            Role::Dim,
            widths
                .iter()
                .map(|w| "-".repeat(*w))
                .collect::<Vec<_>>()
                .join(&" ".repeat(gap)),
            style,
        ));
        for row in &self.rows {
            lines.push(join_cells(row, &widths, gap));
        }
        lines.join("\n")
    }

    /// `{"title"?, "columns", "rows": [{column: value}]}`.
    pub fn to_json(&self) -> Value {
        let rows: Vec<Value> = self
            .rows
            .iter()
            .map(|row| {
                let mut obj = Map::new();
                for (i, col) in self.columns.iter().enumerate() {
                    let cell = row.get(i).cloned().unwrap_or_default();
                    obj.insert(col.clone(), Value::String(cell));
                }
                Value::Object(obj)
            })
            .collect();
        let mut out = json!({ "columns": self.columns, "rows": rows });
        if let (Some(title), Value::Object(map)) = (&self.title, &mut out) {
            map.insert("title".into(), Value::String(title.clone()));
        }
        out
    }
}

#[cfg(test)]
impl Table {
    pub fn title_text(&self) -> Option<&str> {
        self.title.as_deref()
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn row_data(&self) -> &[Vec<String>] {
        &self.rows
    }

    pub fn row_count(&self) -> usize {
        self.rows.len()
    }
}

fn join_cells(cells: &[String], widths: &[usize], gap: usize) -> String {
    let mut out = String::new();
    for (i, w) in widths.iter().enumerate() {
        if i > 0 {
            out.push_str(&" ".repeat(gap));
        }
        let raw = cells.get(i).map(String::as_str).unwrap_or("");
        let cell = truncate_ellipsis(raw, *w);
        let len = display_width(&cell);
        out.push_str(&cell);
        if i + 1 < widths.len() && len < *w {
            out.push_str(&" ".repeat(w - len));
        }
    }
    out.trim_end().to_string()
}

/* -------------------------------------------------------------------------- */
/* Sizes                                                                      */
/* -------------------------------------------------------------------------- */

const UNITS: [&str; 6] = ["B", "KiB", "MiB", "GiB", "TiB", "PiB"];

/// Byte count as text: `1.5 GiB` when `human_friendly`, else the raw number.
pub fn size2str(bytes: u64, human_friendly: bool) -> String {
    if !human_friendly {
        return bytes.to_string();
    }
    let mut value = bytes as f64;
    let mut unit = 0;
    while value >= 1024.0 && unit + 1 < UNITS.len() {
        value /= 1024.0;
        unit += 1;
    }
    if unit == 0 {
        format!("{bytes} B")
    } else {
        format!("{value:.1} {}", UNITS[unit])
    }
}

/// Parse `N`, `NK`, `NM`, `NG`, `NT` (optionally followed by `B`/`iB`,
/// case-insensitive) into bytes; suffixes are powers of 1024.
pub fn str2size(raw: &str) -> Result<u64> {
    let s = raw.trim();
    let split = s
        .find(|c: char| !c.is_ascii_digit())
        .unwrap_or(s.len());
    let (digits, suffix) = s.split_at(split);
    if digits.is_empty() {
        return Err(Error::invalid(format!("invalid size: '{raw}'")));
    }
    let number: u64 = digits
        .parse()
        .map_err(|_| Error::invalid(format!("invalid size: '{raw}'")))?;
    let suffix = suffix.trim().to_ascii_uppercase();
    let suffix = suffix
        .strip_suffix("IB")
        .or_else(|| suffix.strip_suffix('B'))
        .unwrap_or(suffix.as_str());
    let shift = match suffix {
        "" => 0,
        "K" => 10,
        "M" => 20,
        "G" => 30,
        "T" => 40,
        _ => return Err(Error::invalid(format!("invalid size unit in '{raw}'"))),
    };
    number
        .checked_mul(1u64 << shift)
        .ok_or_else(|| Error::invalid(format!("size too large: '{raw}'")))
}

/* -------------------------------------------------------------------------- */
/* Text helpers                                                               */
/* -------------------------------------------------------------------------- */

pub fn truncate_ellipsis(s: &str, max_chars: usize) -> String {
    if max_chars == 0 {
        return String::new();
    }
    if s.chars().count() <= max_chars {
        return s.to_string();
    }
    if max_chars == 1 {
        return "…".into();
    }
    let mut out: String = s.chars().take(max_chars - 1).collect();
    out.push('…');
    out
}

fn strip_ansi(s: &str) -> Cow<'_, str> {
    if !s.contains('\x1b') {
        return Cow::Borrowed(s);
    }
    let mut buf = String::with_capacity(s.len());
    let mut chars = s.chars().peekable();
    while let Some(c) = chars.next() {
        if c == '\x1b' && chars.peek() == Some(&'[') {
            chars.next();
            for t in chars.by_ref() {
                if t.is_ascii_alphabetic() {
                    break;
                }
            }
            continue;
        }
        buf.push(c);
    }
    Cow::Owned(buf)
}

fn display_width(s: &str) -> usize {
    strip_ansi(s).chars().count()
}
