//! Table formatting utilities for CLI list commands
//!
//! List commands build `TableRow`s of typed cells and hand them to a
//! `TableFormatter`, which prints them as aligned colored columns, CSV,
//! Markdown or bare ids. JSON output bypasses this module and serializes
//! the records directly.

use chrono::{DateTime, Utc};
use console::{measure_text_width, pad_str, style, Alignment};
use tabled::{builder::Builder, settings::Style};

use crate::cli::helpers::{escape_csv, format_timestamp, truncate_str};
use crate::cli::OutputFormat;

/// A typed cell value with semantic meaning for formatting
#[derive(Debug, Clone)]
pub enum CellValue {
    /// Document id, never truncated so it can be pasted into commands
    Id(String),
    /// Plain text, truncated to the column width
    Text(String),
    /// "Lost" (red) or "Found" (green)
    Status(&'static str),
    /// Role label; admins are highlighted
    Role(String),
    /// Read flag
    Read(bool),
    /// Timestamp shown as local date and time
    DateTime(DateTime<Utc>),
    Number(i64),
    /// Whole percentage, "-" when absent
    Percent(Option<i64>),
    Empty,
}

impl CellValue {
    /// Text or `Empty` for an optional field
    pub fn opt_text(value: Option<&str>) -> Self {
        match value {
            Some(s) => CellValue::Text(s.to_string()),
            None => CellValue::Empty,
        }
    }

    /// Format for table output (with colors if terminal)
    pub fn format_table(&self, width: usize) -> String {
        let styled = match self {
            CellValue::Id(id) => style(id).cyan().to_string(),
            CellValue::Text(s) => truncate_str(s, width),
            CellValue::Status(s) => match *s {
                "Lost" => style(s).red().to_string(),
                _ => style(s).green().to_string(),
            },
            CellValue::Role(r) => {
                if r == "admin" {
                    style(r).magenta().bold().to_string()
                } else {
                    r.clone()
                }
            }
            CellValue::Read(read) => {
                if *read {
                    style("read").dim().to_string()
                } else {
                    style("unread").yellow().to_string()
                }
            }
            CellValue::DateTime(dt) => format_timestamp(dt),
            CellValue::Number(n) => {
                return pad_str(&n.to_string(), width, Alignment::Right, None).into_owned();
            }
            CellValue::Percent(p) => match p {
                Some(p) => format!("{}%", p),
                None => style("-").dim().to_string(),
            },
            CellValue::Empty => style("-").dim().to_string(),
        };
        pad_str(&styled, width, Alignment::Left, None).into_owned()
    }

    /// Format for CSV output (RFC 4180, no colors)
    pub fn format_csv(&self) -> String {
        match self {
            CellValue::Empty => String::new(),
            CellValue::Percent(None) => String::new(),
            other => escape_csv(&other.raw()),
        }
    }

    /// Format for Markdown output (no colors, escaped pipes)
    pub fn format_md(&self) -> String {
        let raw = match self {
            CellValue::Empty | CellValue::Percent(None) => "-".to_string(),
            CellValue::Role(r) if r == "admin" => "**admin**".to_string(),
            other => other.raw(),
        };
        raw.replace('|', "\\|").replace('\n', " ")
    }

    /// Get raw string value (no formatting)
    pub fn raw(&self) -> String {
        match self {
            CellValue::Id(id) => id.clone(),
            CellValue::Text(s) => s.clone(),
            CellValue::Status(s) => s.to_string(),
            CellValue::Role(r) => r.clone(),
            CellValue::Read(read) => read.to_string(),
            CellValue::DateTime(dt) => format_timestamp(dt),
            CellValue::Number(n) => n.to_string(),
            CellValue::Percent(p) => p.map(|p| format!("{}%", p)).unwrap_or_default(),
            CellValue::Empty => String::new(),
        }
    }

    /// Get the display width of this cell's content (for dynamic column sizing)
    pub fn display_width(&self) -> usize {
        match self {
            CellValue::Read(_) => 6,
            CellValue::DateTime(_) => 16, // "YYYY-MM-DD HH:MM"
            CellValue::Empty | CellValue::Percent(None) => 1,
            other => measure_text_width(&other.raw()),
        }
    }
}

/// Column definition with header label and maximum width
#[derive(Debug, Clone)]
pub struct ColumnDef {
    pub key: &'static str,
    pub header: &'static str,
    pub width: usize,
}

impl ColumnDef {
    pub const fn new(key: &'static str, header: &'static str, width: usize) -> Self {
        Self { key, header, width }
    }
}

/// A row of cell values for table output
pub struct TableRow {
    pub id: String,
    pub cells: Vec<(&'static str, CellValue)>,
}

impl TableRow {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            cells: Vec::new(),
        }
    }

    pub fn cell(mut self, key: &'static str, value: CellValue) -> Self {
        self.cells.push((key, value));
        self
    }

    pub fn get(&self, key: &str) -> Option<&CellValue> {
        self.cells.iter().find(|(k, _)| *k == key).map(|(_, v)| v)
    }
}

/// Table formatter that outputs rows in various formats
pub struct TableFormatter<'a> {
    columns: &'a [ColumnDef],
    /// Plural noun for the summary line, e.g. "items"
    noun: &'static str,
    show_summary: bool,
}

impl<'a> TableFormatter<'a> {
    pub fn new(columns: &'a [ColumnDef], noun: &'static str) -> Self {
        Self {
            columns,
            noun,
            show_summary: true,
        }
    }

    /// Drop the "N items shown" line (`--quiet`)
    pub fn without_summary(mut self) -> Self {
        self.show_summary = false;
        self
    }

    /// Output rows in the specified format
    pub fn output<I>(&self, rows: I, format: OutputFormat)
    where
        I: IntoIterator<Item = TableRow>,
    {
        let rows: Vec<TableRow> = rows.into_iter().collect();
        match format {
            OutputFormat::Csv => self.output_csv(&rows),
            OutputFormat::Md => self.output_md(&rows),
            OutputFormat::Id => self.output_ids(&rows),
            _ => self.output_table(&rows),
        }
    }

    /// Calculate dynamic column widths based on actual content
    fn calculate_widths(&self, rows: &[TableRow]) -> Vec<usize> {
        self.columns
            .iter()
            .map(|col| {
                let max_content = rows
                    .iter()
                    .filter_map(|r| r.get(col.key))
                    .map(|v| v.display_width())
                    .max()
                    .unwrap_or(0);
                max_content.max(col.header.len()).min(col.width)
            })
            .collect()
    }

    fn output_table(&self, rows: &[TableRow]) {
        let widths = self.calculate_widths(rows);

        let header: Vec<String> = self
            .columns
            .iter()
            .zip(&widths)
            .map(|(col, w)| pad_str(&style(col.header).bold().to_string(), *w, Alignment::Left, None).into_owned())
            .collect();
        println!("{}", header.join("  "));

        let total_width: usize = widths.iter().sum::<usize>() + 2 * widths.len().saturating_sub(1);
        println!("{}", style("-".repeat(total_width)).dim());

        for row in rows {
            let parts: Vec<String> = self
                .columns
                .iter()
                .zip(&widths)
                .map(|(col, w)| match row.get(col.key) {
                    Some(value) => value.format_table(*w),
                    None => CellValue::Empty.format_table(*w),
                })
                .collect();
            println!("{}", parts.join("  ").trim_end());
        }

        if self.show_summary {
            println!();
            println!("{} {} shown.", style(rows.len()).cyan(), self.noun);
        }
    }

    fn output_csv(&self, rows: &[TableRow]) {
        let headers: Vec<&str> = self.columns.iter().map(|c| c.key).collect();
        println!("{}", headers.join(","));

        for row in rows {
            let values: Vec<String> = self
                .columns
                .iter()
                .map(|col| row.get(col.key).map(CellValue::format_csv).unwrap_or_default())
                .collect();
            println!("{}", values.join(","));
        }
    }

    fn output_md(&self, rows: &[TableRow]) {
        print!("{}", self.render_md(rows));
        println!();
    }

    fn render_md(&self, rows: &[TableRow]) -> String {
        let mut builder = Builder::default();
        builder.push_record(self.columns.iter().map(|c| c.header.to_string()));
        for row in rows {
            builder.push_record(self.columns.iter().map(|col| {
                row.get(col.key)
                    .map(CellValue::format_md)
                    .unwrap_or_else(|| "-".to_string())
            }));
        }
        builder.build().with(Style::markdown()).to_string()
    }

    fn output_ids(&self, rows: &[TableRow]) {
        for row in rows {
            println!("{}", row.id);
        }
    }
}
