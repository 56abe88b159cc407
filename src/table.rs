//! Flexible console tables.
//!
//! Each column is as wide as its longest value (header included). Cells are
//! padded with trailing spaces and joined by `" | "`; a dashed divider exactly
//! as wide as the header line separates the header from the data rows.
//!
//! ```
//! use flotilla::table::{Cell, Table};
//!
//! let mut table = Table::new(["ID", "Status"]);
//! table.push_row(vec![Cell::from("i-1"), Cell::from("running")]);
//! let text = table.render().expect("uniform rows render");
//! assert_eq!(text, "ID  | Status \n-------------\ni-1 | running\n");
//! ```

use std::fmt;
use std::io::{self, Write};

use thiserror::Error;

use crate::model::{InstanceStatus, SnapshotStatus, VolumeStatus};

const SEPARATOR: &str = " | ";

/// A value that can be placed in a table cell.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum Cell {
    /// Free text.
    Text(String),
    /// Whole number.
    Integer(i64),
    /// Lifecycle status of a remote resource.
    Status(String),
    /// Missing value, rendered as an empty cell.
    Empty,
}

impl fmt::Display for Cell {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Text(text) | Self::Status(text) => f.write_str(text),
            Self::Integer(value) => write!(f, "{value}"),
            Self::Empty => Ok(()),
        }
    }
}

impl From<&str> for Cell {
    fn from(value: &str) -> Self {
        Self::Text(value.to_owned())
    }
}

impl From<String> for Cell {
    fn from(value: String) -> Self {
        Self::Text(value)
    }
}

impl From<i64> for Cell {
    fn from(value: i64) -> Self {
        Self::Integer(value)
    }
}

impl From<u32> for Cell {
    fn from(value: u32) -> Self {
        Self::Integer(i64::from(value))
    }
}

impl From<u8> for Cell {
    fn from(value: u8) -> Self {
        Self::Integer(i64::from(value))
    }
}

impl From<InstanceStatus> for Cell {
    fn from(value: InstanceStatus) -> Self {
        Self::Status(value.to_string())
    }
}

impl From<VolumeStatus> for Cell {
    fn from(value: VolumeStatus) -> Self {
        Self::Status(value.to_string())
    }
}

impl From<SnapshotStatus> for Cell {
    fn from(value: SnapshotStatus) -> Self {
        Self::Status(value.to_string())
    }
}

impl<T: Into<Self>> From<Option<T>> for Cell {
    fn from(value: Option<T>) -> Self {
        value.map_or(Self::Empty, Into::into)
    }
}

/// Errors raised while rendering a table.
#[derive(Debug, Error)]
pub enum TableError {
    /// Raised when a row does not have one value per header.
    #[error("row {row} has {found} values but the table has {expected} headers")]
    ShapeMismatch {
        /// Zero-based index of the offending row.
        row: usize,
        /// Number of headers.
        expected: usize,
        /// Number of values in the row.
        found: usize,
    },
    /// Raised when the output sink rejects the rendered text.
    #[error("failed to write table: {0}")]
    Io(#[from] io::Error),
}

/// Header labels plus rows of cells.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct Table {
    headers: Vec<String>,
    rows: Vec<Vec<Cell>>,
}

impl Table {
    /// Creates an empty table with the given header labels.
    pub fn new<I, S>(headers: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            headers: headers.into_iter().map(Into::into).collect(),
            rows: Vec::new(),
        }
    }

    /// Appends a row. Shape is checked when rendering.
    pub fn push_row(&mut self, row: Vec<Cell>) {
        self.rows.push(row);
    }

    /// Returns the header labels.
    #[must_use]
    pub fn headers(&self) -> &[String] {
        &self.headers
    }

    /// Returns the rows added so far.
    #[must_use]
    pub fn rows(&self) -> &[Vec<Cell>] {
        &self.rows
    }

    fn check_shape(&self) -> Result<(), TableError> {
        let expected = self.headers.len();
        for (row, values) in self.rows.iter().enumerate() {
            if values.len() != expected {
                return Err(TableError::ShapeMismatch {
                    row,
                    expected,
                    found: values.len(),
                });
            }
        }
        Ok(())
    }

    /// Computes each column's width in characters.
    ///
    /// # Errors
    ///
    /// Returns [`TableError::ShapeMismatch`] when a row length differs from
    /// the header length.
    pub fn column_widths(&self) -> Result<Vec<usize>, TableError> {
        self.check_shape()?;
        let mut widths: Vec<usize> = self
            .headers
            .iter()
            .map(|header| header.chars().count())
            .collect();
        for values in &self.rows {
            for (width, cell) in widths.iter_mut().zip(values) {
                *width = (*width).max(cell.to_string().chars().count());
            }
        }
        Ok(widths)
    }

    /// Renders the table to a string, one line per row.
    ///
    /// # Errors
    ///
    /// Returns [`TableError::ShapeMismatch`] when a row length differs from
    /// the header length.
    pub fn render(&self) -> Result<String, TableError> {
        let widths = self.column_widths()?;
        let mut out = String::new();

        push_line(&mut out, self.headers.iter().map(String::as_str), &widths);

        let divider_width = widths.iter().sum::<usize>()
            + SEPARATOR.len() * widths.len().saturating_sub(1);
        out.push_str(&"-".repeat(divider_width));
        out.push('\n');

        for values in &self.rows {
            let texts: Vec<String> = values.iter().map(ToString::to_string).collect();
            push_line(&mut out, texts.iter().map(String::as_str), &widths);
        }
        Ok(out)
    }

    /// Renders the table and writes it to `sink` in one call. Nothing is
    /// written when the table is malformed.
    ///
    /// # Errors
    ///
    /// Returns [`TableError`] when the shape is invalid or the write fails.
    pub fn write_to<W: Write + ?Sized>(&self, sink: &mut W) -> Result<(), TableError> {
        let rendered = self.render()?;
        sink.write_all(rendered.as_bytes())?;
        sink.flush()?;
        Ok(())
    }

    /// Writes the table to standard output.
    ///
    /// # Errors
    ///
    /// Returns [`TableError`] when the shape is invalid or stdout is closed.
    pub fn print(&self) -> Result<(), TableError> {
        self.write_to(&mut io::stdout().lock())
    }
}

fn push_line<'a>(out: &mut String, texts: impl Iterator<Item = &'a str>, widths: &[usize]) {
    let cells: Vec<String> = texts
        .zip(widths)
        .map(|(text, &width)| format!("{text:<width$}"))
        .collect();
    out.push_str(&cells.join(SEPARATOR));
    out.push('\n');
}
