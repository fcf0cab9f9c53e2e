use crate::error::{AlgtestError, Result};
use csv::{ReaderBuilder, StringRecord, WriterBuilder};
use std::io::{self, Read};
use std::path::Path;
use tracing::warn;

/// Field delimiter used by the tpm2-algtest result files
pub const DELIMITER: u8 = b';';

/// A single record: column name to value, in insertion order
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Row {
    fields: Vec<(String, String)>,
}

impl Row {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.fields
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    /// Replace the value of an existing column or append a new one
    pub fn set(&mut self, key: impl Into<String>, value: impl Into<String>) {
        let key = key.into();
        let value = value.into();
        match self.fields.iter_mut().find(|(k, _)| *k == key) {
            Some((_, v)) => *v = value,
            None => self.fields.push((key, value)),
        }
    }

    pub fn contains(&self, key: &str) -> bool {
        self.fields.iter().any(|(k, _)| k == key)
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.fields.iter().map(|(k, _)| k.as_str())
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Identifier used in diagnostics
    pub fn id(&self) -> &str {
        self.get("id").unwrap_or("?")
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for Row {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut row = Row::new();
        for (k, v) in iter {
            row.set(k, v);
        }
        row
    }
}

/// Semicolon-delimited table with a header line
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Table {
    columns: Vec<String>,
    pub rows: Vec<Row>,
}

fn line_of(record: &StringRecord, line_offset: usize) -> usize {
    line_offset + record.position().map(|p| p.line() as usize).unwrap_or(1)
}

fn is_blank(record: &StringRecord) -> bool {
    record.iter().all(|field| field.trim().is_empty())
}

impl Table {
    pub fn new(columns: Vec<String>) -> Self {
        Self {
            columns,
            rows: Vec::new(),
        }
    }

    /// Read and parse a table file
    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::parse(&text)
    }

    /// Parse table text; the first non-blank line is the header.
    ///
    /// Short records keep only the columns they have values for. Fields past
    /// the last header column are dropped.
    pub fn parse(text: &str) -> Result<Self> {
        let (skipped, offset) = text
            .split_inclusive('\n')
            .take_while(|line| line.trim().is_empty())
            .fold((0, 0), |(lines, bytes), line| (lines + 1, bytes + line.len()));
        Self::read(&text.as_bytes()[offset..], skipped)
    }

    fn read<R: Read>(reader: R, line_offset: usize) -> Result<Self> {
        let mut rdr = ReaderBuilder::new()
            .delimiter(DELIMITER)
            .has_headers(false)
            .flexible(true)
            .from_reader(reader);
        let mut records = rdr.records();

        let header = loop {
            match records.next() {
                Some(record) => {
                    let record = record?;
                    if !is_blank(&record) {
                        break record;
                    }
                }
                None => {
                    return Err(AlgtestError::Table {
                        line: line_offset + 1,
                        reason: "missing header".into(),
                    })
                }
            }
        };
        let columns: Vec<String> = header.iter().map(str::to_string).collect();
        if let Some(pos) = columns.iter().position(|c| c.is_empty()) {
            return Err(AlgtestError::Table {
                line: line_of(&header, line_offset),
                reason: format!("empty column name at position {}", pos + 1),
            });
        }

        let mut table = Table::new(columns);
        for record in records {
            let record = record?;
            if is_blank(&record) {
                continue;
            }
            if record.len() > table.columns.len() {
                warn!(
                    line = line_of(&record, line_offset),
                    extra = record.len() - table.columns.len(),
                    "dropping fields beyond the header"
                );
            }
            table
                .rows
                .push(table.columns.iter().cloned().zip(record.iter()).collect());
        }

        Ok(table)
    }

    /// Columns as read from the file header
    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    /// Columns written on save: the loaded header, then any keys the rows
    /// gained afterwards in order of first appearance
    pub fn header(&self) -> Vec<String> {
        let mut header = self.columns.clone();
        for row in &self.rows {
            for key in row.keys() {
                if !header.iter().any(|c| c == key) {
                    header.push(key.to_string());
                }
            }
        }
        header
    }

    /// Render the table; absent values become empty fields
    pub fn render(&self) -> Result<String> {
        let header = self.header();
        let mut wtr = WriterBuilder::new()
            .delimiter(DELIMITER)
            .from_writer(Vec::new());
        wtr.write_record(&header)?;
        for row in &self.rows {
            wtr.write_record(header.iter().map(|column| row.get(column).unwrap_or("")))?;
        }
        let bytes = wtr.into_inner().map_err(|e| e.into_error())?;
        String::from_utf8(bytes).map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e).into())
    }

    /// Overwrite `path` with the rendered table
    pub fn save(&self, path: &Path) -> Result<()> {
        std::fs::write(path, self.render()?)?;
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}
