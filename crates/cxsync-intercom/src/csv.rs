//! Export payload decoding: optional gzip or zip framing, then
//! newline-delimited CSV with a quote-aware field splitter.

use std::collections::HashMap;
use std::io::{Cursor, Read};

use flate2::read::GzDecoder;
use zip::ZipArchive;

use crate::IntercomError;

/// One CSV data line keyed by the header row.
pub type RawRow = HashMap<String, String>;

const GZIP_MAGIC: [u8; 2] = [0x1f, 0x8b];
const ZIP_MAGIC: [u8; 4] = [0x50, 0x4b, 0x03, 0x04];

/// Decode a downloaded export payload to CSV text. The export endpoint has
/// served plain, gzip-framed and zip-framed bodies; for zip, the first entry
/// holds the CSV.
pub fn decode_export_bytes(bytes: &[u8]) -> Result<String, IntercomError> {
    if bytes.len() >= 2 && bytes[..2] == GZIP_MAGIC {
        let mut text = String::new();
        GzDecoder::new(bytes).read_to_string(&mut text)?;
        Ok(text)
    } else if bytes.len() >= 4 && bytes[..4] == ZIP_MAGIC {
        let mut archive = ZipArchive::new(Cursor::new(bytes))?;
        let mut entry = archive.by_index(0)?;
        let mut text = String::new();
        entry.read_to_string(&mut text)?;
        Ok(text)
    } else {
        Ok(String::from_utf8(bytes.to_vec())?)
    }
}

/// Split one CSV line into trimmed fields. Commas inside quotes are literal;
/// a doubled quote inside a quoted field is an escaped quote.
pub fn split_csv_line(line: &str) -> Vec<String> {
    let mut fields = Vec::new();
    let mut current = String::new();
    let mut in_quotes = false;
    let mut chars = line.chars().peekable();

    while let Some(c) = chars.next() {
        match c {
            '"' if in_quotes => {
                if chars.peek() == Some(&'"') {
                    current.push('"');
                    chars.next();
                } else {
                    in_quotes = false;
                }
            }
            '"' => in_quotes = true,
            ',' if !in_quotes => {
                fields.push(current.trim().to_string());
                current.clear();
            }
            _ => current.push(c),
        }
    }
    fields.push(current.trim().to_string());
    fields
}

/// Single-pass iterator over the data rows of a CSV document. The first
/// non-blank line is consumed as the header row; short data lines leave the
/// missing trailing columns as empty strings.
pub struct CsvRows<'a> {
    headers: Vec<String>,
    lines: std::str::Lines<'a>,
}

impl<'a> CsvRows<'a> {
    pub fn headers(&self) -> &[String] {
        &self.headers
    }
}

impl Iterator for CsvRows<'_> {
    type Item = RawRow;

    fn next(&mut self) -> Option<RawRow> {
        loop {
            let line = self.lines.next()?;
            if line.trim().is_empty() {
                continue;
            }
            let values = split_csv_line(line);
            let mut row = RawRow::with_capacity(self.headers.len());
            for (i, header) in self.headers.iter().enumerate() {
                let value = values.get(i).cloned().unwrap_or_default();
                row.insert(header.clone(), value);
            }
            return Some(row);
        }
    }
}

/// Parse CSV text into a row iterator.
pub fn parse_csv(text: &str) -> CsvRows<'_> {
    let mut lines = text.lines();
    let headers = loop {
        match lines.next() {
            Some(line) if line.trim().is_empty() => continue,
            Some(line) => break split_csv_line(line),
            None => break Vec::new(),
        }
    };
    CsvRows { headers, lines }
}
