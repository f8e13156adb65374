//! UTF-8 delimited text

use csv::ReaderBuilder;

use super::{assemble_rows, Row};
use crate::error::{FileError, FileResult};

const UTF8_BOM: &str = "\u{feff}";

pub(super) fn decode(bytes: &[u8]) -> FileResult<Vec<Row>> {
    let text = std::str::from_utf8(bytes)
        .map_err(|e| FileError::Decode(format!("content is not valid UTF-8: {}", e)))?;
    let text = text.strip_prefix(UTF8_BOM).unwrap_or(text);

    let mut reader = ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .from_reader(text.as_bytes());

    let mut records = Vec::new();
    for (index, result) in reader.records().enumerate() {
        let record = result.map_err(|e| FileError::Decode(format!("malformed CSV: {}", e)))?;
        let line = record
            .position()
            .map(|p| p.line() as usize)
            .unwrap_or(index + 1);
        records.push((line, record.iter().map(str::to_string).collect()));
    }

    Ok(assemble_rows(records))
}
