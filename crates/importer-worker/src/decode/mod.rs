//! Format decoder: raw object bytes to header-keyed string rows
//!
//! The content type is resolved once into a [`ContentKind`]. Spreadsheets go
//! through `calamine`, everything else is treated as UTF-8 delimited text and
//! parsed with `csv`. Both paths share the header and row assembly below, so
//! the strategies see the same shape regardless of the upload format.

use mime::Mime;
use serde::Serialize;
use std::collections::HashMap;

use crate::error::FileResult;

mod delimited;
mod workbook;

/// Legacy Excel MIME type
pub const XLS_CONTENT_TYPE: &str = "application/vnd.ms-excel";

/// Office Open XML spreadsheet MIME type
pub const XLSX_CONTENT_TYPE: &str =
    "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet";

/// Prefix for positional names given to blank header cells
const EMPTY_HEADER: &str = "__EMPTY";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContentKind {
    SpreadsheetBinary,
    DelimitedText,
}

impl ContentKind {
    /// Resolve the decoding path from a declared content type.
    ///
    /// Parameters and case are ignored. Anything that is not one of the two
    /// spreadsheet types, including an absent or unparsable value, is text.
    pub fn from_content_type(content_type: Option<&str>) -> Self {
        let Some(mime) = content_type.and_then(|ct| ct.trim().parse::<Mime>().ok()) else {
            return Self::DelimitedText;
        };

        let essence = mime.essence_str().to_ascii_lowercase();
        if essence == XLS_CONTENT_TYPE || essence == XLSX_CONTENT_TYPE {
            Self::SpreadsheetBinary
        } else {
            Self::DelimitedText
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::SpreadsheetBinary => "spreadsheet",
            Self::DelimitedText => "delimited",
        }
    }
}

/// One decoded data row
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Row {
    /// 1-based source line, counting the header line
    pub line: usize,
    cells: Vec<(String, String)>,
}

impl Row {
    pub fn new(line: usize, cells: Vec<(String, String)>) -> Self {
        Self { line, cells }
    }

    /// Value under an exact header name
    pub fn get(&self, header: &str) -> Option<&str> {
        self.cells
            .iter()
            .find(|(name, _)| name == header)
            .map(|(_, value)| value.as_str())
    }

    pub fn headers(&self) -> impl Iterator<Item = &str> {
        self.cells.iter().map(|(name, _)| name.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.cells.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn len(&self) -> usize {
        self.cells.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }
}

/// Decode an object body into rows, in source order.
pub fn decode_rows(content_type: Option<&str>, bytes: &[u8]) -> FileResult<Vec<Row>> {
    match ContentKind::from_content_type(content_type) {
        ContentKind::SpreadsheetBinary => workbook::decode(bytes),
        ContentKind::DelimitedText => delimited::decode(bytes),
    }
}

/// Header names from the first record: trimmed, blanks named positionally,
/// repeats suffixed.
fn header_names(raw: &[String]) -> Vec<String> {
    let mut seen: HashMap<String, usize> = HashMap::new();
    let mut blanks = 0usize;

    raw.iter()
        .map(|cell| {
            let name = cell.trim();
            if name.is_empty() {
                let positional = match blanks {
                    0 => EMPTY_HEADER.to_string(),
                    n => format!("{}_{}", EMPTY_HEADER, n),
                };
                blanks += 1;
                return positional;
            }

            let count = seen.entry(name.to_string()).or_insert(0);
            let header = match *count {
                0 => name.to_string(),
                n => format!("{}_{}", name, n),
            };
            *count += 1;
            header
        })
        .collect()
}

/// Assemble rows from `(line, cells)` records whose first entry is the header.
fn assemble_rows<I>(records: I) -> Vec<Row>
where
    I: IntoIterator<Item = (usize, Vec<String>)>,
{
    let mut records = records.into_iter();
    let Some((_, header)) = records.next() else {
        return Vec::new();
    };
    let headers = header_names(&header);

    records
        .filter(|(_, cells)| cells.iter().any(|c| !c.trim().is_empty()))
        .map(|(line, mut cells)| {
            cells.resize(headers.len(), String::new());
            Row::new(line, headers.iter().cloned().zip(cells).collect())
        })
        .collect()
}
