//! Spreadsheet workbooks (xls / xlsx); only the first sheet is read

use calamine::{open_workbook_auto_from_rs, Data, Reader};
use std::io::Cursor;

use super::{assemble_rows, Row};
use crate::error::{FileError, FileResult};

pub(super) fn decode(bytes: &[u8]) -> FileResult<Vec<Row>> {
    let mut workbook = open_workbook_auto_from_rs(Cursor::new(bytes))
        .map_err(|e| FileError::Decode(format!("unreadable workbook: {}", e)))?;

    let Some(range) = workbook.worksheet_range_at(0) else {
        return Ok(Vec::new());
    };
    let range = range.map_err(|e| FileError::Decode(format!("unreadable first sheet: {}", e)))?;

    let first_line = range.start().map(|(row, _)| row as usize + 1).unwrap_or(1);

    let records = range
        .rows()
        .enumerate()
        .map(|(offset, cells)| (first_line + offset, cells.iter().map(cell_text).collect()));

    Ok(assemble_rows(records))
}

/// Render a cell the way it reads in the spreadsheet UI.
fn cell_text(cell: &Data) -> String {
    match cell {
        Data::Empty => String::new(),
        Data::String(s) | Data::DateTimeIso(s) | Data::DurationIso(s) => s.clone(),
        Data::Int(i) => i.to_string(),
        Data::Float(f) => float_text(*f),
        Data::Bool(true) => "TRUE".to_string(),
        Data::Bool(false) => "FALSE".to_string(),
        Data::Error(e) => e.to_string(),
        Data::DateTime(dt) => match dt.as_datetime() {
            Some(value) if value.time() == chrono::NaiveTime::MIN => {
                value.format("%Y-%m-%d").to_string()
            },
            Some(value) => value.format("%Y-%m-%dT%H:%M:%S").to_string(),
            None => float_text(dt.as_f64()),
        },
    }
}

/// Integral floats print without a fractional part, so a phone column typed as
/// a number comes back as `912345678` rather than `912345678.0`.
fn float_text(value: f64) -> String {
    if value.is_finite() && value.fract() == 0.0 && value.abs() < 1e15 {
        format!("{}", value as i64)
    } else {
        value.to_string()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_garbage_is_decode_error() {
        let err = decode(b"definitely not a workbook").unwrap_err();
        assert_eq!(err.kind(), "decode_error");
    }

    #[test]
    fn test_float_text() {
        assert_eq!(float_text(42.0), "42");
        assert_eq!(float_text(-3.0), "-3");
        assert_eq!(float_text(2.25), "2.25");
    }

    #[test]
    fn test_cell_text() {
        assert_eq!(cell_text(&Data::Empty), "");
        assert_eq!(cell_text(&Data::Int(7)), "7");
        assert_eq!(cell_text(&Data::Bool(false)), "FALSE");
        assert_eq!(cell_text(&Data::String("x".into())), "x");
    }
}
