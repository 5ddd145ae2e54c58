//! CSV / 스프레드시트 업로드 리더.
//!
//! 첫 행은 헤더입니다. 값은 해석하지 않고 `Cell`로만 옮기며, 타입 변환은
//! `Normalizer`가 담당합니다.

use calamine::{Data, Reader};
use std::io::Cursor;
use std::path::Path;
use tracing::debug;

use super::table::{Cell, RawRow, RawTable};
use crate::error::ReadError;

/// CSV 바이트를 읽습니다. 행 길이가 달라도 허용합니다 (부족한 셀은 `Empty`).
pub fn read_csv(source: &str, bytes: &[u8]) -> Result<RawTable, ReadError> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .from_reader(bytes);

    let headers: Vec<String> = reader
        .headers()?
        .iter()
        .map(|h| h.trim_start_matches('\u{feff}').trim().to_string())
        .collect();
    if headers.iter().all(|h| h.is_empty()) {
        return Err(ReadError::Empty(format!("{}: no header row", source)));
    }

    let mut table = RawTable::new(source, headers);
    for record in reader.records() {
        let record = record?;
        let line = record
            .position()
            .map(|p| p.line() as usize)
            .unwrap_or(table.rows.len() + 2);
        let cells = record
            .iter()
            .map(|v| if v.is_empty() { Cell::Empty } else { Cell::text(v) })
            .collect();
        table.rows.push(RawRow { line, cells });
    }

    debug!(source, rows = table.len(), "Read CSV upload");
    Ok(table)
}

/// 스프레드시트(xlsx, xls, xlsm, ods)의 첫 워크시트를 읽습니다.
pub fn read_xlsx(source: &str, bytes: &[u8]) -> Result<RawTable, ReadError> {
    let mut workbook = calamine::open_workbook_auto_from_rs(Cursor::new(bytes.to_vec()))?;
    let range = workbook
        .worksheet_range_at(0)
        .ok_or_else(|| ReadError::Empty(format!("{}: workbook has no worksheets", source)))??;

    // 데이터가 A1이 아닌 곳에서 시작할 수 있음
    let first_line = range.start().map(|(row, _)| row as usize + 1).unwrap_or(1);

    let mut rows = range.rows();
    let headers: Vec<String> = match rows.next() {
        Some(header_row) => header_row
            .iter()
            .map(|d| to_cell(d).to_string().trim().to_string())
            .collect(),
        None => return Err(ReadError::Empty(format!("{}: worksheet is empty", source))),
    };

    let mut table = RawTable::new(source, headers);
    for (offset, row) in rows.enumerate() {
        table.rows.push(RawRow {
            line: first_line + offset + 1,
            cells: row.iter().map(to_cell).collect(),
        });
    }

    debug!(source, rows = table.len(), "Read spreadsheet upload");
    Ok(table)
}

/// 확장자로 형식을 골라 파일을 읽습니다.
pub async fn read_table(path: &Path) -> Result<RawTable, ReadError> {
    let extension = path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase())
        .unwrap_or_default();
    let source = path
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or_default()
        .to_string();

    match extension.as_str() {
        "csv" => {
            let bytes = tokio::fs::read(path).await?;
            read_csv(&source, &bytes)
        }
        "xlsx" | "xls" | "xlsm" | "xlsb" | "ods" => {
            let bytes = tokio::fs::read(path).await?;
            read_xlsx(&source, &bytes)
        }
        other => Err(ReadError::UnsupportedFormat(format!("{} (.{})", source, other))),
    }
}

fn to_cell(data: &Data) -> Cell {
    match data {
        Data::Empty => Cell::Empty,
        Data::String(s) if s.is_empty() => Cell::Empty,
        Data::String(s) => Cell::Text(s.clone()),
        Data::Int(i) => Cell::Int(*i),
        Data::Float(f) => Cell::Float(*f),
        Data::Bool(b) => Cell::Bool(*b),
        Data::DateTime(dt) => dt
            .as_datetime()
            .map(Cell::DateTime)
            .unwrap_or_else(|| Cell::Float(dt.as_f64())),
        Data::DateTimeIso(s) | Data::DurationIso(s) => Cell::Text(s.clone()),
        // "#N/A" 등은 결측 표기로 정규화됨
        Data::Error(e) => Cell::Text(e.to_string()),
    }
}
