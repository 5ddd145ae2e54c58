//! 정규화 전 원본 테이블.

use chrono::NaiveDateTime;
use std::fmt;

/// 원본 셀. CSV는 항상 `Text`/`Empty`, 스프레드시트는 셀 타입을 유지합니다.
#[derive(Debug, Clone, PartialEq)]
pub enum Cell {
    Empty,
    Text(String),
    Int(i64),
    Float(f64),
    Bool(bool),
    DateTime(NaiveDateTime),
}

impl Cell {
    pub fn text(value: impl Into<String>) -> Self {
        Cell::Text(value.into())
    }
}

impl fmt::Display for Cell {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Cell::Empty => Ok(()),
            Cell::Text(s) => f.write_str(s),
            Cell::Int(i) => write!(f, "{}", i),
            Cell::Float(v) => write!(f, "{}", v),
            Cell::Bool(b) => write!(f, "{}", b),
            Cell::DateTime(dt) => write!(f, "{}", dt),
        }
    }
}

/// 원본 데이터 행.
#[derive(Debug, Clone, PartialEq)]
pub struct RawRow {
    /// 원본 줄 번호 (헤더 = 1)
    pub line: usize,
    pub cells: Vec<Cell>,
}

impl RawRow {
    /// 짧은 행의 누락된 셀은 `Empty`로 취급합니다.
    pub fn cell(&self, index: usize) -> &Cell {
        self.cells.get(index).unwrap_or(&Cell::Empty)
    }
}

/// 첫 행을 헤더로 하는 원본 테이블.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct RawTable {
    /// 출처 (파일 이름 등, 로그용)
    pub source: String,
    pub headers: Vec<String>,
    pub rows: Vec<RawRow>,
}

impl RawTable {
    pub fn new(source: impl Into<String>, headers: Vec<String>) -> Self {
        Self {
            source: source.into(),
            headers,
            rows: Vec::new(),
        }
    }

    /// 다음 줄 번호로 행을 추가합니다.
    pub fn push_row(&mut self, cells: Vec<Cell>) {
        let line = self.rows.last().map(|r| r.line + 1).unwrap_or(2);
        self.rows.push(RawRow { line, cells });
    }

    /// 테스트 및 인라인 데이터용: 문자열 셀로 테이블을 만듭니다.
    pub fn from_text_rows(source: &str, headers: &[&str], rows: &[&[&str]]) -> Self {
        let mut table = Self::new(source, headers.iter().map(|h| h.to_string()).collect());
        for row in rows {
            table.push_row(
                row.iter()
                    .map(|v| if v.is_empty() { Cell::Empty } else { Cell::text(*v) })
                    .collect(),
            );
        }
        table
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}
