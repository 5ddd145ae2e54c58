//! 업로드 정규화.
//!
//! 순수 변환입니다. 테이블 구조 오류만 `NormalizationError`로 반환하고,
//! 행 단위 변환 실패는 `NormalizedTable::failures`에 누적한 채 나머지 행을 계속 처리합니다.
//!
//! 처리 순서 (행마다):
//! 1. 행 필터 (원본 셀 기준, 타입 변환 전)
//! 2. 결측 표기 → `Value::Null`
//! 3. 옵션 유형 코드 재매핑
//! 4. 스키마 타입으로 변환

use chrono::{NaiveDate, NaiveDateTime, NaiveTime, Timelike};
use orb_core::IngestConfig;
use rust_decimal::prelude::*;
use rust_decimal::Decimal;
use std::collections::HashSet;
use std::fmt;
use tracing::{debug, info};

use super::schema::{ColumnKind, ColumnSpec, ExtraColumns, TableSchema};
use super::table::{Cell, RawRow, RawTable};
use crate::error::{CellProblem, NormalizationError, ProblemKind, RowError};

/// 정규화된 셀 값.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    /// 명시적 결측 (빈 문자열로 저장하지 않음)
    Null,
    Text(String),
    Int(i64),
    Decimal(Decimal),
    Bool(bool),
    Date(NaiveDate),
    Time(NaiveTime),
    DateTime(NaiveDateTime),
}

impl Value {
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            Value::Text(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::Int(i) => Some(*i),
            Value::Decimal(d) if d.fract().is_zero() => d.to_i64(),
            _ => None,
        }
    }

    pub fn as_decimal(&self) -> Option<Decimal> {
        match self {
            Value::Decimal(d) => Some(*d),
            Value::Int(i) => Some(Decimal::from(*i)),
            _ => None,
        }
    }

    pub fn as_date(&self) -> Option<NaiveDate> {
        match self {
            Value::Date(d) => Some(*d),
            _ => None,
        }
    }

    pub fn as_time(&self) -> Option<NaiveTime> {
        match self {
            Value::Time(t) => Some(*t),
            _ => None,
        }
    }
}

/// 날짜는 ISO(`YYYY-MM-DD`), 시각은 `HH:MM:SS`로 표기합니다.
impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => Ok(()),
            Value::Text(s) => f.write_str(s),
            Value::Int(i) => write!(f, "{}", i),
            Value::Decimal(d) => write!(f, "{}", d),
            Value::Bool(b) => write!(f, "{}", b),
            Value::Date(d) => write!(f, "{}", d.format("%Y-%m-%d")),
            Value::Time(t) => write!(f, "{}", t.format("%H:%M:%S")),
            Value::DateTime(dt) => write!(f, "{}", dt.format("%Y-%m-%d %H:%M:%S")),
        }
    }
}

/// 정규화된 행.
#[derive(Debug, Clone, PartialEq)]
pub struct NormalizedRow {
    /// 원본 줄 번호
    pub line: usize,
    /// 스키마 컬럼 (스키마 순서, 헤더에 있는 컬럼만)
    pub fields: Vec<(String, Value)>,
    /// 스키마 밖 컬럼 (헤더 이름 그대로)
    pub extras: Vec<(String, Value)>,
}

impl NormalizedRow {
    /// 스키마 컬럼, 그다음 extras에서 값을 찾습니다.
    pub fn get(&self, column: &str) -> Option<&Value> {
        self.fields
            .iter()
            .chain(self.extras.iter())
            .find(|(name, _)| name == column)
            .map(|(_, v)| v)
    }

    /// 스키마 컬럼과 extras를 순서대로 순회합니다.
    pub fn columns(&self) -> impl Iterator<Item = &(String, Value)> {
        self.fields.iter().chain(self.extras.iter())
    }
}

/// 정규화 결과.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct NormalizedTable {
    pub source: String,
    /// 헤더에 존재한 스키마 컬럼 (스키마 순서)
    pub columns: Vec<String>,
    /// 통과된 스키마 밖 컬럼 (원본 순서)
    pub extra_columns: Vec<String>,
    pub rows: Vec<NormalizedRow>,
    /// 행 단위 실패 (행당 하나)
    pub failures: Vec<RowError>,
    /// 필터로 제외된 행 수
    pub filtered_out: usize,
}

impl NormalizedTable {
    pub fn is_clean(&self) -> bool {
        self.failures.is_empty()
    }

    /// 텍스트 컬럼의 고유 값 (처음 등장 순서).
    pub fn distinct_text(&self, column: &str) -> Vec<String> {
        let mut seen = HashSet::new();
        self.rows
            .iter()
            .filter_map(|r| r.get(column).and_then(Value::as_text))
            .filter(|v| seen.insert(v.to_string()))
            .map(str::to_string)
            .collect()
    }
}

/// 행 필터 방향.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FilterMode {
    /// 표기가 일치하는 행 제외 (옵션 레그 테이블)
    Exclude,
    /// 표기가 일치하는 행만 유지 (지수 테이블)
    Only,
}

/// 컬럼 표기 기반 행 필터.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RowFilter {
    pub column: String,
    pub marker: String,
    pub mode: FilterMode,
}

impl RowFilter {
    pub fn new(column: impl Into<String>, marker: impl Into<String>, mode: FilterMode) -> Self {
        Self {
            column: column.into(),
            marker: marker.into(),
            mode,
        }
    }

    /// 설정의 지수 행 표기(`strike == Index`)로 필터를 만듭니다.
    pub fn index_rows(config: &IngestConfig, mode: FilterMode) -> Self {
        Self::new(&config.index_column, &config.index_marker, mode)
    }

    fn keeps(&self, cell: &Cell) -> bool {
        let matches = cell.to_string().trim().eq_ignore_ascii_case(&self.marker);
        match self.mode {
            FilterMode::Exclude => !matches,
            FilterMode::Only => matches,
        }
    }
}

/// 옵션 유형 코드 재매핑 (두 항목). 그 외 값은 그대로 통과합니다.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OptionTypeMap {
    pub column: String,
    entries: [(String, String); 2],
}

impl OptionTypeMap {
    pub fn new(
        column: impl Into<String>,
        call: (impl Into<String>, impl Into<String>),
        put: (impl Into<String>, impl Into<String>),
    ) -> Self {
        Self {
            column: column.into(),
            entries: [(call.0.into(), call.1.into()), (put.0.into(), put.1.into())],
        }
    }

    pub fn from_config(config: &IngestConfig) -> Self {
        Self::new(
            "option_type",
            (config.call_code.as_str(), config.call_marker.as_str()),
            (config.put_code.as_str(), config.put_marker.as_str()),
        )
    }

    pub fn remap<'a>(&'a self, raw: &'a str) -> &'a str {
        let key = raw.trim();
        self.entries
            .iter()
            .find(|(code, _)| code.eq_ignore_ascii_case(key))
            .map(|(_, marker)| marker.as_str())
            .unwrap_or(raw)
    }
}

/// 정규화 옵션.
#[derive(Debug, Clone, PartialEq)]
pub struct NormalizeOptions {
    pub null_markers: Vec<String>,
    pub date_formats: Vec<String>,
    pub filter: Option<RowFilter>,
    pub option_types: Option<OptionTypeMap>,
}

impl NormalizeOptions {
    pub fn from_config(config: &IngestConfig) -> Self {
        Self {
            null_markers: config.null_markers.clone(),
            date_formats: config.date_formats.clone(),
            filter: None,
            option_types: Some(OptionTypeMap::from_config(config)),
        }
    }

    pub fn with_filter(mut self, filter: RowFilter) -> Self {
        self.filter = Some(filter);
        self
    }

    pub fn without_option_types(mut self) -> Self {
        self.option_types = None;
        self
    }
}

impl Default for NormalizeOptions {
    fn default() -> Self {
        Self::from_config(&IngestConfig::default())
    }
}

/// 헤더 해석 결과.
struct Layout<'s> {
    mapped: Vec<(usize, &'s ColumnSpec)>,
    extras: Vec<(usize, String)>,
    filter_index: Option<usize>,
}

/// 스키마 기반 정규화기.
#[derive(Debug, Clone)]
pub struct Normalizer {
    schema: TableSchema,
    options: NormalizeOptions,
}

impl Normalizer {
    pub fn new(schema: TableSchema, options: NormalizeOptions) -> Self {
        Self { schema, options }
    }

    pub fn schema(&self) -> &TableSchema {
        &self.schema
    }

    /// 원본 테이블을 정규화합니다.
    pub fn normalize(&self, table: &RawTable) -> Result<NormalizedTable, NormalizationError> {
        let layout = self.resolve(table)?;

        let mut out = NormalizedTable {
            source: table.source.clone(),
            columns: layout.mapped.iter().map(|(_, s)| s.name.clone()).collect(),
            extra_columns: layout.extras.iter().map(|(_, n)| n.clone()).collect(),
            ..Default::default()
        };

        for row in &table.rows {
            if let (Some(filter), Some(idx)) = (&self.options.filter, layout.filter_index) {
                if !filter.keeps(row.cell(idx)) {
                    out.filtered_out += 1;
                    continue;
                }
            }

            match self.normalize_row(row, &layout) {
                Ok(normalized) => out.rows.push(normalized),
                Err(err) => {
                    debug!(source = %table.source, error = %err, "Row failed normalization");
                    out.failures.push(err);
                }
            }
        }

        info!(
            source = %table.source,
            schema = %self.schema.name,
            rows = out.rows.len(),
            failures = out.failures.len(),
            filtered_out = out.filtered_out,
            "Normalized upload"
        );

        Ok(out)
    }

    fn resolve<'s>(&'s self, table: &RawTable) -> Result<Layout<'s>, NormalizationError> {
        let mut seen = HashSet::new();
        let mut mapped = Vec::new();
        let mut extras = Vec::new();

        for (idx, header) in table.headers.iter().enumerate() {
            let header = header.trim();
            if header.is_empty() {
                if table.rows.iter().any(|r| !matches!(r.cell(idx), Cell::Empty)) {
                    return Err(NormalizationError::EmptyHeader { index: idx });
                }
                continue;
            }
            if !seen.insert(header.to_ascii_lowercase()) {
                return Err(NormalizationError::DuplicateColumn(header.to_string()));
            }

            match self.schema.find(header) {
                Some(spec) => mapped.push((idx, spec)),
                None => match self.schema.extra_columns {
                    ExtraColumns::Reject => {
                        return Err(NormalizationError::UnexpectedColumn(header.to_string()))
                    }
                    ExtraColumns::PassThrough => extras.push((idx, header.to_string())),
                },
            }
        }

        if let Some(missing) = self
            .schema
            .columns
            .iter()
            .filter(|c| c.required)
            .find(|c| !mapped.iter().any(|(_, s)| s.name == c.name))
        {
            return Err(NormalizationError::MissingColumn(missing.name.clone()));
        }

        let position = |spec: &ColumnSpec| {
            self.schema
                .columns
                .iter()
                .position(|c| c.name == spec.name)
                .unwrap_or(usize::MAX)
        };
        mapped.sort_by_key(|(_, spec)| position(*spec));

        let filter_index = match &self.options.filter {
            Some(filter) => Some(
                table
                    .headers
                    .iter()
                    .position(|h| h.trim().eq_ignore_ascii_case(&filter.column))
                    .ok_or_else(|| NormalizationError::MissingFilterColumn(filter.column.clone()))?,
            ),
            None => None,
        };

        Ok(Layout {
            mapped,
            extras,
            filter_index,
        })
    }

    fn normalize_row(&self, row: &RawRow, layout: &Layout<'_>) -> Result<NormalizedRow, RowError> {
        let mut problems = Vec::new();
        let mut fields = Vec::with_capacity(layout.mapped.len());

        for (idx, spec) in &layout.mapped {
            let cell = self.prepare(&spec.name, row.cell(*idx));
            match cell.map(|c| convert(&c, spec.kind, &self.options.date_formats)) {
                None if spec.required => problems.push(CellProblem {
                    column: spec.name.clone(),
                    kind: ProblemKind::MissingValue,
                }),
                None => fields.push((spec.name.clone(), Value::Null)),
                Some(Ok(value)) => fields.push((spec.name.clone(), value)),
                Some(Err(kind)) => problems.push(CellProblem {
                    column: spec.name.clone(),
                    kind,
                }),
            }
        }

        if !problems.is_empty() {
            return Err(RowError {
                line: row.line,
                problems,
            });
        }

        let extras = layout
            .extras
            .iter()
            .map(|(idx, name)| {
                let value = self
                    .prepare(name, row.cell(*idx))
                    .map(|c| infer(&c, &self.options.date_formats))
                    .unwrap_or(Value::Null);
                (name.clone(), value)
            })
            .collect();

        Ok(NormalizedRow {
            line: row.line,
            fields,
            extras,
        })
    }

    /// 결측 표기를 걸러내고 옵션 유형 코드를 재매핑합니다. 결측이면 `None`.
    fn prepare(&self, column: &str, cell: &Cell) -> Option<Cell> {
        let is_null = match cell {
            Cell::Empty => true,
            Cell::Text(s) => self.options.null_markers.iter().any(|m| m == s.trim()),
            Cell::Float(f) => f.is_nan(),
            _ => false,
        };
        if is_null {
            return None;
        }

        match (cell, &self.options.option_types) {
            (Cell::Text(s), Some(map)) if map.column.eq_ignore_ascii_case(column) => {
                Some(Cell::Text(map.remap(s).to_string()))
            }
            _ => Some(cell.clone()),
        }
    }
}

fn parse_decimal(raw: &str) -> Option<Decimal> {
    let raw = raw.trim();
    Decimal::from_str(raw)
        .or_else(|_| Decimal::from_scientific(raw))
        .ok()
}

fn parse_date(raw: &str, formats: &[String]) -> Option<NaiveDate> {
    let raw = raw.trim();
    formats
        .iter()
        .find_map(|f| NaiveDate::parse_from_str(raw, f).ok())
}

fn parse_time(raw: &str) -> Option<NaiveTime> {
    let raw = raw.trim();
    ["%H:%M:%S", "%H:%M:%S%.f", "%H:%M"]
        .iter()
        .find_map(|f| NaiveTime::parse_from_str(raw, f).ok())
}

/// 스프레드시트의 하루 비율(0.0 ~ 1.0) 시각.
fn time_from_day_fraction(fraction: f64) -> Option<NaiveTime> {
    if !(0.0..1.0).contains(&fraction) {
        return None;
    }
    let secs = (fraction * 86_400.0).round() as u32;
    NaiveTime::from_num_seconds_from_midnight_opt(secs.min(86_399), 0)
}

fn convert(cell: &Cell, kind: ColumnKind, date_formats: &[String]) -> Result<Value, ProblemKind> {
    let raw = || cell.to_string();

    match kind {
        ColumnKind::Text => Ok(Value::Text(match cell {
            Cell::Text(s) => s.trim().to_string(),
            Cell::Float(f) => Decimal::from_f64(*f)
                .map(|d| d.normalize().to_string())
                .unwrap_or_else(|| f.to_string()),
            other => other.to_string(),
        })),

        ColumnKind::Integer => match cell {
            Cell::Int(i) => Ok(Value::Int(*i)),
            Cell::Float(f) if f.fract() == 0.0 && f.abs() < 9.0e15 => Ok(Value::Int(*f as i64)),
            Cell::Text(s) => s
                .trim()
                .parse::<i64>()
                .ok()
                .or_else(|| {
                    parse_decimal(s)
                        .filter(|d| d.fract().is_zero())
                        .and_then(|d| d.to_i64())
                })
                .map(Value::Int)
                .ok_or_else(|| ProblemKind::InvalidInteger(raw())),
            _ => Err(ProblemKind::InvalidInteger(raw())),
        },

        ColumnKind::Decimal => match cell {
            Cell::Int(i) => Ok(Value::Decimal(Decimal::from(*i))),
            Cell::Float(f) => Decimal::from_f64(*f)
                .map(Value::Decimal)
                .ok_or_else(|| ProblemKind::InvalidNumber(raw())),
            Cell::Text(s) => parse_decimal(s)
                .map(Value::Decimal)
                .ok_or_else(|| ProblemKind::InvalidNumber(raw())),
            _ => Err(ProblemKind::InvalidNumber(raw())),
        },

        ColumnKind::Date => match cell {
            Cell::DateTime(dt) => Ok(Value::Date(dt.date())),
            Cell::Text(s) => parse_date(s, date_formats)
                .map(Value::Date)
                .ok_or_else(|| ProblemKind::InvalidDate(raw())),
            _ => Err(ProblemKind::InvalidDate(raw())),
        },

        ColumnKind::Time => match cell {
            Cell::DateTime(dt) => Ok(Value::Time(dt.time().with_nanosecond(0).unwrap_or(dt.time()))),
            Cell::Float(f) => time_from_day_fraction(*f)
                .map(Value::Time)
                .ok_or_else(|| ProblemKind::InvalidTime(raw())),
            Cell::Text(s) => parse_time(s)
                .map(Value::Time)
                .ok_or_else(|| ProblemKind::InvalidTime(raw())),
            _ => Err(ProblemKind::InvalidTime(raw())),
        },

        ColumnKind::Bool => match cell {
            Cell::Bool(b) => Ok(Value::Bool(*b)),
            Cell::Int(0) => Ok(Value::Bool(false)),
            Cell::Int(1) => Ok(Value::Bool(true)),
            Cell::Text(s) => match s.trim().to_ascii_lowercase().as_str() {
                "true" | "yes" | "y" | "1" => Ok(Value::Bool(true)),
                "false" | "no" | "n" | "0" => Ok(Value::Bool(false)),
                _ => Err(ProblemKind::InvalidBool(raw())),
            },
            _ => Err(ProblemKind::InvalidBool(raw())),
        },
    }
}

/// 스키마 밖 컬럼의 타입 추론. 숫자/날짜/시각으로 해석되지 않으면 텍스트.
fn infer(cell: &Cell, date_formats: &[String]) -> Value {
    match cell {
        Cell::Empty => Value::Null,
        Cell::Int(i) => Value::Int(*i),
        Cell::Float(f) => Decimal::from_f64(*f)
            .map(Value::Decimal)
            .unwrap_or(Value::Null),
        Cell::Bool(b) => Value::Bool(*b),
        Cell::DateTime(dt) if dt.time() == NaiveTime::MIN => Value::Date(dt.date()),
        Cell::DateTime(dt) => Value::DateTime(*dt),
        Cell::Text(s) => {
            let trimmed = s.trim();
            if let Ok(i) = trimmed.parse::<i64>() {
                Value::Int(i)
            } else if let Some(d) = parse_decimal(trimmed) {
                Value::Decimal(d)
            } else if let Some(d) = parse_date(trimmed, date_formats) {
                Value::Date(d)
            } else if let Some(t) = parse_time(trimmed) {
                Value::Time(t)
            } else {
                Value::Text(trimmed.to_string())
            }
        }
    }
}
