//! 데이터 모듈 오류 타입.

use orb_core::ValidationError;
use serde::Serialize;
use std::fmt;
use thiserror::Error;

/// 업로드 파일 읽기 오류.
#[derive(Debug, Error)]
pub enum ReadError {
    #[error("File I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV error: {0}")]
    Csv(String),

    #[error("Workbook error: {0}")]
    Workbook(String),

    /// 워크시트나 헤더 행이 없음
    #[error("Empty upload: {0}")]
    Empty(String),

    #[error("Unsupported file format: {0}")]
    UnsupportedFormat(String),
}

impl From<csv::Error> for ReadError {
    fn from(err: csv::Error) -> Self {
        ReadError::Csv(err.to_string())
    }
}

impl From<calamine::Error> for ReadError {
    fn from(err: calamine::Error) -> Self {
        ReadError::Workbook(err.to_string())
    }
}

/// 테이블 단위 정규화 오류 (배치 전체 거부).
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum NormalizationError {
    /// 이름 없는 헤더에 값이 들어 있음
    #[error("Column {index} has no header but contains values")]
    EmptyHeader { index: usize },

    #[error("Duplicate column: {0}")]
    DuplicateColumn(String),

    /// 필수 컬럼이 헤더에 없음
    #[error("Missing required column: {0}")]
    MissingColumn(String),

    /// `ExtraColumns::Reject` 정책에서 알 수 없는 컬럼
    #[error("Unexpected column: {0}")]
    UnexpectedColumn(String),

    /// 행 필터가 참조하는 컬럼이 헤더에 없음
    #[error("Filter column not present: {0}")]
    MissingFilterColumn(String),
}

/// 셀 변환 실패 유형.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", content = "raw", rename_all = "snake_case")]
pub enum ProblemKind {
    /// 필수 값이 비어 있음
    MissingValue,
    InvalidDate(String),
    InvalidTime(String),
    InvalidNumber(String),
    InvalidInteger(String),
    InvalidBool(String),
}

/// 한 셀의 변환 실패.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CellProblem {
    pub column: String,
    pub kind: ProblemKind,
}

impl fmt::Display for CellProblem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.kind {
            ProblemKind::MissingValue => write!(f, "{}: missing value", self.column),
            ProblemKind::InvalidDate(raw) => write!(f, "{}: invalid date '{}'", self.column, raw),
            ProblemKind::InvalidTime(raw) => write!(f, "{}: invalid time '{}'", self.column, raw),
            ProblemKind::InvalidNumber(raw) => write!(f, "{}: invalid number '{}'", self.column, raw),
            ProblemKind::InvalidInteger(raw) => {
                write!(f, "{}: invalid integer '{}'", self.column, raw)
            }
            ProblemKind::InvalidBool(raw) => write!(f, "{}: invalid boolean '{}'", self.column, raw),
        }
    }
}

/// 행 단위 정규화 실패. 문제 행당 정확히 하나가 생성됩니다.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize)]
#[error("line {line}: {}", join_problems(.problems))]
pub struct RowError {
    /// 원본 파일 줄 번호 (헤더 = 1)
    pub line: usize,
    pub problems: Vec<CellProblem>,
}

fn join_problems(problems: &[CellProblem]) -> String {
    problems
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

/// 저장소 오류.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Database connection error: {0}")]
    Connection(String),

    #[error("Query error: {0}")]
    Query(String),

    /// 배치 중간 실패. 트랜잭션은 롤백되었습니다.
    #[error("Row {key} rejected: {message}")]
    Row { key: String, message: String },

    #[error("Duplicate record: {0}")]
    Duplicate(String),

    #[error(transparent)]
    Validation(#[from] ValidationError),
}

impl StoreError {
    /// 오류 메시지를 유지한 채 행 키를 붙입니다.
    pub fn for_row(key: impl Into<String>, err: StoreError) -> Self {
        match err {
            StoreError::Connection(_) => err,
            other => StoreError::Row {
                key: key.into(),
                message: other.to_string(),
            },
        }
    }
}

impl From<sqlx::Error> for StoreError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::PoolTimedOut | sqlx::Error::PoolClosed | sqlx::Error::Io(_) => {
                StoreError::Connection(err.to_string())
            }
            sqlx::Error::Database(db_err) => {
                let code = db_err.code().unwrap_or_default();
                if code == "23505" {
                    // PostgreSQL 고유 제약 조건 위반
                    StoreError::Duplicate(db_err.message().to_string())
                } else {
                    StoreError::Query(db_err.message().to_string())
                }
            }
            _ => StoreError::Query(err.to_string()),
        }
    }
}

pub type StoreResult<T> = std::result::Result<T, StoreError>;
