//! 분석 crate 에러 타입.

use orb_core::{DispatchReport, SourceError, ValidationError};
use orb_data::{NormalizationError, ReadError, RowError, StoreError};
use thiserror::Error;

/// 디스패치 에러. 전략별 실패는 보고서에 기록되며 여기로 오지 않습니다.
#[derive(Debug, Error)]
pub enum DispatchError {
    /// 엔진 호출 전에 거부됨
    #[error(transparent)]
    Validation(#[from] ValidationError),

    /// 저장소 연결 유실로 배치 중단. `report`에는 중단 시점까지의 결과가 있습니다.
    #[error("Engine connection lost after {} of {total} strategies: {message}", .report.entries.len())]
    ConnectionLost {
        report: DispatchReport,
        total: usize,
        message: String,
    },
}

/// 결과 집계 에러.
#[derive(Debug, Error)]
pub enum AggregationError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    /// 결과 뷰 조회 실패
    #[error("Result query failed ({scope}): {error}")]
    Source {
        scope: String,
        #[source]
        error: SourceError,
    },
}

impl AggregationError {
    pub(crate) fn query(scope: impl Into<String>, error: SourceError) -> Self {
        Self::Source {
            scope: scope.into(),
            error,
        }
    }
}

/// 리포트 내보내기 에러.
#[derive(Debug, Error)]
pub enum ExportError {
    /// 31자로 자른 시트 이름이 겹침
    #[error("Sheet name '{sheet}' is shared by strategies '{first}' and '{second}'")]
    SheetNameCollision {
        sheet: String,
        first: String,
        second: String,
    },

    /// 시트 이름으로 쓸 수 없는 전략 이름
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error("Workbook error: {0}")]
    Workbook(String),

    #[error("CSV error: {0}")]
    Csv(String),

    #[error("JSON error: {0}")]
    Json(String),

    #[error("File I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<rust_xlsxwriter::XlsxError> for ExportError {
    fn from(err: rust_xlsxwriter::XlsxError) -> Self {
        ExportError::Workbook(err.to_string())
    }
}

impl From<csv::Error> for ExportError {
    fn from(err: csv::Error) -> Self {
        ExportError::Csv(err.to_string())
    }
}

/// 전체 흐름 에러.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error(transparent)]
    Read(#[from] ReadError),

    #[error(transparent)]
    Normalization(#[from] NormalizationError),

    /// 모든 업로드 행이 정규화에 실패해 실행할 전략이 없음
    #[error("{} row(s) failed normalization; first: {}", .0.len(), .0.first().map(ToString::to_string).unwrap_or_default())]
    RejectedRows(Vec<RowError>),

    #[error("Upload contains no strategies")]
    NoStrategies,

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Dispatch(#[from] DispatchError),

    #[error(transparent)]
    Aggregation(#[from] AggregationError),

    #[error(transparent)]
    Export(#[from] ExportError),

    #[error(transparent)]
    Validation(#[from] ValidationError),
}
