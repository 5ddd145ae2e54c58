//! 백테스트 디스패치, 결과 집계, 리포트 내보내기.
//!
//! # 모듈 구성
//!
//! - [`dispatch`]: 전략별 순차 엔진 호출 및 실패 격리
//! - [`aggregate`]: 거래 로그 / 일별 요약 수집과 PnL 롤업
//! - [`report`]: 워크북, 요약 CSV, 차트 시리즈
//! - [`pipeline`]: 업로드부터 리포트까지의 전체 흐름

pub mod aggregate;
pub mod dispatch;
pub mod error;
pub mod pipeline;
pub mod report;

pub use aggregate::{
    AggregationIssue, DailyPivot, IssueKind, PnlRollup, ResultAggregator, ResultBundle,
    StrategyResults,
};
pub use dispatch::BacktestDispatcher;
pub use error::{AggregationError, DispatchError, ExportError, PipelineError};
pub use pipeline::{BacktestPipeline, PipelineOutcome};
pub use report::{
    cumulative_series, mtm_series, template_workbook, trades_csv, ChartPoint, ChartSeries,
    ReportArtifacts, ReportExporter,
};
