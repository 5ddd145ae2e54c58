//! 엔진 결과 조회 trait.

use async_trait::async_trait;
use thiserror::Error;

use super::trade::{DailySummary, MtmPoint, TradeRecord};
use crate::types::DateRange;

/// 결과 조회 에러.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SourceError {
    #[error("조회 에러: {0}")]
    Query(String),

    #[error("연결 에러: {0}")]
    Connection(String),
}

/// 엔진 출력 뷰에 대한 읽기 전용 접근.
///
/// 반환 순서는 보장하지 않습니다. 정렬은 호출자(`ResultAggregator`)가 수행합니다.
#[async_trait]
pub trait ResultSource: Send + Sync {
    /// 한 전략의 거래 기록을 날짜 범위로 조회합니다.
    async fn trades(&self, strategy_name: &str, range: &DateRange) -> Result<Vec<TradeRecord>, SourceError>;

    /// 날짜 범위의 전 전략 일별 요약을 조회합니다.
    async fn daily_summary(&self, range: &DateRange) -> Result<Vec<DailySummary>, SourceError>;

    /// 포트폴리오 MTM 곡선. 뷰가 설정되지 않았으면 `None`.
    async fn portfolio_mtm(&self, _range: &DateRange) -> Result<Option<Vec<MtmPoint>>, SourceError> {
        Ok(None)
    }
}
