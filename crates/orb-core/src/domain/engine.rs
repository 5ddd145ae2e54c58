//! 외부 백테스트 엔진 trait.
//!
//! 실제 백테스트 계산은 저장 프로시저가 수행하며, 이 trait은 호출 경계만
//! 정의합니다. 엔진은 자신의 결과를 직접 커밋합니다.

use async_trait::async_trait;
use thiserror::Error;

use crate::types::DateRange;

/// 엔진 호출 에러.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EngineError {
    /// 엔진이 해당 전략 실행을 실패시킴 (다른 전략에는 영향 없음)
    #[error("엔진 실행 실패: {0}")]
    Rejected(String),

    /// 저장소 연결 유실 (배치 전체 중단)
    #[error("엔진 연결 에러: {0}")]
    Connection(String),
}

impl EngineError {
    /// 배치를 계속할 수 없는 에러인지 확인합니다.
    pub fn is_batch_fatal(&self) -> bool {
        matches!(self, EngineError::Connection(_))
    }
}

/// 전략 이름과 날짜 범위로 호출되는 백테스트 엔진.
#[async_trait]
pub trait BacktestEngine: Send + Sync {
    /// 한 전략에 대한 백테스트를 실행합니다.
    ///
    /// 같은 `(strategy_name, range)`로 다시 호출하면 이전 결과를 덮어쓴다고 가정합니다.
    async fn run(&self, strategy_name: &str, range: &DateRange) -> Result<(), EngineError>;
}
