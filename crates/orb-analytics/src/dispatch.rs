//! 백테스트 디스패처.
//!
//! 전략을 입력 순서대로 하나씩 엔진에 넘깁니다. 재시도는 없으며, 한 전략의
//! 실패는 보고서에 기록되고 다음 전략으로 넘어갑니다. 연결 유실만 배치를 중단합니다.

use chrono::NaiveDate;
use orb_core::{strategy_span, BacktestEngine, DateRange, DispatchReport, RunStatus};
use std::sync::Arc;
use std::time::Instant;
use tracing::{error, info, warn, Instrument};

use crate::error::DispatchError;

/// 순차 디스패처.
pub struct BacktestDispatcher {
    engine: Arc<dyn BacktestEngine>,
}

impl BacktestDispatcher {
    pub fn new(engine: Arc<dyn BacktestEngine>) -> Self {
        Self { engine }
    }

    /// 날짜 범위를 검증한 뒤 모든 전략을 실행합니다.
    ///
    /// 범위가 잘못되면 엔진을 한 번도 호출하지 않고 `Validation` 에러를 반환합니다.
    pub async fn run_all(
        &self,
        strategy_names: &[String],
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<DispatchReport, DispatchError> {
        let range = DateRange::new(start, end)?;
        self.run_range(strategy_names, range).await
    }

    /// 검증된 범위로 모든 전략을 실행합니다.
    pub async fn run_range(
        &self,
        strategy_names: &[String],
        range: DateRange,
    ) -> Result<DispatchReport, DispatchError> {
        let total = strategy_names.len();
        let mut report = DispatchReport::new(range);
        info!(strategies = total, range = %range, "Dispatching backtests");

        for name in strategy_names {
            let started = Instant::now();
            let result = self
                .engine
                .run(name, &range)
                .instrument(strategy_span!("backtest", name, range))
                .await;
            let elapsed_ms = started.elapsed().as_millis() as u64;

            match result {
                Ok(()) => {
                    info!(strategy = %name, elapsed_ms, "Backtest succeeded");
                    report.push(name, RunStatus::Succeeded, elapsed_ms);
                }
                Err(err) if err.is_batch_fatal() => {
                    error!(strategy = %name, error = %err, "Engine connection lost; aborting batch");
                    report.push(
                        name,
                        RunStatus::Failed {
                            reason: err.to_string(),
                        },
                        elapsed_ms,
                    );
                    return Err(DispatchError::ConnectionLost {
                        report,
                        total,
                        message: err.to_string(),
                    });
                }
                Err(err) => {
                    warn!(strategy = %name, error = %err, "Backtest failed");
                    report.push(
                        name,
                        RunStatus::Failed {
                            reason: err.to_string(),
                        },
                        elapsed_ms,
                    );
                }
            }
        }

        info!(
            succeeded = report.succeeded().len(),
            failed = report.failed().len(),
            "Dispatch complete"
        );
        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use orb_core::{EngineError, ValidationError};
    use std::sync::Mutex;

    #[derive(Default)]
    struct RecordingEngine {
        calls: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl BacktestEngine for RecordingEngine {
        async fn run(&self, strategy_name: &str, _range: &DateRange) -> Result<(), EngineError> {
            self.calls.lock().unwrap().push(strategy_name.to_string());
            match strategy_name {
                "broken" => Err(EngineError::Rejected("division by zero".to_string())),
                "offline" => Err(EngineError::Connection("server closed the connection".to_string())),
                _ => Ok(()),
            }
        }
    }

    fn d(day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 8, day).unwrap()
    }

    fn names(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[tokio::test]
    async fn test_inverted_range_makes_no_engine_calls() {
        let engine = Arc::new(RecordingEngine::default());
        let dispatcher = BacktestDispatcher::new(engine.clone());

        let err = dispatcher.run_all(&names(&["a"]), d(9), d(1)).await.unwrap_err();
        assert!(matches!(
            err,
            DispatchError::Validation(ValidationError::InvalidDateRange { .. })
        ));
        assert!(engine.calls.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_failure_isolated_and_order_preserved() {
        let engine = Arc::new(RecordingEngine::default());
        let dispatcher = BacktestDispatcher::new(engine.clone());

        let report = dispatcher
            .run_all(&names(&["c", "broken", "a"]), d(1), d(9))
            .await
            .unwrap();

        assert_eq!(*engine.calls.lock().unwrap(), names(&["c", "broken", "a"]));
        let order: Vec<_> = report.entries.iter().map(|e| e.strategy_name.as_str()).collect();
        assert_eq!(order, vec!["c", "broken", "a"]);
        assert_eq!(report.failed(), vec![("broken", "엔진 실행 실패: division by zero")]);
        assert_eq!(report.succeeded(), vec!["c", "a"]);
    }

    #[tokio::test]
    async fn test_connection_loss_aborts_with_partial_report() {
        let engine = Arc::new(RecordingEngine::default());
        let dispatcher = BacktestDispatcher::new(engine.clone());

        let err = dispatcher
            .run_all(&names(&["a", "offline", "b"]), d(1), d(9))
            .await
            .unwrap_err();

        match err {
            DispatchError::ConnectionLost { report, total, .. } => {
                assert_eq!(total, 3);
                assert_eq!(report.succeeded(), vec!["a"]);
                assert_eq!(report.entries.len(), 2);
            }
            other => panic!("unexpected: {other:?}"),
        }
        assert_eq!(*engine.calls.lock().unwrap(), names(&["a", "offline"]));
    }

    #[tokio::test]
    async fn test_empty_batch() {
        let dispatcher = BacktestDispatcher::new(Arc::new(RecordingEngine::default()));
        let report = dispatcher.run_all(&[], d(1), d(1)).await.unwrap();
        assert!(report.entries.is_empty());
        assert!(report.is_all_succeeded());
    }
}
