//! 백테스트 실행 명령어.
//!
//! ```bash
//! # 조건 파일을 업로드하고 모든 전략 실행
//! orb run -u strategies.xlsx -f 2025-08-01 -t 2025-08-09 -o out/
//!
//! # 저장된 전략 하나만 실행
//! orb run-single -n default -f 2025-08-01 -t 2025-08-09
//! ```

use anyhow::{bail, Context, Result};
use chrono::NaiveDate;
use orb_analytics::{
    trades_csv, BacktestDispatcher, BacktestPipeline, DispatchError, PipelineError,
    PipelineOutcome, ResultAggregator,
};
use orb_core::{AppConfig, RunStatus};
use orb_data::{read_table, Database, PgBacktestEngine, PgConfigStore, PgResultSource};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{error, info};

/// 단일 전략 실행 시 함께 쓰는 거래 로그 CSV.
pub const RESULTS_FILE: &str = "backtest_results.csv";

/// 실행 옵션.
#[derive(Debug, Clone)]
pub struct RunOptions {
    /// 전략 조건 업로드 파일 (없으면 저장된 전략 실행)
    pub upload: Option<PathBuf>,
    /// 실행할 저장 전략 (비어 있으면 전체)
    pub strategies: Vec<String>,
    pub start: NaiveDate,
    pub end: NaiveDate,
    /// 리포트 출력 디렉터리
    pub output: PathBuf,
    /// 거래 로그 CSV 추가 출력
    pub write_trades_csv: bool,
}

/// PostgreSQL 구현으로 파이프라인을 조립합니다.
pub fn build_pipeline(config: &AppConfig, db: Database) -> Result<BacktestPipeline> {
    let store = PgConfigStore::new(db.clone(), &config.tables)?;
    let engine = PgBacktestEngine::new(db.clone(), &config.engine)?;
    let source = PgResultSource::new(db, &config.views)?;

    Ok(BacktestPipeline::new(
        Arc::new(store),
        BacktestDispatcher::new(Arc::new(engine)),
        ResultAggregator::new(Arc::new(source)),
        config.ingest.clone(),
    ))
}

/// 데이터베이스에 연결해 실행합니다.
pub async fn run_backtests(
    config: &AppConfig,
    options: &RunOptions,
    sync_settings: bool,
) -> Result<PipelineOutcome> {
    let db = Database::connect(&config.database).await?;
    let pipeline = build_pipeline(config, db.clone())?.with_settings_sync(sync_settings);

    let result = execute(&pipeline, options).await;
    db.close().await;
    result
}

/// 파이프라인을 실행하고 결과물을 출력 디렉터리에 씁니다.
pub async fn execute(pipeline: &BacktestPipeline, options: &RunOptions) -> Result<PipelineOutcome> {
    let result = match &options.upload {
        Some(path) => {
            let raw = read_table(path)
                .await
                .with_context(|| format!("Failed to read upload: {}", path.display()))?;
            info!(source = %raw.source, rows = raw.len(), "Upload read");
            pipeline.run_upload(&raw, options.start, options.end).await
        }
        None => {
            pipeline
                .run_stored(&options.strategies, options.start, options.end)
                .await
        }
    };

    let outcome = match result {
        Ok(outcome) => outcome,
        Err(PipelineError::RejectedRows(rows)) => {
            println!("\n❌ 모든 업로드 행({}개)이 거부되었습니다:", rows.len());
            for row in &rows {
                println!("  - {}", row);
            }
            bail!("{} row(s) failed normalization; nothing was stored", rows.len());
        }
        Err(PipelineError::Dispatch(DispatchError::ConnectionLost { report, total, message })) => {
            error!(completed = report.entries.len(), total, "Batch aborted");
            println!(
                "\n❌ 엔진 연결 유실: {}/{} 전략 처리 후 중단 ({})",
                report.entries.len(),
                total,
                message
            );
            bail!("Engine connection lost after {} of {} strategies", report.entries.len(), total);
        }
        Err(e) => return Err(e.into()),
    };

    let written = outcome.artifacts.write_to_dir(&options.output).await?;

    if options.write_trades_csv {
        let trades: Vec<_> = outcome
            .bundle
            .strategies
            .iter()
            .flat_map(|s| s.trades.iter().cloned())
            .collect();
        let path = options.output.join(RESULTS_FILE);
        tokio::fs::write(&path, trades_csv(&trades)?).await?;
        info!(path = %path.display(), trades = trades.len(), "Trade log written");
    }

    print_outcome(&outcome);
    for path in &written {
        println!("저장 위치: {}", path.display());
    }
    Ok(outcome)
}

fn print_outcome(outcome: &PipelineOutcome) {
    println!("\n=== 백테스트 결과 ({}) ===", outcome.report.range);
    if outcome.conditions_loaded > 0 {
        println!("조건 행 적재: {}", outcome.conditions_loaded);
    }
    if outcome.settings_upserted > 0 {
        println!("설정 upsert: {}", outcome.settings_upserted);
    }
    if !outcome.rejected_rows.is_empty() {
        println!("⚠️  거부된 업로드 행 {}개 (저장/실행 제외):", outcome.rejected_rows.len());
        for row in &outcome.rejected_rows {
            println!("  - {}", row);
        }
    }

    for entry in &outcome.report.entries {
        match &entry.status {
            RunStatus::Succeeded => {
                let trades = outcome
                    .bundle
                    .trades_for(&entry.strategy_name)
                    .map_or(0, |t| t.len());
                println!(
                    "✅ {} ({} ms, 거래 {}건)",
                    entry.strategy_name, entry.elapsed_ms, trades
                );
            }
            RunStatus::Failed { reason } => {
                println!("❌ {}: {}", entry.strategy_name, reason);
            }
        }
    }

    if !outcome.bundle.issues.is_empty() {
        println!("\n⚠️  해석할 수 없는 PnL {}건:", outcome.bundle.issues.len());
        for issue in &outcome.bundle.issues {
            println!(
                "  - {} {}: {:?}",
                issue.strategy_name.as_deref().unwrap_or("portfolio"),
                issue.trade_date,
                issue.kind
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::template::write_template;
    use async_trait::async_trait;
    use orb_core::{BacktestEngine, DateRange, EngineError, IngestConfig, PnlValue, TradeRecord};
    use orb_data::{MemoryConfigStore, MemoryResultSource};
    use rust_decimal_macros::dec;

    struct AcceptAll;

    #[async_trait]
    impl BacktestEngine for AcceptAll {
        async fn run(&self, _strategy_name: &str, _range: &DateRange) -> Result<(), EngineError> {
            Ok(())
        }
    }

    fn d(day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 8, day).unwrap()
    }

    fn pipeline(source: MemoryResultSource) -> BacktestPipeline {
        BacktestPipeline::new(
            Arc::new(MemoryConfigStore::new()),
            BacktestDispatcher::new(Arc::new(AcceptAll)),
            ResultAggregator::new(Arc::new(source)),
            IngestConfig::default(),
        )
    }

    #[tokio::test]
    async fn test_template_upload_writes_report_files() {
        let dir = tempfile::tempdir().unwrap();
        let upload = dir.path().join("strategies.xlsx");
        write_template(&upload).await.unwrap();

        let source = MemoryResultSource::new().with_trades([TradeRecord::new(
            "strat_pct_example",
            d(4),
            PnlValue::from(dec!(150)),
        )]);
        let options = RunOptions {
            upload: Some(upload),
            strategies: Vec::new(),
            start: d(1),
            end: d(9),
            output: dir.path().join("out"),
            write_trades_csv: true,
        };

        let outcome = execute(&pipeline(source), &options).await.unwrap();

        assert_eq!(
            outcome.artifacts.sheet_names,
            vec!["strat_full_example", "strat_pct_example"]
        );
        for file in [
            orb_analytics::report::WORKBOOK_FILE,
            orb_analytics::report::SUMMARY_FILE,
            orb_analytics::report::CHART_FILE,
            RESULTS_FILE,
        ] {
            assert!(options.output.join(file).exists(), "{file} missing");
        }

        let trades = std::fs::read_to_string(options.output.join(RESULTS_FILE)).unwrap();
        assert_eq!(trades.lines().count(), 2);
    }

    #[tokio::test]
    async fn test_stored_run_with_nothing_stored_fails() {
        let dir = tempfile::tempdir().unwrap();
        let options = RunOptions {
            upload: None,
            strategies: Vec::new(),
            start: d(1),
            end: d(9),
            output: dir.path().to_path_buf(),
            write_trades_csv: false,
        };

        let err = execute(&pipeline(MemoryResultSource::new()), &options)
            .await
            .unwrap_err();
        assert!(matches!(
            err.downcast_ref::<PipelineError>(),
            Some(PipelineError::NoStrategies)
        ));
    }
}
