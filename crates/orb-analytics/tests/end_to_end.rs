//! 업로드부터 리포트까지 두 전략 시나리오.

use async_trait::async_trait;
use calamine::Reader;
use chrono::NaiveDate;
use orb_analytics::{
    template_workbook, BacktestDispatcher, BacktestPipeline, ExportError, PipelineError,
    ResultAggregator,
};
use orb_core::{
    BacktestEngine, DailySummary, DateRange, EngineError, IngestConfig, MtmPoint, PnlValue,
    StrategyConfig, TradeRecord, ValidationError, STRATEGY_CONFIG_COLUMNS,
};
use orb_data::{
    read_xlsx, ConfigStore, MemoryConfigStore, MemoryResultSource, NormalizeOptions, Normalizer,
    RawTable, TableSchema,
};
use rust_decimal_macros::dec;
use std::io::Cursor;
use std::sync::{Arc, Mutex};

#[derive(Default)]
struct OkEngine {
    calls: Mutex<Vec<(String, DateRange)>>,
}

#[async_trait]
impl BacktestEngine for OkEngine {
    async fn run(&self, strategy_name: &str, range: &DateRange) -> Result<(), EngineError> {
        self.calls.lock().unwrap().push((strategy_name.to_string(), *range));
        Ok(())
    }
}

fn d(day: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(2025, 8, day).unwrap()
}

fn upload(rows: &[(&str, &str)]) -> RawTable {
    let mut headers: Vec<&str> = STRATEGY_CONFIG_COLUMNS.to_vec();
    headers.push("entry_window");
    let values: Vec<Vec<&str>> = rows
        .iter()
        .map(|(name, lot)| {
            vec![
                *name, "15", "5", "full_candle_breakout", "60", "80", "50", "4", "1", "20",
                "15:20:00", *lot, "50", "3", "84", "2", "2", "900000", "1", "regular_system_sl",
                "2", "2", "full_candle_breakout", "09:30:00",
            ]
        })
        .collect();
    let slices: Vec<&[&str]> = values.iter().map(Vec::as_slice).collect();
    RawTable::from_text_rows("strategies.xlsx", &headers, &slices)
}

fn results() -> MemoryResultSource {
    let mut trades = Vec::new();
    let mut summaries = Vec::new();
    // 저장소 순서는 뒤섞여 있음
    for day in [6, 1, 4] {
        trades.push(TradeRecord::new("strat_B", d(day), PnlValue::from(dec!(-25))).with_expiry(d(7)));
        trades.push(TradeRecord::new("strat_A", d(day), PnlValue::from(dec!(100))).with_expiry(d(7)));
        summaries.push(DailySummary::new("strat_B", d(day), PnlValue::from(dec!(-25))));
        summaries.push(DailySummary::new("strat_A", d(day), PnlValue::from(dec!(100))));
    }
    // 범위 밖 결과와 업로드에 없는 전략은 제외되어야 함
    trades.push(TradeRecord::new("strat_A", d(12), PnlValue::from(dec!(1))));
    summaries.push(DailySummary::new("strat_Z", d(2), PnlValue::from(dec!(1))));

    MemoryResultSource::new().with_trades(trades).with_summaries(summaries)
}

fn pipeline(store: Arc<MemoryConfigStore>, engine: Arc<OkEngine>) -> BacktestPipeline {
    pipeline_with(store, engine, results())
}

fn pipeline_with(
    store: Arc<MemoryConfigStore>,
    engine: Arc<OkEngine>,
    source: MemoryResultSource,
) -> BacktestPipeline {
    BacktestPipeline::new(
        store,
        BacktestDispatcher::new(engine),
        ResultAggregator::new(Arc::new(source)),
        IngestConfig::default(),
    )
}

#[tokio::test]
async fn two_strategy_upload_produces_full_report() {
    let store = Arc::new(MemoryConfigStore::new());
    let engine = Arc::new(OkEngine::default());
    let pipeline = pipeline(store.clone(), engine.clone()).with_settings_sync(true);

    // 같은 전략의 조건 행이 여러 개여도 엔진은 전략당 한 번 호출
    let raw = upload(&[("strat_A", "75"), ("strat_B", "50"), ("strat_A", "75")]);
    let outcome = pipeline.run_upload(&raw, d(1), d(9)).await.unwrap();

    let range = DateRange::new(d(1), d(9)).unwrap();
    assert_eq!(
        *engine.calls.lock().unwrap(),
        vec![("strat_A".to_string(), range), ("strat_B".to_string(), range)]
    );
    assert_eq!(outcome.conditions_loaded, 3);
    assert_eq!(store.conditions().await.len(), 3);
    assert_eq!(outcome.settings_upserted, 2);
    assert_eq!(store.get("strat_B").await.unwrap().lot_size, 50);
    assert!(outcome.report.is_all_succeeded());

    // 워크북: 전략당 시트 하나
    let mut workbook =
        calamine::open_workbook_auto_from_rs(Cursor::new(outcome.artifacts.workbook.clone())).unwrap();
    assert_eq!(workbook.sheet_names(), vec!["strat_A".to_string(), "strat_B".to_string()]);
    let sheet = workbook.worksheet_range("strat_A").unwrap();
    assert_eq!(sheet.height(), 4);

    // CSV: (strategy, date) 쌍마다 한 행
    let csv = String::from_utf8(outcome.artifacts.summary_csv.clone()).unwrap();
    let lines: Vec<_> = csv.lines().collect();
    assert_eq!(lines.len(), 1 + 6);
    assert_eq!(lines[0], "strategy_name,trade_date,total_daily_pnl");
    assert_eq!(lines[1], "strat_A,2025-08-01,100");
    assert_eq!(lines[6], "strat_B,2025-08-06,-25");

    // 차트: 전략별 날짜 오름차순
    let series = &outcome.artifacts.chart_series;
    assert_eq!(series.len(), 2);
    let dates: Vec<_> = series[1].points.iter().map(|p| p.date).collect();
    assert_eq!(dates, vec![d(1), d(4), d(6)]);

    // 자산 곡선: 일별 PnL 누적
    let equity = &outcome.artifacts.equity_series;
    assert_eq!(equity.len(), 2);
    let values: Vec<_> = equity[0].points.iter().map(|p| p.value).collect();
    assert_eq!(values, vec![dec!(100), dec!(200), dec!(300)]);
    assert!(outcome.artifacts.portfolio_mtm.is_none());
    assert!(outcome.rejected_rows.is_empty());

    let rollups = &outcome.bundle.strategies[0].rollups;
    assert_eq!(rollups.len(), 3);
    assert_eq!(rollups[0].total_pnl, Some(dec!(100)));
}

#[tokio::test]
async fn bad_row_skipped_and_valid_strategies_run() {
    let store = Arc::new(MemoryConfigStore::new());
    let engine = Arc::new(OkEngine::default());
    let pipeline = pipeline(store.clone(), engine.clone());

    let raw = upload(&[("strat_A", "75"), ("strat_B", "seventy")]);
    let outcome = pipeline.run_upload(&raw, d(1), d(9)).await.unwrap();

    let range = DateRange::new(d(1), d(9)).unwrap();
    assert_eq!(*engine.calls.lock().unwrap(), vec![("strat_A".to_string(), range)]);
    assert_eq!(outcome.conditions_loaded, 1);
    assert_eq!(store.conditions().await.len(), 1);
    assert_eq!(outcome.report.succeeded(), vec!["strat_A"]);

    assert_eq!(outcome.rejected_rows.len(), 1);
    assert_eq!(outcome.rejected_rows[0].line, 3);
    assert!(outcome.rejected_rows[0].to_string().contains("lot_size"));
}

#[tokio::test]
async fn all_rows_rejected_leaves_store_untouched() {
    let store = Arc::new(MemoryConfigStore::new());
    let engine = Arc::new(OkEngine::default());
    let pipeline = pipeline(store.clone(), engine.clone());

    let raw = upload(&[("strat_A", "lots"), ("strat_B", "seventy")]);
    match pipeline.run_upload(&raw, d(1), d(9)).await {
        Err(PipelineError::RejectedRows(failures)) => {
            let lines: Vec<_> = failures.iter().map(|f| f.line).collect();
            assert_eq!(lines, vec![2, 3]);
        }
        other => panic!("unexpected: {other:?}"),
    }
    assert!(store.conditions().await.is_empty());
    assert!(engine.calls.lock().unwrap().is_empty());
}

#[tokio::test]
async fn inverted_range_rejected_before_side_effects() {
    let store = Arc::new(MemoryConfigStore::new());
    let engine = Arc::new(OkEngine::default());
    let pipeline = pipeline(store.clone(), engine.clone());

    let err = pipeline
        .run_upload(&upload(&[("strat_A", "75")]), d(9), d(1))
        .await
        .unwrap_err();
    assert!(matches!(err, PipelineError::Validation(_)));
    assert!(store.conditions().await.is_empty());
    assert!(engine.calls.lock().unwrap().is_empty());
}

#[tokio::test]
async fn truncated_sheet_names_collide() {
    let store = Arc::new(MemoryConfigStore::new());
    let engine = Arc::new(OkEngine::default());
    let pipeline = pipeline(store.clone(), engine.clone()).with_settings_sync(true);

    let raw = upload(&[
        ("nifty_orb_full_candle_breakout_15m", "75"),
        ("nifty_orb_full_candle_breakout_30m", "75"),
    ]);
    let err = pipeline.run_upload(&raw, d(1), d(9)).await.unwrap_err();
    assert!(matches!(
        err,
        PipelineError::Export(ExportError::SheetNameCollision { ref sheet, .. })
            if sheet == "nifty_orb_full_candle_breakout_"
    ));
    // 엔진 호출이나 저장 전에 거부
    assert!(store.conditions().await.is_empty());
    assert!(store.strategy_names().await.unwrap().is_empty());
    assert!(engine.calls.lock().unwrap().is_empty());
}

#[tokio::test]
async fn forbidden_sheet_character_rejected_before_side_effects() {
    let store = Arc::new(MemoryConfigStore::new());
    let engine = Arc::new(OkEngine::default());
    let pipeline = pipeline(store.clone(), engine.clone());

    let raw = upload(&[("orb_9:20", "75")]);
    let err = pipeline.run_upload(&raw, d(1), d(9)).await.unwrap_err();
    assert!(matches!(
        err,
        PipelineError::Export(ExportError::Validation(ValidationError::InvalidValue { .. }))
    ));
    assert!(store.conditions().await.is_empty());
    assert!(engine.calls.lock().unwrap().is_empty());

    let err = pipeline
        .run_stored(&["orb/920".to_string()], d(1), d(9))
        .await
        .unwrap_err();
    assert!(matches!(err, PipelineError::Export(ExportError::Validation(_))));
    assert!(engine.calls.lock().unwrap().is_empty());
}

#[tokio::test]
async fn portfolio_mtm_exported_when_present() {
    let store = Arc::new(MemoryConfigStore::new());
    let engine = Arc::new(OkEngine::default());
    let source = results().with_mtm(vec![
        MtmPoint {
            trade_date: d(4),
            total_pnl: PnlValue::from(dec!(150)),
        },
        MtmPoint {
            trade_date: d(1),
            total_pnl: PnlValue::from(dec!(75)),
        },
    ]);
    let pipeline = pipeline_with(store, engine, source);

    let outcome = pipeline.run_upload(&upload(&[("strat_A", "75")]), d(1), d(9)).await.unwrap();

    let mtm = outcome.artifacts.portfolio_mtm.as_ref().unwrap();
    let points: Vec<_> = mtm.iter().map(|p| (p.date, p.value)).collect();
    assert_eq!(points, vec![(d(1), dec!(75)), (d(4), dec!(150))]);

    let dir = tempfile::tempdir().unwrap();
    outcome.artifacts.write_to_dir(dir.path()).await.unwrap();
    let json: serde_json::Value = serde_json::from_slice(
        &std::fs::read(dir.path().join(orb_analytics::report::CHART_FILE)).unwrap(),
    )
    .unwrap();
    assert_eq!(json["daily"][0]["strategy_name"], "strat_A");
    assert_eq!(json["equity"][0]["points"].as_array().unwrap().len(), 3);
    assert_eq!(json["portfolio_mtm"].as_array().unwrap().len(), 2);
}

#[tokio::test]
async fn stored_strategies_run_without_upload() {
    let store = Arc::new(MemoryConfigStore::new());
    store
        .upsert_strategy_configs(&StrategyConfig::templates())
        .await
        .unwrap();
    let engine = Arc::new(OkEngine::default());
    let pipeline = pipeline(store, engine.clone());

    let outcome = pipeline.run_stored(&[], d(1), d(9)).await.unwrap();
    assert_eq!(outcome.conditions_loaded, 0);
    assert_eq!(
        outcome.report.succeeded(),
        vec!["strat_full_example", "strat_pct_example"]
    );
}

#[test]
fn template_round_trips_through_upload_path() {
    let bytes = template_workbook().unwrap();
    let raw = read_xlsx("strategy_conditions_template.xlsx", &bytes).unwrap();
    let table = Normalizer::new(TableSchema::strategy_conditions(), NormalizeOptions::default())
        .normalize(&raw)
        .unwrap();

    assert!(table.is_clean());
    let configs: Vec<StrategyConfig> = table
        .rows
        .iter()
        .map(StrategyConfig::try_from)
        .collect::<Result<_, _>>()
        .unwrap();
    assert_eq!(configs, StrategyConfig::templates());
}
