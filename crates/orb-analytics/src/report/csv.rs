//! CSV 내보내기 (UTF-8, 헤더 포함).

use orb_core::{DailySummary, TradeRecord, DAILY_SUMMARY_COLUMNS, TRADE_COLUMNS};
use serde_json::Value as JsonValue;
use std::collections::BTreeSet;

use crate::error::ExportError;

fn into_bytes(writer: csv::Writer<Vec<u8>>) -> Result<Vec<u8>, ExportError> {
    writer
        .into_inner()
        .map_err(|e| ExportError::Csv(e.to_string()))
}

fn json_cell(value: Option<&JsonValue>) -> String {
    match value {
        None | Some(JsonValue::Null) => String::new(),
        Some(JsonValue::String(s)) => s.clone(),
        Some(other) => other.to_string(),
    }
}

fn opt<T: ToString>(value: &Option<T>) -> String {
    value.as_ref().map(ToString::to_string).unwrap_or_default()
}

/// 일별 요약 CSV. 고정 컬럼 뒤에 추가 컬럼을 이름 순으로 붙입니다.
pub fn summary_csv(summary: &[DailySummary]) -> Result<Vec<u8>, ExportError> {
    let extras: BTreeSet<&str> = summary
        .iter()
        .flat_map(|s| s.extras.keys().map(String::as_str))
        .collect();

    let mut writer = csv::Writer::from_writer(Vec::new());
    writer.write_record(DAILY_SUMMARY_COLUMNS.iter().copied().chain(extras.iter().copied()))?;

    for row in summary {
        let mut record = vec![
            row.strategy_name.clone(),
            row.trade_date.format("%Y-%m-%d").to_string(),
            row.total_daily_pnl.to_string(),
        ];
        record.extend(extras.iter().map(|key| json_cell(row.extras.get(*key))));
        writer.write_record(&record)?;
    }

    into_bytes(writer)
}

/// 거래 기록 CSV (`backtest_results.csv`).
pub fn trades_csv(trades: &[TradeRecord]) -> Result<Vec<u8>, ExportError> {
    let mut writer = csv::Writer::from_writer(Vec::new());
    writer.write_record(TRADE_COLUMNS)?;

    for t in trades {
        writer.write_record([
            t.strategy_name.clone(),
            t.trade_date.format("%Y-%m-%d").to_string(),
            t.expiry_date
                .map(|d| d.format("%Y-%m-%d").to_string())
                .unwrap_or_default(),
            opt(&t.breakout_time),
            opt(&t.entry_time),
            opt(&t.spot_price),
            opt(&t.option_type),
            opt(&t.strike),
            opt(&t.entry_price),
            opt(&t.sl_level),
            opt(&t.entry_round),
            opt(&t.leg_type),
            opt(&t.transaction_type),
            opt(&t.exit_time),
            opt(&t.exit_price),
            opt(&t.exit_reason),
            t.pnl_amount.to_string(),
        ])?;
    }

    into_bytes(writer)
}
