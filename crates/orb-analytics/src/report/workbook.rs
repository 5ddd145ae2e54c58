//! XLSX 워크북.
//!
//! 전략마다 시트 하나, 시트 이름은 전략 이름의 앞 31자입니다.
//! 잘린 이름이 겹치거나 시트 이름에 쓸 수 없는 문자가 있으면 이름을 바꾸지 않고
//! 에러를 반환합니다.

use orb_core::{
    PnlValue, StrategyConfig, TradeRecord, ValidationError, STRATEGY_CONFIG_COLUMNS,
    TRADE_COLUMNS,
};
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use rust_xlsxwriter::{Format, Workbook, Worksheet, XlsxError};
use std::collections::HashMap;

use crate::aggregate::StrategyResults;
use crate::error::ExportError;

/// 시트 이름 최대 길이.
pub const SHEET_NAME_LIMIT: usize = 31;

/// 시트 이름에 쓸 수 없는 문자.
pub const SHEET_NAME_FORBIDDEN: [char; 7] = ['[', ']', ':', '*', '?', '/', '\\'];

fn check_sheet_name(strategy: &str, sheet: &str) -> Result<(), ValidationError> {
    if let Some(ch) = sheet.chars().find(|c| SHEET_NAME_FORBIDDEN.contains(c)) {
        return Err(ValidationError::invalid_value(
            "strategy_name",
            format!("'{}': 시트 이름에 쓸 수 없는 문자 '{}'", strategy, ch),
        ));
    }
    if sheet.starts_with('\'') || sheet.ends_with('\'') {
        return Err(ValidationError::invalid_value(
            "strategy_name",
            format!("'{}': 시트 이름은 작은따옴표로 시작하거나 끝날 수 없습니다", strategy),
        ));
    }
    Ok(())
}

/// 전략 이름을 시트 이름으로 자릅니다 (문자 단위).
pub fn sheet_name(strategy_name: &str) -> String {
    strategy_name.chars().take(SHEET_NAME_LIMIT).collect()
}

/// 시트 이름을 만들고 허용 문자와 충돌을 검사합니다. 시트 이름 비교는 대소문자를 무시합니다.
///
/// 엔진 호출 전에 전략 목록으로 먼저 불러 배치를 빠르게 거부할 수 있습니다.
pub fn sheet_names<'a>(strategies: impl IntoIterator<Item = &'a str>) -> Result<Vec<String>, ExportError> {
    let mut seen: HashMap<String, &str> = HashMap::new();
    let mut names = Vec::new();

    for strategy in strategies {
        let sheet = sheet_name(strategy);
        check_sheet_name(strategy, &sheet)?;
        if let Some(first) = seen.insert(sheet.to_lowercase(), strategy) {
            return Err(ExportError::SheetNameCollision {
                sheet,
                first: first.to_string(),
                second: strategy.to_string(),
            });
        }
        names.push(sheet);
    }

    Ok(names)
}

fn write_decimal(
    sheet: &mut Worksheet,
    row: u32,
    col: u16,
    value: Option<Decimal>,
) -> Result<(), XlsxError> {
    match value {
        Some(v) => match v.to_f64() {
            Some(f) => sheet.write_number(row, col, f).map(|_| ()),
            None => sheet.write_string(row, col, v.to_string()).map(|_| ()),
        },
        None => Ok(()),
    }
}

fn write_text(sheet: &mut Worksheet, row: u32, col: u16, value: Option<&str>) -> Result<(), XlsxError> {
    match value {
        Some(v) => sheet.write_string(row, col, v).map(|_| ()),
        None => Ok(()),
    }
}

fn write_header(sheet: &mut Worksheet, columns: &[&str], bold: &Format) -> Result<(), XlsxError> {
    for (col, name) in columns.iter().enumerate() {
        sheet.write_string_with_format(0, col as u16, *name, bold)?;
    }
    Ok(())
}

fn write_trade(sheet: &mut Worksheet, row: u32, t: &TradeRecord) -> Result<(), XlsxError> {
    let date = |d: chrono::NaiveDate| d.format("%Y-%m-%d").to_string();

    sheet.write_string(row, 0, &t.strategy_name)?;
    sheet.write_string(row, 1, date(t.trade_date))?;
    write_text(sheet, row, 2, t.expiry_date.map(date).as_deref())?;
    write_text(sheet, row, 3, t.breakout_time.as_deref())?;
    write_text(sheet, row, 4, t.entry_time.as_deref())?;
    write_decimal(sheet, row, 5, t.spot_price)?;
    write_text(sheet, row, 6, t.option_type.as_deref())?;
    write_decimal(sheet, row, 7, t.strike)?;
    write_decimal(sheet, row, 8, t.entry_price)?;
    write_decimal(sheet, row, 9, t.sl_level)?;
    if let Some(round) = t.entry_round {
        sheet.write_number(row, 10, round)?;
    }
    write_text(sheet, row, 11, t.leg_type.as_deref())?;
    write_text(sheet, row, 12, t.transaction_type.as_deref())?;
    write_text(sheet, row, 13, t.exit_time.as_deref())?;
    write_decimal(sheet, row, 14, t.exit_price)?;
    write_text(sheet, row, 15, t.exit_reason.as_deref())?;
    match &t.pnl_amount {
        PnlValue::Value(v) => write_decimal(sheet, row, 16, Some(*v))?,
        PnlValue::Missing => {}
        PnlValue::Unparseable(raw) => {
            sheet.write_string(row, 16, raw)?;
        }
    }
    Ok(())
}

/// 전략별 거래 로그 워크북을 만듭니다. 거래가 없는 전략도 헤더만 있는 시트를 가집니다.
pub fn trade_log_workbook(strategies: &[StrategyResults]) -> Result<(Vec<u8>, Vec<String>), ExportError> {
    let names = sheet_names(strategies.iter().map(|s| s.strategy_name.as_str()))?;

    let mut workbook = Workbook::new();
    let bold = Format::new().set_bold();

    for (results, name) in strategies.iter().zip(&names) {
        let sheet = workbook.add_worksheet();
        sheet.set_name(name)?;
        write_header(sheet, &TRADE_COLUMNS, &bold)?;
        for (i, trade) in results.trades.iter().enumerate() {
            write_trade(sheet, i as u32 + 1, trade)?;
        }
    }

    Ok((workbook.save_to_buffer()?, names))
}

/// 업로드용 전략 조건 템플릿 (예시 전략 두 개).
pub fn template_workbook() -> Result<Vec<u8>, ExportError> {
    let mut workbook = Workbook::new();
    let bold = Format::new().set_bold();
    let sheet = workbook.add_worksheet();
    sheet.set_name("strategy_conditions")?;
    write_header(sheet, &STRATEGY_CONFIG_COLUMNS, &bold)?;

    for (i, config) in StrategyConfig::templates().iter().enumerate() {
        write_config(sheet, i as u32 + 1, config)?;
    }

    Ok(workbook.save_to_buffer()?)
}

/// `STRATEGY_CONFIG_COLUMNS` 순서로 씁니다.
fn write_config(sheet: &mut Worksheet, row: u32, c: &StrategyConfig) -> Result<(), XlsxError> {
    sheet.write_string(row, 0, &c.strategy_name)?;
    sheet.write_number(row, 1, c.big_candle_tf)?;
    sheet.write_number(row, 2, c.small_candle_tf)?;
    sheet.write_string(row, 3, c.preferred_breakout_type.as_str())?;
    write_decimal(sheet, row, 4, Some(c.breakout_threshold_pct))?;
    write_decimal(sheet, row, 5, Some(c.option_entry_price_cap))?;
    write_decimal(sheet, row, 6, Some(c.hedge_entry_price_cap))?;
    sheet.write_number(row, 7, c.num_entry_legs)?;
    sheet.write_number(row, 8, c.num_hedge_legs)?;
    write_decimal(sheet, row, 9, Some(c.sl_percentage))?;
    sheet.write_string(row, 10, c.eod_time.format("%H:%M:%S").to_string())?;
    sheet.write_number(row, 11, c.lot_size)?;
    write_decimal(sheet, row, 12, Some(c.hedge_exit_entry_ratio))?;
    write_decimal(sheet, row, 13, Some(c.hedge_exit_multiplier))?;
    write_decimal(sheet, row, 14, Some(c.leg_profit_pct))?;
    write_decimal(sheet, row, 15, Some(c.portfolio_profit_target_pct))?;
    write_decimal(sheet, row, 16, Some(c.portfolio_stop_loss_pct))?;
    write_decimal(sheet, row, 17, Some(c.portfolio_capital))?;
    sheet.write_number(row, 18, c.max_reentry_rounds)?;
    sheet.write_string(row, 19, c.sl_type.as_str())?;
    write_decimal(sheet, row, 20, c.box_sl_trigger_pct)?;
    write_decimal(sheet, row, 21, c.box_sl_hard_pct)?;
    write_text(
        sheet,
        row,
        22,
        c.reentry_breakout_type.as_ref().map(|b| b.as_str()),
    )?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sheet_name_truncates_by_chars() {
        let long = "nifty_orb_full_candle_breakout_15m_v2";
        assert_eq!(sheet_name(long), "nifty_orb_full_candle_breakout_");
        assert_eq!(sheet_name(long).chars().count(), 31);
        assert_eq!(sheet_name("strat_A"), "strat_A");
        assert_eq!(sheet_name(&"é".repeat(40)).chars().count(), 31);
    }

    #[test]
    fn test_collision_reported_not_renamed() {
        let a = "nifty_orb_full_candle_breakout_15m";
        let b = "nifty_orb_full_candle_breakout_30m";
        match sheet_names([a, b]) {
            Err(ExportError::SheetNameCollision { sheet, first, second }) => {
                assert_eq!(sheet, "nifty_orb_full_candle_breakout_");
                assert_eq!(first, a);
                assert_eq!(second, b);
            }
            other => panic!("unexpected: {other:?}"),
        }

        assert!(matches!(
            sheet_names(["Strat_A", "strat_a"]),
            Err(ExportError::SheetNameCollision { .. })
        ));
    }

    #[test]
    fn test_forbidden_sheet_characters_rejected() {
        for name in ["orb_9:20", "a/b", "x[1]", "what?", "back\\slash", "'quoted'"] {
            assert!(
                matches!(
                    sheet_names([name]),
                    Err(ExportError::Validation(ValidationError::InvalidValue { .. }))
                ),
                "{name} accepted"
            );
        }
        assert!(sheet_names(["orb_0920", "it's_fine"]).is_ok());
    }
}
