//! 정규화된 행 → 도메인 타입 변환.

use chrono::{NaiveDate, NaiveTime};
use orb_core::{BreakoutType, StopLossType, StrategyConfig, ValidationError};
use rust_decimal::Decimal;

use super::normalizer::{NormalizedRow, Value};

const MISSING: &str = "값이 없습니다";

/// 행 필드 조회 도우미. 결측과 타입 불일치를 필드 이름과 함께 보고합니다.
pub(crate) struct Fields<'a>(pub(crate) &'a NormalizedRow);

impl<'a> Fields<'a> {
    fn present(&self, field: &str) -> Option<&'a Value> {
        self.0.get(field).filter(|v| !v.is_null())
    }

    pub(crate) fn text(&self, field: &str) -> Result<String, ValidationError> {
        self.opt_text(field)?
            .ok_or_else(|| ValidationError::invalid_value(field, MISSING))
    }

    pub(crate) fn opt_text(&self, field: &str) -> Result<Option<String>, ValidationError> {
        Ok(self.present(field).map(ToString::to_string))
    }

    pub(crate) fn int(&self, field: &str) -> Result<i32, ValidationError> {
        let value = self
            .present(field)
            .ok_or_else(|| ValidationError::invalid_value(field, MISSING))?;
        value
            .as_i64()
            .and_then(|i| i32::try_from(i).ok())
            .ok_or_else(|| ValidationError::invalid_value(field, format!("정수가 아닙니다: {}", value)))
    }

    pub(crate) fn decimal(&self, field: &str) -> Result<Decimal, ValidationError> {
        self.opt_decimal(field)?
            .ok_or_else(|| ValidationError::invalid_value(field, MISSING))
    }

    pub(crate) fn opt_decimal(&self, field: &str) -> Result<Option<Decimal>, ValidationError> {
        match self.present(field) {
            None => Ok(None),
            Some(value) => value
                .as_decimal()
                .map(Some)
                .ok_or_else(|| ValidationError::invalid_value(field, format!("숫자가 아닙니다: {}", value))),
        }
    }

    pub(crate) fn date(&self, field: &str) -> Result<NaiveDate, ValidationError> {
        self.opt_date(field)?
            .ok_or_else(|| ValidationError::invalid_value(field, MISSING))
    }

    pub(crate) fn opt_date(&self, field: &str) -> Result<Option<NaiveDate>, ValidationError> {
        match self.present(field) {
            None => Ok(None),
            Some(value) => value
                .as_date()
                .map(Some)
                .ok_or_else(|| ValidationError::invalid_value(field, format!("날짜가 아닙니다: {}", value))),
        }
    }

    pub(crate) fn time(&self, field: &str) -> Result<NaiveTime, ValidationError> {
        let value = self
            .present(field)
            .ok_or_else(|| ValidationError::invalid_value(field, MISSING))?;
        value
            .as_time()
            .ok_or_else(|| ValidationError::invalid_value(field, format!("시각이 아닙니다: {}", value)))
    }
}

/// 전략 조건 행을 전략 설정으로 변환합니다. 결과는 `validate()`까지 통과한 값입니다.
impl TryFrom<&NormalizedRow> for StrategyConfig {
    type Error = ValidationError;

    fn try_from(row: &NormalizedRow) -> Result<Self, Self::Error> {
        let f = Fields(row);

        let strategy_name = f.text("strategy_name")?.trim().to_string();
        if strategy_name.is_empty() {
            return Err(ValidationError::EmptyStrategyName);
        }

        let config = StrategyConfig {
            strategy_name,
            big_candle_tf: f.int("big_candle_tf")?,
            small_candle_tf: f.int("small_candle_tf")?,
            preferred_breakout_type: BreakoutType::from(f.text("preferred_breakout_type")?),
            breakout_threshold_pct: f.decimal("breakout_threshold_pct")?,
            option_entry_price_cap: f.decimal("option_entry_price_cap")?,
            hedge_entry_price_cap: f.decimal("hedge_entry_price_cap")?,
            num_entry_legs: f.int("num_entry_legs")?,
            num_hedge_legs: f.int("num_hedge_legs")?,
            sl_percentage: f.decimal("sl_percentage")?,
            eod_time: f.time("eod_time")?,
            lot_size: f.int("lot_size")?,
            hedge_exit_entry_ratio: f.decimal("hedge_exit_entry_ratio")?,
            hedge_exit_multiplier: f.decimal("hedge_exit_multiplier")?,
            leg_profit_pct: f.decimal("leg_profit_pct")?,
            portfolio_profit_target_pct: f.decimal("portfolio_profit_target_pct")?,
            portfolio_stop_loss_pct: f.decimal("portfolio_stop_loss_pct")?,
            portfolio_capital: f.decimal("portfolio_capital")?,
            max_reentry_rounds: f.int("max_reentry_rounds")?,
            sl_type: StopLossType::from(f.text("sl_type")?),
            box_sl_trigger_pct: f.opt_decimal("box_sl_trigger_pct")?,
            box_sl_hard_pct: f.opt_decimal("box_sl_hard_pct")?,
            reentry_breakout_type: f.opt_text("reentry_breakout_type")?.map(BreakoutType::from),
        };

        config.validate()?;
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ingest::{NormalizeOptions, Normalizer, RawTable, TableSchema};
    use orb_core::STRATEGY_CONFIG_COLUMNS;
    use rust_decimal_macros::dec;

    const FULL_ROW: [&str; 23] = [
        "strat_A", "15", "5", "full_candle_breakout", "60", "80", "50", "4", "1", "20", "15:20:00",
        "75", "50", "3", "84", "2", "2", "900000", "1", "box", "2", "2", "",
    ];

    fn normalize(rows: &[&[&str]]) -> Vec<NormalizedRow> {
        let table = RawTable::from_text_rows("conditions.csv", &STRATEGY_CONFIG_COLUMNS, rows);
        Normalizer::new(TableSchema::strategy_conditions(), NormalizeOptions::default())
            .normalize(&table)
            .unwrap()
            .rows
    }

    #[test]
    fn test_condition_row_to_config() {
        let rows = normalize(&[&FULL_ROW]);
        let config = StrategyConfig::try_from(&rows[0]).unwrap();

        assert_eq!(config.strategy_name, "strat_A");
        assert_eq!(config.small_candle_tf, 5);
        assert_eq!(config.portfolio_capital, dec!(900000));
        assert_eq!(config.eod_time, NaiveTime::from_hms_opt(15, 20, 0).unwrap());
        assert_eq!(config.sl_type, StopLossType::Box);
        assert_eq!(config.box_sl_hard_pct, Some(dec!(2)));
        assert_eq!(config.reentry_breakout_type, None);
    }

    #[test]
    fn test_missing_field_names_the_column() {
        let mut row = FULL_ROW;
        row[11] = "";
        let rows = normalize(&[&row]);
        let err = StrategyConfig::try_from(&rows[0]).unwrap_err();
        assert_eq!(err, ValidationError::invalid_value("lot_size", MISSING));
    }

    #[test]
    fn test_out_of_range_values_rejected() {
        let mut row = FULL_ROW;
        row[2] = "30";
        let rows = normalize(&[&row]);
        assert!(matches!(
            StrategyConfig::try_from(&rows[0]),
            Err(ValidationError::InvalidValue { .. })
        ));
    }
}
