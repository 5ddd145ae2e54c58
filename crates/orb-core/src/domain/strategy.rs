//! 전략 설정.
//!
//! 전략 이름당 정확히 하나의 설정만 유효하며, 재업로드 시 모든 필드가 한 번에
//! 덮어써집니다 (부분 업데이트 없음).

use chrono::NaiveTime;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::ValidationError;

/// `strategy_settings` 테이블 및 템플릿의 컬럼 순서.
pub const STRATEGY_CONFIG_COLUMNS: [&str; 23] = [
    "strategy_name",
    "big_candle_tf",
    "small_candle_tf",
    "preferred_breakout_type",
    "breakout_threshold_pct",
    "option_entry_price_cap",
    "hedge_entry_price_cap",
    "num_entry_legs",
    "num_hedge_legs",
    "sl_percentage",
    "eod_time",
    "lot_size",
    "hedge_exit_entry_ratio",
    "hedge_exit_multiplier",
    "leg_profit_pct",
    "portfolio_profit_target_pct",
    "portfolio_stop_loss_pct",
    "portfolio_capital",
    "max_reentry_rounds",
    "sl_type",
    "box_sl_trigger_pct",
    "box_sl_hard_pct",
    "reentry_breakout_type",
];

/// 돌파 판정 방식.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum BreakoutType {
    /// 캔들 전체 돌파
    FullCandle,
    /// 비율 기반 돌파
    PctBased,
    /// 몸통 돌파
    FullBody,
    /// 종가 돌파
    CloseBreakout,
    /// 엔진이 해석하는 기타 값 (원본 보존)
    Other(String),
}

impl BreakoutType {
    pub fn as_str(&self) -> &str {
        match self {
            Self::FullCandle => "full_candle_breakout",
            Self::PctBased => "pct_based_breakout",
            Self::FullBody => "full_body",
            Self::CloseBreakout => "close_breakout",
            Self::Other(s) => s,
        }
    }
}

impl From<&str> for BreakoutType {
    fn from(s: &str) -> Self {
        match s.trim() {
            "full_candle_breakout" => Self::FullCandle,
            "pct_based_breakout" => Self::PctBased,
            "full_body" => Self::FullBody,
            "close_breakout" => Self::CloseBreakout,
            other => Self::Other(other.to_string()),
        }
    }
}

impl From<String> for BreakoutType {
    fn from(s: String) -> Self {
        Self::from(s.as_str())
    }
}

impl From<BreakoutType> for String {
    fn from(value: BreakoutType) -> Self {
        value.as_str().to_string()
    }
}

impl fmt::Display for BreakoutType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 손절 방식.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum StopLossType {
    /// 일반 시스템 손절
    RegularSystem,
    /// 버퍼가 있는 박스 손절
    BoxWithBuffer,
    /// 고정 손절
    Flat,
    /// 박스 손절
    Box,
    Other(String),
}

impl StopLossType {
    pub fn as_str(&self) -> &str {
        match self {
            Self::RegularSystem => "regular_system_sl",
            Self::BoxWithBuffer => "box_with_buffer_sl",
            Self::Flat => "flat",
            Self::Box => "box",
            Self::Other(s) => s,
        }
    }

    /// 박스 계열 손절인지 확인합니다.
    pub fn is_box(&self) -> bool {
        matches!(self, Self::BoxWithBuffer | Self::Box)
    }
}

impl From<&str> for StopLossType {
    fn from(s: &str) -> Self {
        match s.trim() {
            "regular_system_sl" => Self::RegularSystem,
            "box_with_buffer_sl" => Self::BoxWithBuffer,
            "flat" => Self::Flat,
            "box" => Self::Box,
            other => Self::Other(other.to_string()),
        }
    }
}

impl From<String> for StopLossType {
    fn from(s: String) -> Self {
        Self::from(s.as_str())
    }
}

impl From<StopLossType> for String {
    fn from(value: StopLossType) -> Self {
        value.as_str().to_string()
    }
}

impl fmt::Display for StopLossType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 전략 설정 레코드 (`strategy_settings` 한 행).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StrategyConfig {
    /// 전략 이름 (고유 키)
    pub strategy_name: String,
    /// 기준 캔들 타임프레임 (분)
    pub big_candle_tf: i32,
    /// 진입 캔들 타임프레임 (분)
    pub small_candle_tf: i32,
    pub preferred_breakout_type: BreakoutType,
    pub breakout_threshold_pct: Decimal,
    /// 진입 옵션 프리미엄 상한
    pub option_entry_price_cap: Decimal,
    /// 헤지 옵션 프리미엄 상한
    pub hedge_entry_price_cap: Decimal,
    pub num_entry_legs: i32,
    pub num_hedge_legs: i32,
    pub sl_percentage: Decimal,
    /// 장 마감 청산 시각
    pub eod_time: NaiveTime,
    pub lot_size: i32,
    pub hedge_exit_entry_ratio: Decimal,
    pub hedge_exit_multiplier: Decimal,
    pub leg_profit_pct: Decimal,
    pub portfolio_profit_target_pct: Decimal,
    pub portfolio_stop_loss_pct: Decimal,
    pub portfolio_capital: Decimal,
    pub max_reentry_rounds: i32,
    pub sl_type: StopLossType,
    pub box_sl_trigger_pct: Option<Decimal>,
    pub box_sl_hard_pct: Option<Decimal>,
    pub reentry_breakout_type: Option<BreakoutType>,
}

impl StrategyConfig {
    /// 저장 전 값 범위를 검증합니다.
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.strategy_name.trim().is_empty() {
            return Err(ValidationError::EmptyStrategyName);
        }

        let counts = [
            ("big_candle_tf", self.big_candle_tf),
            ("small_candle_tf", self.small_candle_tf),
            ("num_entry_legs", self.num_entry_legs),
            ("num_hedge_legs", self.num_hedge_legs),
            ("lot_size", self.lot_size),
            ("max_reentry_rounds", self.max_reentry_rounds),
        ];
        for (field, value) in counts {
            if value < 0 {
                return Err(ValidationError::invalid_value(field, "음수일 수 없습니다"));
            }
        }

        let amounts = [
            ("breakout_threshold_pct", Some(self.breakout_threshold_pct)),
            ("option_entry_price_cap", Some(self.option_entry_price_cap)),
            ("hedge_entry_price_cap", Some(self.hedge_entry_price_cap)),
            ("sl_percentage", Some(self.sl_percentage)),
            ("portfolio_capital", Some(self.portfolio_capital)),
            ("box_sl_trigger_pct", self.box_sl_trigger_pct),
            ("box_sl_hard_pct", self.box_sl_hard_pct),
        ];
        for (field, value) in amounts {
            if value.is_some_and(|v| v.is_sign_negative() && !v.is_zero()) {
                return Err(ValidationError::invalid_value(field, "음수일 수 없습니다"));
            }
        }

        if self.small_candle_tf > self.big_candle_tf {
            return Err(ValidationError::invalid_value(
                "small_candle_tf",
                "big_candle_tf보다 클 수 없습니다",
            ));
        }

        Ok(())
    }

    /// 업로드 템플릿에 포함되는 예시 전략.
    pub fn templates() -> Vec<StrategyConfig> {
        let base = StrategyConfig {
            strategy_name: "strat_full_example".to_string(),
            big_candle_tf: 15,
            small_candle_tf: 5,
            preferred_breakout_type: BreakoutType::FullCandle,
            breakout_threshold_pct: dec!(60),
            option_entry_price_cap: dec!(80),
            hedge_entry_price_cap: dec!(50),
            num_entry_legs: 4,
            num_hedge_legs: 1,
            sl_percentage: dec!(20),
            eod_time: NaiveTime::from_hms_opt(15, 20, 0).unwrap_or_default(),
            lot_size: 75,
            hedge_exit_entry_ratio: dec!(50),
            hedge_exit_multiplier: dec!(3),
            leg_profit_pct: dec!(84),
            portfolio_profit_target_pct: dec!(2),
            portfolio_stop_loss_pct: dec!(2),
            portfolio_capital: dec!(900000),
            max_reentry_rounds: 1,
            sl_type: StopLossType::RegularSystem,
            box_sl_trigger_pct: Some(dec!(2)),
            box_sl_hard_pct: Some(dec!(2)),
            reentry_breakout_type: Some(BreakoutType::FullCandle),
        };

        let pct = StrategyConfig {
            strategy_name: "strat_pct_example".to_string(),
            preferred_breakout_type: BreakoutType::PctBased,
            breakout_threshold_pct: dec!(70),
            option_entry_price_cap: dec!(90),
            hedge_entry_price_cap: dec!(60),
            eod_time: NaiveTime::from_hms_opt(15, 29, 0).unwrap_or_default(),
            max_reentry_rounds: 2,
            sl_type: StopLossType::BoxWithBuffer,
            box_sl_trigger_pct: Some(dec!(20)),
            box_sl_hard_pct: Some(dec!(30)),
            reentry_breakout_type: Some(BreakoutType::PctBased),
            ..base.clone()
        };

        vec![base, pct]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_categorical_round_trip() {
        assert_eq!(BreakoutType::from("pct_based_breakout"), BreakoutType::PctBased);
        assert_eq!(BreakoutType::from("close_breakout").as_str(), "close_breakout");
        assert_eq!(
            BreakoutType::from("wick_breakout"),
            BreakoutType::Other("wick_breakout".to_string())
        );
        assert_eq!(StopLossType::from("box").as_str(), "box");
        assert!(StopLossType::from("box_with_buffer_sl").is_box());
        assert!(!StopLossType::Flat.is_box());
    }

    #[test]
    fn test_templates_are_valid() {
        let templates = StrategyConfig::templates();
        assert_eq!(templates.len(), 2);
        assert_eq!(templates[1].strategy_name, "strat_pct_example");
        assert_eq!(templates[1].lot_size, 75);
        for config in &templates {
            config.validate().unwrap();
        }
    }

    #[test]
    fn test_validate_rejects_negative_and_empty() {
        let mut config = StrategyConfig::templates().remove(0);
        config.num_entry_legs = -1;
        assert!(config.validate().is_err());

        let mut config = StrategyConfig::templates().remove(0);
        config.strategy_name = "  ".to_string();
        assert_eq!(config.validate(), Err(ValidationError::EmptyStrategyName));

        let mut config = StrategyConfig::templates().remove(0);
        config.sl_percentage = dec!(-5);
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_serde_categorical_as_string() {
        let json = serde_json::to_value(BreakoutType::FullBody).unwrap();
        assert_eq!(json, serde_json::json!("full_body"));
    }
}
