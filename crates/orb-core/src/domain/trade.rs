//! 엔진이 생성한 결과 레코드 (읽기 전용 투영).

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::types::PnlValue;

/// 거래 로그 시트의 컬럼 순서.
pub const TRADE_COLUMNS: [&str; 17] = [
    "strategy_name",
    "trade_date",
    "expiry_date",
    "breakout_time",
    "entry_time",
    "spot_price",
    "option_type",
    "strike",
    "entry_price",
    "sl_level",
    "entry_round",
    "leg_type",
    "transaction_type",
    "exit_time",
    "exit_price",
    "exit_reason",
    "pnl_amount",
];

/// 일별 요약의 고정 컬럼. 나머지 컬럼은 `extras`로 뒤에 붙습니다.
pub const DAILY_SUMMARY_COLUMNS: [&str; 3] = ["strategy_name", "trade_date", "total_daily_pnl"];

/// 레그(옵션 포지션) 단위 거래 기록.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TradeRecord {
    pub strategy_name: String,
    pub trade_date: NaiveDate,
    pub expiry_date: Option<NaiveDate>,
    /// HH:MM:SS
    pub breakout_time: Option<String>,
    pub entry_time: Option<String>,
    pub spot_price: Option<Decimal>,
    pub option_type: Option<String>,
    pub strike: Option<Decimal>,
    pub entry_price: Option<Decimal>,
    pub sl_level: Option<Decimal>,
    pub entry_round: Option<i32>,
    pub leg_type: Option<String>,
    pub transaction_type: Option<String>,
    pub exit_time: Option<String>,
    pub exit_price: Option<Decimal>,
    pub exit_reason: Option<String>,
    pub pnl_amount: PnlValue,
}

impl TradeRecord {
    /// 필수 필드만 채운 레코드를 생성합니다.
    pub fn new(strategy_name: impl Into<String>, trade_date: NaiveDate, pnl_amount: PnlValue) -> Self {
        Self {
            strategy_name: strategy_name.into(),
            trade_date,
            expiry_date: None,
            breakout_time: None,
            entry_time: None,
            spot_price: None,
            option_type: None,
            strike: None,
            entry_price: None,
            sl_level: None,
            entry_round: None,
            leg_type: None,
            transaction_type: None,
            exit_time: None,
            exit_price: None,
            exit_reason: None,
            pnl_amount,
        }
    }

    pub fn with_expiry(mut self, expiry: NaiveDate) -> Self {
        self.expiry_date = Some(expiry);
        self
    }
}

/// 전략별 일별 PnL 요약 (`(strategy_name, trade_date)`당 한 행).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DailySummary {
    pub strategy_name: String,
    pub trade_date: NaiveDate,
    pub total_daily_pnl: PnlValue,
    /// 엔진이 추가로 노출하는 집계 컬럼
    #[serde(default)]
    pub extras: BTreeMap<String, serde_json::Value>,
}

impl DailySummary {
    pub fn new(strategy_name: impl Into<String>, trade_date: NaiveDate, total_daily_pnl: PnlValue) -> Self {
        Self {
            strategy_name: strategy_name.into(),
            trade_date,
            total_daily_pnl,
            extras: BTreeMap::new(),
        }
    }
}

/// 포트폴리오 MTM 곡선의 한 점.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MtmPoint {
    pub trade_date: NaiveDate,
    pub total_pnl: PnlValue,
}
