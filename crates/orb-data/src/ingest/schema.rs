//! 업로드 스키마 기술자.
//!
//! 컬럼 위치가 아니라 이름으로만 바인딩합니다. 스키마에 없는 컬럼은
//! `ExtraColumns` 정책에 따라 거부되거나 `extras`로 분리됩니다.

use orb_core::STRATEGY_CONFIG_COLUMNS;

/// 정규화 후 값의 타입.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnKind {
    Text,
    Integer,
    Decimal,
    Date,
    Time,
    Bool,
}

/// 기대 컬럼 하나.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnSpec {
    /// 정규 이름 (저장 시 컬럼 이름)
    pub name: String,
    pub kind: ColumnKind,
    /// 헤더에 반드시 있어야 하고 값도 비어 있으면 안 됨
    pub required: bool,
}

impl ColumnSpec {
    pub fn required(name: &str, kind: ColumnKind) -> Self {
        Self {
            name: name.to_string(),
            kind,
            required: true,
        }
    }

    pub fn optional(name: &str, kind: ColumnKind) -> Self {
        Self {
            name: name.to_string(),
            kind,
            required: false,
        }
    }
}

/// 스키마에 없는 컬럼 처리 정책.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExtraColumns {
    /// 테이블 전체를 거부
    Reject,
    /// 헤더 이름 그대로 `extras`에 보존
    PassThrough,
}

/// 기대 스키마.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableSchema {
    pub name: String,
    pub columns: Vec<ColumnSpec>,
    pub extra_columns: ExtraColumns,
}

impl TableSchema {
    pub fn new(name: &str, columns: Vec<ColumnSpec>, extra_columns: ExtraColumns) -> Self {
        Self {
            name: name.to_string(),
            columns,
            extra_columns,
        }
    }

    /// 헤더와 대소문자/공백을 무시하고 일치하는 컬럼을 찾습니다.
    pub fn find(&self, header: &str) -> Option<&ColumnSpec> {
        let header = header.trim();
        self.columns
            .iter()
            .find(|c| c.name.eq_ignore_ascii_case(header))
    }

    /// 전략 조건 업로드. 템플릿 컬럼은 타입을 강제하고 나머지 조건 컬럼은 그대로 통과시킵니다.
    pub fn strategy_conditions() -> Self {
        use ColumnKind::*;

        let columns = STRATEGY_CONFIG_COLUMNS
            .iter()
            .map(|&name| {
                let kind = match name {
                    "strategy_name" | "preferred_breakout_type" | "sl_type" | "reentry_breakout_type" => Text,
                    "big_candle_tf" | "small_candle_tf" | "num_entry_legs" | "num_hedge_legs"
                    | "lot_size" | "max_reentry_rounds" => Integer,
                    "eod_time" => Time,
                    _ => Decimal,
                };
                if name == "strategy_name" {
                    ColumnSpec::required(name, kind)
                } else {
                    ColumnSpec::optional(name, kind)
                }
            })
            .collect();

        Self::new("strategy_conditions", columns, ExtraColumns::PassThrough)
    }

    /// 지수(Index) 1분봉 CSV.
    pub fn index_candles() -> Self {
        use ColumnKind::*;
        Self::new(
            "index_candles",
            vec![
                ColumnSpec::required("date", Date),
                ColumnSpec::required("time", Time),
                ColumnSpec::required("open", Decimal),
                ColumnSpec::required("high", Decimal),
                ColumnSpec::required("low", Decimal),
                ColumnSpec::required("close", Decimal),
                ColumnSpec::optional("volume", Decimal),
                ColumnSpec::optional("oi", Decimal),
                ColumnSpec::optional("strike", Text),
            ],
            ExtraColumns::PassThrough,
        )
    }

    /// 옵션 1분봉 CSV. `Index` 행은 필터로 제외한 뒤 사용합니다.
    pub fn option_candles() -> Self {
        use ColumnKind::*;
        Self::new(
            "option_candles",
            vec![
                ColumnSpec::required("date", Date),
                ColumnSpec::optional("expiry", Date),
                ColumnSpec::required("strike", Decimal),
                ColumnSpec::required("option_type", Text),
                ColumnSpec::required("time", Time),
                ColumnSpec::required("open", Decimal),
                ColumnSpec::required("high", Decimal),
                ColumnSpec::required("low", Decimal),
                ColumnSpec::required("close", Decimal),
                ColumnSpec::optional("volume", Decimal),
                ColumnSpec::optional("oi", Decimal),
            ],
            ExtraColumns::PassThrough,
        )
    }
}
