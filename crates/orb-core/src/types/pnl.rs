//! 저장소에서 읽어온 PnL 값.
//!
//! 숫자로 해석할 수 없는 값은 0으로 바꾸지 않고 `Unparseable`로 보존합니다.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// 강제 변환된 PnL 값.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum PnlValue {
    /// 숫자 값
    Value(Decimal),
    /// 저장소에 값이 없음 (NULL)
    Missing,
    /// 숫자로 해석할 수 없는 원본 값
    Unparseable(String),
}

impl PnlValue {
    /// 저장소의 원본 텍스트를 숫자로 강제 변환합니다.
    pub fn coerce(raw: Option<&str>) -> Self {
        let Some(raw) = raw else {
            return Self::Missing;
        };
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return Self::Missing;
        }

        Decimal::from_str(trimmed)
            .or_else(|_| Decimal::from_scientific(trimmed))
            .map(Self::Value)
            .unwrap_or_else(|_| Self::Unparseable(raw.to_string()))
    }

    pub fn as_decimal(&self) -> Option<Decimal> {
        match self {
            Self::Value(v) => Some(*v),
            _ => None,
        }
    }

    pub fn is_unparseable(&self) -> bool {
        matches!(self, Self::Unparseable(_))
    }
}

impl From<Decimal> for PnlValue {
    fn from(value: Decimal) -> Self {
        Self::Value(value)
    }
}

/// CSV/시트 셀 표기. 결측은 빈 문자열, 해석 불가 값은 원본 그대로.
impl fmt::Display for PnlValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Value(v) => write!(f, "{}", v),
            Self::Missing => Ok(()),
            Self::Unparseable(raw) => write!(f, "{}", raw),
        }
    }
}
