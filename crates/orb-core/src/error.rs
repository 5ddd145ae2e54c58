//! 하네스 공통 에러 타입.
//!
//! 부작용이 발생하기 전에 호출자 입력을 거부하는 검증 에러를 정의합니다.

use chrono::NaiveDate;
use thiserror::Error;

/// 호출자 입력 검증 에러.
///
/// 배치 전체를 무효화하므로 어떤 저장소/엔진 호출보다 먼저 반환됩니다.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    /// 종료일이 시작일보다 앞섬
    #[error("잘못된 날짜 범위: {start} > {end}")]
    InvalidDateRange { start: NaiveDate, end: NaiveDate },

    /// 빈 전략 이름
    #[error("전략 이름이 비어 있습니다")]
    EmptyStrategyName,

    /// SQL 식별자로 사용할 수 없는 이름
    #[error("잘못된 식별자: {0}")]
    InvalidIdentifier(String),

    /// 필드 값 오류
    #[error("잘못된 값 ({field}): {message}")]
    InvalidValue { field: String, message: String },
}

impl ValidationError {
    /// 필드 값 오류를 생성합니다.
    pub fn invalid_value(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::InvalidValue {
            field: field.into(),
            message: message.into(),
        }
    }
}

/// 검증 작업을 위한 Result 타입.
pub type ValidationResult<T> = Result<T, ValidationError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = ValidationError::InvalidDateRange {
            start: NaiveDate::from_ymd_opt(2025, 8, 9).unwrap(),
            end: NaiveDate::from_ymd_opt(2025, 8, 1).unwrap(),
        };
        assert!(err.to_string().contains("2025-08-09"));

        let err = ValidationError::invalid_value("lot_size", "not a number");
        assert_eq!(err.to_string(), "잘못된 값 (lot_size): not a number");
    }
}
