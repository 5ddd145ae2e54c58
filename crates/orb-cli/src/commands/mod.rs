//! CLI 명령어 구현 모듈.

pub mod health;
pub mod run;
pub mod template;
pub mod upload;

use anyhow::{Context, Result};
use chrono::NaiveDate;

/// `YYYY-MM-DD` 형식의 날짜를 파싱합니다.
pub fn parse_date(s: &str) -> Result<NaiveDate> {
    NaiveDate::parse_from_str(s.trim(), "%Y-%m-%d")
        .with_context(|| format!("Invalid date format: {}. Expected YYYY-MM-DD", s))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_date() {
        assert_eq!(
            parse_date("2025-08-01").unwrap(),
            NaiveDate::from_ymd_opt(2025, 8, 1).unwrap()
        );
        assert!(parse_date("01-08-2025").is_err());
        assert!(parse_date("2025-02-30").is_err());
    }
}
