//! 디스패치 보고서.

use serde::{Deserialize, Serialize};

use crate::types::DateRange;

/// 전략 한 건의 실행 결과.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum RunStatus {
    Succeeded,
    Failed { reason: String },
}

impl RunStatus {
    pub fn is_succeeded(&self) -> bool {
        matches!(self, RunStatus::Succeeded)
    }
}

/// 보고서의 한 항목.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DispatchEntry {
    pub strategy_name: String,
    pub status: RunStatus,
    /// 엔진 호출 소요 시간 (밀리초)
    pub elapsed_ms: u64,
}

/// `run_all` 결과. 항목 순서는 입력 전략 순서와 같습니다.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DispatchReport {
    pub range: DateRange,
    pub entries: Vec<DispatchEntry>,
}

impl DispatchReport {
    pub fn new(range: DateRange) -> Self {
        Self {
            range,
            entries: Vec::new(),
        }
    }

    pub fn push(&mut self, strategy_name: impl Into<String>, status: RunStatus, elapsed_ms: u64) {
        self.entries.push(DispatchEntry {
            strategy_name: strategy_name.into(),
            status,
            elapsed_ms,
        });
    }

    /// 성공한 전략 이름 (입력 순서).
    pub fn succeeded(&self) -> Vec<&str> {
        self.entries
            .iter()
            .filter(|e| e.status.is_succeeded())
            .map(|e| e.strategy_name.as_str())
            .collect()
    }

    /// 실패한 전략과 사유 (입력 순서).
    pub fn failed(&self) -> Vec<(&str, &str)> {
        self.entries
            .iter()
            .filter_map(|e| match &e.status {
                RunStatus::Failed { reason } => Some((e.strategy_name.as_str(), reason.as_str())),
                RunStatus::Succeeded => None,
            })
            .collect()
    }

    pub fn is_all_succeeded(&self) -> bool {
        self.entries.iter().all(|e| e.status.is_succeeded())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    #[test]
    fn test_report_partitions_preserve_order() {
        let range = DateRange::new(
            NaiveDate::from_ymd_opt(2025, 8, 1).unwrap(),
            NaiveDate::from_ymd_opt(2025, 8, 9).unwrap(),
        )
        .unwrap();
        let mut report = DispatchReport::new(range);
        report.push("c", RunStatus::Succeeded, 10);
        report.push("a", RunStatus::Failed { reason: "boom".to_string() }, 3);
        report.push("b", RunStatus::Succeeded, 7);

        assert_eq!(report.succeeded(), vec!["c", "b"]);
        assert_eq!(report.failed(), vec![("a", "boom")]);
        assert!(!report.is_all_succeeded());
    }
}
