//! 결과 집계.
//!
//! 디스패치 후 엔진 결과 뷰를 읽어 하나의 `ResultBundle`로 모읍니다.
//! 저장소의 반환 순서는 신뢰하지 않고 항상 프로세스 안에서 다시 정렬합니다.
//! 숫자로 해석할 수 없는 PnL은 0으로 취급하지 않고 `AggregationIssue`로 남깁니다.

use chrono::NaiveDate;
use orb_core::{
    DailySummary, DateRange, DispatchReport, MtmPoint, PnlValue, ResultSource, TradeRecord,
};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet, HashSet};
use std::sync::Arc;
use tracing::{info, instrument, warn};

use crate::error::AggregationError;

/// 집계 중 발견된 데이터 문제.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AggregationIssue {
    /// 포트폴리오 MTM 문제는 `None`
    pub strategy_name: Option<String>,
    pub trade_date: NaiveDate,
    pub kind: IssueKind,
}

/// 문제 유형.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum IssueKind {
    /// 거래 기록의 `pnl_amount`
    UnparseableTradePnl { raw: String },
    /// 일별 요약의 `total_daily_pnl`
    UnparseableSummaryPnl { raw: String },
    /// MTM 곡선의 `total_pnl`
    UnparseableMtmPnl { raw: String },
}

/// `(trade_date, expiry_date)` 단위 PnL 합계.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PnlRollup {
    pub trade_date: NaiveDate,
    pub expiry_date: Option<NaiveDate>,
    /// 해석 불가 레그가 하나라도 있으면 `None`
    pub total_pnl: Option<Decimal>,
    pub legs: usize,
    pub unparseable_legs: usize,
    /// 값이 없는(NULL) 레그. 합계에서 제외됩니다.
    pub missing_legs: usize,
}

impl PnlRollup {
    /// 거래 기록을 그룹별로 합산합니다. 결과는 `(trade_date, expiry_date)` 오름차순입니다.
    pub fn from_trades(trades: &[TradeRecord]) -> Vec<PnlRollup> {
        let mut groups: BTreeMap<(NaiveDate, Option<NaiveDate>), PnlRollup> = BTreeMap::new();

        for trade in trades {
            let entry = groups
                .entry((trade.trade_date, trade.expiry_date))
                .or_insert_with(|| PnlRollup {
                    trade_date: trade.trade_date,
                    expiry_date: trade.expiry_date,
                    total_pnl: Some(Decimal::ZERO),
                    legs: 0,
                    unparseable_legs: 0,
                    missing_legs: 0,
                });

            entry.legs += 1;
            match &trade.pnl_amount {
                PnlValue::Value(v) => {
                    entry.total_pnl = entry.total_pnl.map(|total| total + v);
                }
                PnlValue::Missing => entry.missing_legs += 1,
                PnlValue::Unparseable(_) => {
                    entry.unparseable_legs += 1;
                    entry.total_pnl = None;
                }
            }
        }

        groups.into_values().collect()
    }

    pub fn is_flagged(&self) -> bool {
        self.unparseable_legs > 0
    }
}

/// 날짜 × 전략 일별 PnL 행렬.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DailyPivot {
    pub dates: Vec<NaiveDate>,
    pub strategies: Vec<String>,
    /// `values[date_index][strategy_index]`
    pub values: Vec<Vec<Option<PnlValue>>>,
}

impl DailyPivot {
    /// 정렬된 일별 요약에서 행렬을 만듭니다. 전략 열 순서는 `strategies`를 따릅니다.
    pub fn from_summary(summary: &[DailySummary], strategies: &[String]) -> Self {
        let dates: Vec<NaiveDate> = summary
            .iter()
            .map(|s| s.trade_date)
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect();

        let mut values = vec![vec![None; strategies.len()]; dates.len()];
        for row in summary {
            let (Ok(d), Some(s)) = (
                dates.binary_search(&row.trade_date),
                strategies.iter().position(|n| *n == row.strategy_name),
            ) else {
                continue;
            };
            values[d][s] = Some(row.total_daily_pnl.clone());
        }

        Self {
            dates,
            strategies: strategies.to_vec(),
            values,
        }
    }

    pub fn value(&self, date: NaiveDate, strategy: &str) -> Option<&PnlValue> {
        let d = self.dates.binary_search(&date).ok()?;
        let s = self.strategies.iter().position(|n| n == strategy)?;
        self.values[d][s].as_ref()
    }
}

/// 한 전략의 결과.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StrategyResults {
    pub strategy_name: String,
    /// `trade_date` 오름차순 (같은 날짜는 조회 순서 유지)
    pub trades: Vec<TradeRecord>,
    pub rollups: Vec<PnlRollup>,
}

/// 리포트에 필요한 모든 결과.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResultBundle {
    pub range: DateRange,
    /// 요청한 전략 순서
    pub strategies: Vec<StrategyResults>,
    /// `(strategy_name, trade_date)` 오름차순
    pub daily_summary: Vec<DailySummary>,
    pub pivot: DailyPivot,
    pub portfolio_mtm: Option<Vec<MtmPoint>>,
    pub issues: Vec<AggregationIssue>,
}

impl ResultBundle {
    pub fn strategy_names(&self) -> Vec<&str> {
        self.strategies
            .iter()
            .map(|s| s.strategy_name.as_str())
            .collect()
    }

    pub fn trades_for(&self, strategy_name: &str) -> Option<&[TradeRecord]> {
        self.strategies
            .iter()
            .find(|s| s.strategy_name == strategy_name)
            .map(|s| s.trades.as_slice())
    }
}

/// 결과 집계기.
pub struct ResultAggregator {
    source: Arc<dyn ResultSource>,
}

impl ResultAggregator {
    pub fn new(source: Arc<dyn ResultSource>) -> Self {
        Self { source }
    }

    /// 날짜 범위를 검증한 뒤 결과를 수집합니다.
    pub async fn collect(
        &self,
        strategy_names: &[String],
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<ResultBundle, AggregationError> {
        let range = DateRange::new(start, end)?;
        self.collect_range(strategy_names, range).await
    }

    /// 디스패치에서 성공한 전략만 수집합니다.
    pub async fn collect_succeeded(
        &self,
        report: &DispatchReport,
    ) -> Result<ResultBundle, AggregationError> {
        let names: Vec<String> = report.succeeded().into_iter().map(str::to_string).collect();
        self.collect_range(&names, report.range).await
    }

    #[instrument(skip(self, strategy_names), fields(strategies = strategy_names.len(), range = %range))]
    pub async fn collect_range(
        &self,
        strategy_names: &[String],
        range: DateRange,
    ) -> Result<ResultBundle, AggregationError> {
        let names = distinct(strategy_names);
        let mut issues = Vec::new();
        let mut strategies = Vec::with_capacity(names.len());

        for name in &names {
            let mut trades = self
                .source
                .trades(name, &range)
                .await
                .map_err(|e| AggregationError::query(format!("trades for {}", name), e))?;

            // 안정 정렬: 같은 날짜의 레그 순서는 유지
            trades.sort_by_key(|t| t.trade_date);

            for trade in &trades {
                if let PnlValue::Unparseable(raw) = &trade.pnl_amount {
                    issues.push(AggregationIssue {
                        strategy_name: Some(name.clone()),
                        trade_date: trade.trade_date,
                        kind: IssueKind::UnparseableTradePnl { raw: raw.clone() },
                    });
                }
            }

            let rollups = PnlRollup::from_trades(&trades);
            strategies.push(StrategyResults {
                strategy_name: name.clone(),
                trades,
                rollups,
            });
        }

        let wanted: HashSet<&str> = names.iter().map(String::as_str).collect();
        let mut daily_summary: Vec<DailySummary> = self
            .source
            .daily_summary(&range)
            .await
            .map_err(|e| AggregationError::query("daily summary", e))?
            .into_iter()
            .filter(|s| wanted.contains(s.strategy_name.as_str()))
            .collect();
        daily_summary.sort_by(|a, b| {
            (a.strategy_name.as_str(), a.trade_date).cmp(&(b.strategy_name.as_str(), b.trade_date))
        });

        for row in &daily_summary {
            if let PnlValue::Unparseable(raw) = &row.total_daily_pnl {
                issues.push(AggregationIssue {
                    strategy_name: Some(row.strategy_name.clone()),
                    trade_date: row.trade_date,
                    kind: IssueKind::UnparseableSummaryPnl { raw: raw.clone() },
                });
            }
        }

        let portfolio_mtm = self
            .source
            .portfolio_mtm(&range)
            .await
            .map_err(|e| AggregationError::query("portfolio mtm", e))?
            .map(|mut points| {
                points.sort_by_key(|p| p.trade_date);
                for point in &points {
                    if let PnlValue::Unparseable(raw) = &point.total_pnl {
                        issues.push(AggregationIssue {
                            strategy_name: None,
                            trade_date: point.trade_date,
                            kind: IssueKind::UnparseableMtmPnl { raw: raw.clone() },
                        });
                    }
                }
                points
            });

        if !issues.is_empty() {
            warn!(issues = issues.len(), "Non-numeric PnL values found");
        }

        let pivot = DailyPivot::from_summary(&daily_summary, &names);
        info!(
            strategies = strategies.len(),
            trades = strategies.iter().map(|s| s.trades.len()).sum::<usize>(),
            summary_rows = daily_summary.len(),
            "Results collected"
        );

        Ok(ResultBundle {
            range,
            strategies,
            daily_summary,
            pivot,
            portfolio_mtm,
            issues,
        })
    }
}

/// 처음 등장한 순서를 유지하며 중복 이름을 제거합니다.
fn distinct(names: &[String]) -> Vec<String> {
    let mut seen = HashSet::new();
    let mut out = Vec::with_capacity(names.len());
    for name in names {
        if seen.insert(name.as_str()) {
            out.push(name.clone());
        } else {
            warn!(strategy = %name, "Duplicate strategy name ignored");
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn d(day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 8, day).unwrap()
    }

    #[test]
    fn test_rollup_groups_by_date_and_expiry() {
        let trades = vec![
            TradeRecord::new("a", d(1), PnlValue::from(dec!(100))).with_expiry(d(7)),
            TradeRecord::new("a", d(1), PnlValue::from(dec!(-40.5))).with_expiry(d(7)),
            TradeRecord::new("a", d(1), PnlValue::from(dec!(10))).with_expiry(d(14)),
            TradeRecord::new("a", d(2), PnlValue::Missing).with_expiry(d(7)),
        ];
        let rollups = PnlRollup::from_trades(&trades);

        assert_eq!(rollups.len(), 3);
        assert_eq!(rollups[0].total_pnl, Some(dec!(59.5)));
        assert_eq!(rollups[0].legs, 2);
        assert_eq!(rollups[1].expiry_date, Some(d(14)));
        assert_eq!(rollups[2].total_pnl, Some(Decimal::ZERO));
        assert_eq!(rollups[2].missing_legs, 1);
    }

    #[test]
    fn test_unparseable_leg_never_counts_as_zero() {
        let trades = vec![
            TradeRecord::new("a", d(1), PnlValue::from(dec!(100))),
            TradeRecord::new("a", d(1), PnlValue::Unparseable("#DIV/0!".to_string())),
        ];
        let rollup = &PnlRollup::from_trades(&trades)[0];

        assert_eq!(rollup.total_pnl, None);
        assert!(rollup.is_flagged());
    }

    #[test]
    fn test_pivot_cells() {
        let summary = vec![
            DailySummary::new("a", d(1), PnlValue::from(dec!(1))),
            DailySummary::new("a", d(2), PnlValue::from(dec!(2))),
            DailySummary::new("b", d(2), PnlValue::from(dec!(3))),
        ];
        let pivot = DailyPivot::from_summary(&summary, &["a".to_string(), "b".to_string()]);

        assert_eq!(pivot.dates, vec![d(1), d(2)]);
        assert_eq!(pivot.value(d(2), "b"), Some(&PnlValue::from(dec!(3))));
        assert_eq!(pivot.value(d(1), "b"), None);
    }

    #[test]
    fn test_distinct_keeps_first() {
        let names: Vec<String> = ["b", "a", "b"].iter().map(|s| s.to_string()).collect();
        assert_eq!(distinct(&names), vec!["b", "a"]);
    }
}
