//! 차트 시리즈.
//!
//! 전략별 `(날짜, 값)` 시리즈입니다. 빈 날짜를 채우지 않으며, 숫자가 아닌
//! PnL은 점에서 제외합니다.

use chrono::NaiveDate;
use orb_core::{DailySummary, MtmPoint, PnlValue};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// 차트 데이터 포인트.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChartPoint {
    pub date: NaiveDate,
    pub value: Decimal,
}

/// 전략 하나의 시리즈.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChartSeries {
    pub strategy_name: String,
    /// 날짜 오름차순
    pub points: Vec<ChartPoint>,
}

/// 일별 요약에서 전략별 일별 PnL 시리즈를 만듭니다. 시리즈 순서는 `strategies`를 따릅니다.
pub fn daily_series(summary: &[DailySummary], strategies: &[&str]) -> Vec<ChartSeries> {
    strategies
        .iter()
        .map(|&name| {
            let mut points: Vec<ChartPoint> = summary
                .iter()
                .filter(|s| s.strategy_name == name)
                .filter_map(|s| match s.total_daily_pnl {
                    PnlValue::Value(value) => Some(ChartPoint {
                        date: s.trade_date,
                        value,
                    }),
                    _ => None,
                })
                .collect();
            points.sort_by_key(|p| p.date);

            ChartSeries {
                strategy_name: name.to_string(),
                points,
            }
        })
        .collect()
}

/// 누적(자산 곡선) 시리즈.
pub fn cumulative_series(series: &ChartSeries) -> ChartSeries {
    let mut running = Decimal::ZERO;
    ChartSeries {
        strategy_name: series.strategy_name.clone(),
        points: series
            .points
            .iter()
            .map(|p| {
                running += p.value;
                ChartPoint {
                    date: p.date,
                    value: running,
                }
            })
            .collect(),
    }
}

/// 포트폴리오 MTM 곡선. 날짜 오름차순이며 숫자가 아닌 점은 제외합니다.
pub fn mtm_series(points: &[MtmPoint]) -> Vec<ChartPoint> {
    let mut series: Vec<ChartPoint> = points
        .iter()
        .filter_map(|p| match p.total_pnl {
            PnlValue::Value(value) => Some(ChartPoint {
                date: p.trade_date,
                value,
            }),
            _ => None,
        })
        .collect();
    series.sort_by_key(|p| p.date);
    series
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn d(day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 8, day).unwrap()
    }

    #[test]
    fn test_series_skip_non_numeric_without_gap_fill() {
        let summary = vec![
            DailySummary::new("a", d(4), PnlValue::from(dec!(30))),
            DailySummary::new("a", d(1), PnlValue::from(dec!(-10))),
            DailySummary::new("a", d(2), PnlValue::Unparseable("n/a".to_string())),
            DailySummary::new("b", d(1), PnlValue::Missing),
        ];
        let series = daily_series(&summary, &["a", "b"]);

        assert_eq!(series.len(), 2);
        let dates: Vec<_> = series[0].points.iter().map(|p| p.date).collect();
        assert_eq!(dates, vec![d(1), d(4)]);
        assert!(series[1].points.is_empty());

        let equity = cumulative_series(&series[0]);
        assert_eq!(equity.points[1].value, dec!(20));
    }

    #[test]
    fn test_mtm_series_sorted_and_numeric_only() {
        let points = vec![
            MtmPoint {
                trade_date: d(5),
                total_pnl: PnlValue::from(dec!(1200)),
            },
            MtmPoint {
                trade_date: d(2),
                total_pnl: PnlValue::Unparseable("#DIV/0".to_string()),
            },
            MtmPoint {
                trade_date: d(1),
                total_pnl: PnlValue::from(dec!(-300)),
            },
        ];
        let series = mtm_series(&points);
        let dates: Vec<_> = series.iter().map(|p| p.date).collect();
        assert_eq!(dates, vec![d(1), d(5)]);
        assert_eq!(series[1].value, dec!(1200));
    }
}
