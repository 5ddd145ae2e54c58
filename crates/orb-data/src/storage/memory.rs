//! 인메모리 저장소 구현 (테스트, 드라이런).

use async_trait::async_trait;
use orb_core::{
    DailySummary, DateRange, MtmPoint, ResultSource, SourceError, StrategyConfig, TradeRecord,
};
use std::collections::{BTreeMap, HashSet};
use tokio::sync::RwLock;
use tracing::debug;

use super::config_store::{condition_columns, validate_for_store, ConfigStore};
use crate::error::StoreResult;
use crate::ingest::{NormalizedRow, NormalizedTable};

/// 인메모리 설정 저장소.
///
/// PostgreSQL 구현과 같은 검증을 거치며, 배치는 전부 반영되거나 전혀 반영되지 않습니다.
#[derive(Debug, Default)]
pub struct MemoryConfigStore {
    configs: RwLock<BTreeMap<String, StrategyConfig>>,
    conditions: RwLock<Vec<NormalizedRow>>,
}

impl MemoryConfigStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn get(&self, strategy_name: &str) -> Option<StrategyConfig> {
        self.configs.read().await.get(strategy_name).cloned()
    }

    pub async fn conditions(&self) -> Vec<NormalizedRow> {
        self.conditions.read().await.clone()
    }
}

#[async_trait]
impl ConfigStore for MemoryConfigStore {
    async fn upsert_strategy_config(&self, config: &StrategyConfig) -> StoreResult<()> {
        self.upsert_strategy_configs(std::slice::from_ref(config))
            .await
            .map(|_| ())
    }

    async fn upsert_strategy_configs(&self, configs: &[StrategyConfig]) -> StoreResult<usize> {
        for config in configs {
            validate_for_store(config)?;
        }

        let mut stored = self.configs.write().await;
        for config in configs {
            stored.insert(config.strategy_name.clone(), config.clone());
        }
        Ok(configs.len())
    }

    async fn replace_conditions(&self, table: &NormalizedTable) -> StoreResult<usize> {
        condition_columns(table)?;

        let mut stored = self.conditions.write().await;
        *stored = table.rows.clone();

        debug!(rows = stored.len(), "Conditions replaced in memory");
        Ok(stored.len())
    }

    async fn strategy_names(&self) -> StoreResult<Vec<String>> {
        Ok(self.configs.read().await.keys().cloned().collect())
    }
}

/// 인메모리 결과 조회기.
///
/// 저장 순서 그대로 반환하므로 호출자의 정렬을 검증하는 데 쓸 수 있습니다.
#[derive(Debug, Default)]
pub struct MemoryResultSource {
    trades: Vec<TradeRecord>,
    summaries: Vec<DailySummary>,
    mtm: Option<Vec<MtmPoint>>,
    failing: HashSet<String>,
}

impl MemoryResultSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_trades(mut self, trades: impl IntoIterator<Item = TradeRecord>) -> Self {
        self.trades.extend(trades);
        self
    }

    pub fn with_summaries(mut self, summaries: impl IntoIterator<Item = DailySummary>) -> Self {
        self.summaries.extend(summaries);
        self
    }

    pub fn with_mtm(mut self, points: Vec<MtmPoint>) -> Self {
        self.mtm = Some(points);
        self
    }

    /// 해당 전략의 거래 조회가 실패하도록 설정합니다.
    pub fn failing_for(mut self, strategy_name: impl Into<String>) -> Self {
        self.failing.insert(strategy_name.into());
        self
    }
}

#[async_trait]
impl ResultSource for MemoryResultSource {
    async fn trades(&self, strategy_name: &str, range: &DateRange) -> Result<Vec<TradeRecord>, SourceError> {
        if self.failing.contains(strategy_name) {
            return Err(SourceError::Query(format!(
                "result view unavailable for {}",
                strategy_name
            )));
        }

        Ok(self
            .trades
            .iter()
            .filter(|t| t.strategy_name == strategy_name && range.contains(t.trade_date))
            .cloned()
            .collect())
    }

    async fn daily_summary(&self, range: &DateRange) -> Result<Vec<DailySummary>, SourceError> {
        Ok(self
            .summaries
            .iter()
            .filter(|s| range.contains(s.trade_date))
            .cloned()
            .collect())
    }

    async fn portfolio_mtm(&self, range: &DateRange) -> Result<Option<Vec<MtmPoint>>, SourceError> {
        Ok(self.mtm.as_ref().map(|points| {
            points
                .iter()
                .filter(|p| range.contains(p.trade_date))
                .cloned()
                .collect()
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::StoreError;
    use chrono::NaiveDate;
    use orb_core::PnlValue;
    use rust_decimal_macros::dec;

    fn range() -> DateRange {
        DateRange::new(
            NaiveDate::from_ymd_opt(2025, 8, 1).unwrap(),
            NaiveDate::from_ymd_opt(2025, 8, 9).unwrap(),
        )
        .unwrap()
    }

    #[tokio::test]
    async fn test_upsert_batch_is_all_or_nothing() {
        let store = MemoryConfigStore::new();
        let mut configs = StrategyConfig::templates();
        configs[1].lot_size = -1;

        let err = store.upsert_strategy_configs(&configs).await.unwrap_err();
        assert!(matches!(err, StoreError::Row { ref key, .. } if key == "strat_pct_example"));
        assert!(store.strategy_names().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_result_source_filters_by_name_and_range() {
        let d = |day| NaiveDate::from_ymd_opt(2025, 8, day).unwrap();
        let source = MemoryResultSource::new().with_trades(vec![
            TradeRecord::new("strat_A", d(3), PnlValue::from(dec!(10))),
            TradeRecord::new("strat_B", d(3), PnlValue::from(dec!(20))),
            TradeRecord::new("strat_A", d(12), PnlValue::from(dec!(30))),
        ]);

        let trades = source.trades("strat_A", &range()).await.unwrap();
        assert_eq!(trades.len(), 1);
        assert_eq!(trades[0].pnl_amount, PnlValue::from(dec!(10)));
        assert_eq!(source.portfolio_mtm(&range()).await.unwrap(), None);
    }
}
