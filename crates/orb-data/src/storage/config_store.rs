//! 전략 설정 / 조건 저장소.
//!
//! - 설정: `strategy_name` 기준 upsert. 충돌 시 모든 필드를 덮어씁니다.
//! - 조건: 테이블 비우기 + 일괄 삽입을 한 트랜잭션에서 수행합니다.

use async_trait::async_trait;
use orb_core::{StrategyConfig, TablesConfig, STRATEGY_CONFIG_COLUMNS};
use sqlx::postgres::PgArguments;
use sqlx::query::Query;
use sqlx::{Postgres, Transaction};
use tracing::{debug, info, instrument};

use super::postgres::Database;
use super::sql::{bind_value, quote_ident, quote_qualified};
use crate::error::{StoreError, StoreResult};
use crate::ingest::{NormalizedRow, NormalizedTable, Value};

/// 설정 저장소.
#[async_trait]
pub trait ConfigStore: Send + Sync {
    /// 전략 설정 하나를 upsert합니다.
    async fn upsert_strategy_config(&self, config: &StrategyConfig) -> StoreResult<()>;

    /// 여러 설정을 한 트랜잭션에서 upsert합니다. 하나라도 실패하면 전체 롤백.
    async fn upsert_strategy_configs(&self, configs: &[StrategyConfig]) -> StoreResult<usize>;

    /// 조건 테이블을 비우고 정규화된 행으로 채웁니다. 삽입된 행 수를 반환합니다.
    ///
    /// 빈 테이블을 넘기면 조건 테이블이 비워집니다.
    async fn replace_conditions(&self, table: &NormalizedTable) -> StoreResult<usize>;

    /// 저장된 전략 이름 (정렬됨).
    async fn strategy_names(&self) -> StoreResult<Vec<String>>;
}

/// 조건 행의 오류 키 (`strategy_name (line N)`).
pub(crate) fn row_key(row: &NormalizedRow) -> String {
    match row.get("strategy_name") {
        Some(Value::Text(name)) => format!("{} (line {})", name, row.line),
        _ => format!("line {}", row.line),
    }
}

/// 저장 전 설정 검증. 실패하면 전략 이름을 키로 붙입니다.
pub(crate) fn validate_for_store(config: &StrategyConfig) -> StoreResult<()> {
    config
        .validate()
        .map_err(|e| StoreError::for_row(&config.strategy_name, e.into()))
}

/// 조건 테이블의 컬럼 이름. 통과된 컬럼은 인용 없는 식별자처럼 소문자로 맞춥니다.
pub(crate) fn condition_columns(table: &NormalizedTable) -> StoreResult<Vec<(String, String)>> {
    table
        .columns
        .iter()
        .chain(table.extra_columns.iter())
        .map(|name| {
            quote_ident(&name.to_ascii_lowercase())
                .map(|quoted| (name.clone(), quoted))
                .map_err(StoreError::from)
        })
        .collect()
}

/// PostgreSQL 설정 저장소.
pub struct PgConfigStore {
    db: Database,
    settings_table: String,
    conditions_table: String,
}

impl PgConfigStore {
    /// 테이블 이름은 생성 시 검증/인용됩니다.
    pub fn new(db: Database, tables: &TablesConfig) -> StoreResult<Self> {
        Ok(Self {
            db,
            settings_table: quote_qualified(&tables.strategy_settings)?,
            conditions_table: quote_qualified(&tables.strategy_conditions)?,
        })
    }

    fn upsert_sql(&self) -> String {
        let columns = STRATEGY_CONFIG_COLUMNS.join(", ");
        let placeholders = (1..=STRATEGY_CONFIG_COLUMNS.len())
            .map(|i| format!("${}", i))
            .collect::<Vec<_>>()
            .join(", ");
        let updates = STRATEGY_CONFIG_COLUMNS
            .iter()
            .skip(1)
            .map(|c| format!("{c} = EXCLUDED.{c}"))
            .collect::<Vec<_>>()
            .join(", ");

        format!(
            "INSERT INTO {} ({}) VALUES ({}) ON CONFLICT (strategy_name) DO UPDATE SET {}",
            self.settings_table, columns, placeholders, updates
        )
    }

    async fn upsert_in(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        sql: &str,
        config: &StrategyConfig,
    ) -> StoreResult<()> {
        validate_for_store(config)?;
        bind_config(sqlx::query(sql), config)
            .execute(&mut **tx)
            .await
            .map_err(|e| StoreError::for_row(&config.strategy_name, e.into()))?;
        Ok(())
    }
}

/// `STRATEGY_CONFIG_COLUMNS` 순서로 바인딩합니다.
fn bind_config<'q>(
    query: Query<'q, Postgres, PgArguments>,
    c: &'q StrategyConfig,
) -> Query<'q, Postgres, PgArguments> {
    query
        .bind(&c.strategy_name)
        .bind(c.big_candle_tf)
        .bind(c.small_candle_tf)
        .bind(c.preferred_breakout_type.as_str())
        .bind(c.breakout_threshold_pct)
        .bind(c.option_entry_price_cap)
        .bind(c.hedge_entry_price_cap)
        .bind(c.num_entry_legs)
        .bind(c.num_hedge_legs)
        .bind(c.sl_percentage)
        .bind(c.eod_time)
        .bind(c.lot_size)
        .bind(c.hedge_exit_entry_ratio)
        .bind(c.hedge_exit_multiplier)
        .bind(c.leg_profit_pct)
        .bind(c.portfolio_profit_target_pct)
        .bind(c.portfolio_stop_loss_pct)
        .bind(c.portfolio_capital)
        .bind(c.max_reentry_rounds)
        .bind(c.sl_type.as_str())
        .bind(c.box_sl_trigger_pct)
        .bind(c.box_sl_hard_pct)
        .bind(c.reentry_breakout_type.as_ref().map(|b| b.as_str()))
}

#[async_trait]
impl ConfigStore for PgConfigStore {
    #[instrument(skip(self, config), fields(strategy = %config.strategy_name))]
    async fn upsert_strategy_config(&self, config: &StrategyConfig) -> StoreResult<()> {
        let sql = self.upsert_sql();
        let mut tx = self.db.pool().begin().await?;
        self.upsert_in(&mut tx, &sql, config).await?;
        tx.commit().await?;

        debug!("Strategy config upserted");
        Ok(())
    }

    #[instrument(skip(self, configs), fields(count = configs.len()))]
    async fn upsert_strategy_configs(&self, configs: &[StrategyConfig]) -> StoreResult<usize> {
        if configs.is_empty() {
            return Ok(0);
        }

        let sql = self.upsert_sql();
        let mut tx = self.db.pool().begin().await?;
        for config in configs {
            self.upsert_in(&mut tx, &sql, config).await?;
        }
        tx.commit().await?;

        info!(count = configs.len(), "Strategy configs upserted");
        Ok(configs.len())
    }

    #[instrument(skip(self, table), fields(source = %table.source, rows = table.rows.len()))]
    async fn replace_conditions(&self, table: &NormalizedTable) -> StoreResult<usize> {
        let columns = condition_columns(table)?;
        let column_list = columns
            .iter()
            .map(|(_, quoted)| quoted.as_str())
            .collect::<Vec<_>>()
            .join(", ");

        let mut tx = self.db.pool().begin().await?;
        sqlx::query(&format!("TRUNCATE TABLE {}", self.conditions_table))
            .execute(&mut *tx)
            .await?;

        for row in &table.rows {
            // NULL은 타입 없는 리터럴로 넣어 컬럼 타입을 따르게 함
            let mut placeholders = Vec::with_capacity(columns.len());
            let mut values = Vec::with_capacity(columns.len());
            for (name, _) in &columns {
                match row.get(name) {
                    None | Some(Value::Null) => placeholders.push("NULL".to_string()),
                    Some(value) => {
                        values.push(value);
                        placeholders.push(format!("${}", values.len()));
                    }
                }
            }

            let sql = format!(
                "INSERT INTO {} ({}) VALUES ({})",
                self.conditions_table,
                column_list,
                placeholders.join(", ")
            );
            let query = values
                .into_iter()
                .fold(sqlx::query(&sql), |q, v| bind_value(q, v));
            query
                .execute(&mut *tx)
                .await
                .map_err(|e| StoreError::for_row(row_key(row), e.into()))?;
        }

        tx.commit().await?;

        info!(inserted = table.rows.len(), "Strategy conditions replaced");
        Ok(table.rows.len())
    }

    async fn strategy_names(&self) -> StoreResult<Vec<String>> {
        let names: Vec<(String,)> = sqlx::query_as(&format!(
            "SELECT strategy_name FROM {} ORDER BY strategy_name",
            self.settings_table
        ))
        .fetch_all(self.db.pool())
        .await?;

        Ok(names.into_iter().map(|(n,)| n).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ingest::{NormalizeOptions, Normalizer, RawTable, TableSchema};

    #[test]
    fn test_condition_columns_lowercase_extras() {
        let raw = RawTable::from_text_rows(
            "c.csv",
            &["strategy_name", "lot_size", "Entry_Window"],
            &[&["strat_A", "75", "09:30"]],
        );
        let table = Normalizer::new(TableSchema::strategy_conditions(), NormalizeOptions::default())
            .normalize(&raw)
            .unwrap();

        let columns = condition_columns(&table).unwrap();
        assert_eq!(
            columns,
            vec![
                ("strategy_name".to_string(), "\"strategy_name\"".to_string()),
                ("lot_size".to_string(), "\"lot_size\"".to_string()),
                ("Entry_Window".to_string(), "\"entry_window\"".to_string()),
            ]
        );
        assert_eq!(row_key(&table.rows[0]), "strat_A (line 2)");
    }

    #[test]
    fn test_invalid_config_keyed_by_strategy() {
        let mut bad = StrategyConfig::templates().remove(0);
        bad.strategy_name = "strat_bad".to_string();
        bad.lot_size = -75;

        match validate_for_store(&bad) {
            Err(StoreError::Row { key, message }) => {
                assert_eq!(key, "strat_bad");
                assert!(message.contains("lot_size"), "{message}");
            }
            other => panic!("unexpected: {other:?}"),
        }
        assert!(validate_for_store(&StrategyConfig::templates()[1]).is_ok());
    }

    #[test]
    fn test_condition_columns_reject_unsafe_headers() {
        let raw = RawTable::from_text_rows("c.csv", &["strategy_name", "a;b"], &[&["x", "1"]]);
        let table = Normalizer::new(TableSchema::strategy_conditions(), NormalizeOptions::default())
            .normalize(&raw)
            .unwrap();
        assert!(matches!(condition_columns(&table), Err(StoreError::Validation(_))));
    }
}
