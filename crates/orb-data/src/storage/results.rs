//! 엔진 결과 뷰 조회 (`ResultSource` PostgreSQL 구현).
//!
//! 뷰의 컬럼 타입은 엔진이 정하므로 조회 시 명시적으로 캐스팅합니다.
//! 손익 컬럼은 텍스트로 읽어 `PnlValue::coerce`로 해석합니다.

use async_trait::async_trait;
use chrono::NaiveDate;
use orb_core::{
    DailySummary, DateRange, MtmPoint, PnlValue, ResultSource, SourceError, TradeRecord,
    ValidationError, ViewsConfig,
};
use rust_decimal::Decimal;
use serde_json::Value as JsonValue;
use sqlx::types::Json;
use sqlx::FromRow;
use std::collections::BTreeMap;
use tracing::{debug, instrument};

use super::postgres::Database;
use super::sql::quote_qualified;

fn source_error(err: sqlx::Error) -> SourceError {
    match err {
        sqlx::Error::PoolTimedOut | sqlx::Error::PoolClosed | sqlx::Error::Io(_) => {
            SourceError::Connection(err.to_string())
        }
        other => SourceError::Query(other.to_string()),
    }
}

#[derive(Debug, FromRow)]
struct TradeRow {
    strategy_name: String,
    trade_date: NaiveDate,
    expiry_date: Option<NaiveDate>,
    breakout_time: Option<String>,
    entry_time: Option<String>,
    spot_price: Option<Decimal>,
    option_type: Option<String>,
    strike: Option<Decimal>,
    entry_price: Option<Decimal>,
    sl_level: Option<Decimal>,
    entry_round: Option<i32>,
    leg_type: Option<String>,
    transaction_type: Option<String>,
    exit_time: Option<String>,
    exit_price: Option<Decimal>,
    exit_reason: Option<String>,
    pnl_amount: Option<String>,
}

impl From<TradeRow> for TradeRecord {
    fn from(row: TradeRow) -> Self {
        TradeRecord {
            strategy_name: row.strategy_name,
            trade_date: row.trade_date,
            expiry_date: row.expiry_date,
            breakout_time: row.breakout_time,
            entry_time: row.entry_time,
            spot_price: row.spot_price,
            option_type: row.option_type,
            strike: row.strike,
            entry_price: row.entry_price,
            sl_level: row.sl_level,
            entry_round: row.entry_round,
            leg_type: row.leg_type,
            transaction_type: row.transaction_type,
            exit_time: row.exit_time,
            exit_price: row.exit_price,
            exit_reason: row.exit_reason,
            pnl_amount: PnlValue::coerce(row.pnl_amount.as_deref()),
        }
    }
}

#[derive(Debug, FromRow)]
struct SummaryRow {
    strategy_name: String,
    trade_date: NaiveDate,
    total_daily_pnl: Option<String>,
    extras: Option<Json<BTreeMap<String, JsonValue>>>,
}

/// PostgreSQL 결과 뷰 조회기.
pub struct PgResultSource {
    db: Database,
    trade_view: String,
    summary_view: String,
    mtm_view: Option<String>,
}

impl PgResultSource {
    pub fn new(db: Database, views: &ViewsConfig) -> Result<Self, ValidationError> {
        Ok(Self {
            db,
            trade_view: quote_qualified(&views.trade_results)?,
            summary_view: quote_qualified(&views.daily_summary)?,
            mtm_view: views
                .portfolio_mtm
                .as_deref()
                .map(quote_qualified)
                .transpose()?,
        })
    }
}

#[async_trait]
impl ResultSource for PgResultSource {
    #[instrument(skip(self), fields(range = %range))]
    async fn trades(&self, strategy_name: &str, range: &DateRange) -> Result<Vec<TradeRecord>, SourceError> {
        let sql = format!(
            r#"
            SELECT strategy_name::text AS strategy_name,
                   trade_date::date AS trade_date,
                   expiry_date::date AS expiry_date,
                   breakout_time::text AS breakout_time,
                   entry_time::text AS entry_time,
                   spot_price::numeric AS spot_price,
                   option_type::text AS option_type,
                   strike::numeric AS strike,
                   entry_price::numeric AS entry_price,
                   sl_level::numeric AS sl_level,
                   entry_round::int4 AS entry_round,
                   leg_type::text AS leg_type,
                   transaction_type::text AS transaction_type,
                   exit_time::text AS exit_time,
                   exit_price::numeric AS exit_price,
                   exit_reason::text AS exit_reason,
                   pnl_amount::text AS pnl_amount
            FROM {}
            WHERE strategy_name = $1 AND trade_date BETWEEN $2 AND $3
            ORDER BY trade_date
            "#,
            self.trade_view
        );

        let rows: Vec<TradeRow> = sqlx::query_as(&sql)
            .bind(strategy_name)
            .bind(range.start())
            .bind(range.end())
            .fetch_all(self.db.pool())
            .await
            .map_err(source_error)?;

        debug!(rows = rows.len(), "Fetched trade results");
        Ok(rows.into_iter().map(TradeRecord::from).collect())
    }

    #[instrument(skip(self), fields(range = %range))]
    async fn daily_summary(&self, range: &DateRange) -> Result<Vec<DailySummary>, SourceError> {
        let sql = format!(
            r#"
            SELECT s.strategy_name::text AS strategy_name,
                   s.trade_date::date AS trade_date,
                   s.total_daily_pnl::text AS total_daily_pnl,
                   to_jsonb(s) - 'strategy_name' - 'trade_date' - 'total_daily_pnl' AS extras
            FROM {} s
            WHERE s.trade_date BETWEEN $1 AND $2
            ORDER BY s.strategy_name, s.trade_date
            "#,
            self.summary_view
        );

        let rows: Vec<SummaryRow> = sqlx::query_as(&sql)
            .bind(range.start())
            .bind(range.end())
            .fetch_all(self.db.pool())
            .await
            .map_err(source_error)?;

        debug!(rows = rows.len(), "Fetched daily summary");
        Ok(rows
            .into_iter()
            .map(|row| DailySummary {
                strategy_name: row.strategy_name,
                trade_date: row.trade_date,
                total_daily_pnl: PnlValue::coerce(row.total_daily_pnl.as_deref()),
                extras: row.extras.map(|Json(map)| map).unwrap_or_default(),
            })
            .collect())
    }

    async fn portfolio_mtm(&self, range: &DateRange) -> Result<Option<Vec<MtmPoint>>, SourceError> {
        let Some(view) = &self.mtm_view else {
            return Ok(None);
        };

        let sql = format!(
            "SELECT trade_date::date, total_pnl::text FROM {} WHERE trade_date BETWEEN $1 AND $2 ORDER BY trade_date",
            view
        );
        let rows: Vec<(NaiveDate, Option<String>)> = sqlx::query_as(&sql)
            .bind(range.start())
            .bind(range.end())
            .fetch_all(self.db.pool())
            .await
            .map_err(source_error)?;

        Ok(Some(
            rows.into_iter()
                .map(|(trade_date, total)| MtmPoint {
                    trade_date,
                    total_pnl: PnlValue::coerce(total.as_deref()),
                })
                .collect(),
        ))
    }
}
