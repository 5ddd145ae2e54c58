//! 지수 / 옵션 1분봉 적재.
//!
//! 업로드 파일 하나가 트랜잭션 하나입니다. 파일 중간에 실패하면 그 파일 전체가 롤백됩니다.

use chrono::{NaiveDate, NaiveTime};
use orb_core::{IngestConfig, TablesConfig, ValidationError};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::{info, instrument};

use super::postgres::Database;
use super::sql::quote_qualified;
use crate::error::StoreResult;
use crate::ingest::convert::Fields;
use crate::ingest::{NormalizedRow, NormalizedTable};

/// 다중 행 INSERT 한 번에 넣을 최대 행 수.
const CHUNK_SIZE: usize = 1000;

/// 지수 1분봉.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndexCandle {
    pub date: NaiveDate,
    pub time: NaiveTime,
    pub open: Decimal,
    pub high: Decimal,
    pub low: Decimal,
    pub close: Decimal,
    pub volume: Option<Decimal>,
    pub oi: Option<Decimal>,
}

/// 옵션 레그 1분봉.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OptionCandle {
    pub date: NaiveDate,
    pub expiry: Option<NaiveDate>,
    pub strike: Decimal,
    /// 재매핑된 옵션 유형 (`C`, `P`, 또는 원본 값)
    pub option_type: String,
    pub time: NaiveTime,
    pub open: Decimal,
    pub high: Decimal,
    pub low: Decimal,
    pub close: Decimal,
    pub volume: Option<Decimal>,
    pub oi: Option<Decimal>,
}

impl TryFrom<&NormalizedRow> for IndexCandle {
    type Error = ValidationError;

    fn try_from(row: &NormalizedRow) -> Result<Self, Self::Error> {
        let f = Fields(row);
        Ok(Self {
            date: f.date("date")?,
            time: f.time("time")?,
            open: f.decimal("open")?,
            high: f.decimal("high")?,
            low: f.decimal("low")?,
            close: f.decimal("close")?,
            volume: f.opt_decimal("volume")?,
            oi: f.opt_decimal("oi")?,
        })
    }
}

impl TryFrom<&NormalizedRow> for OptionCandle {
    type Error = ValidationError;

    fn try_from(row: &NormalizedRow) -> Result<Self, Self::Error> {
        let f = Fields(row);
        Ok(Self {
            date: f.date("date")?,
            expiry: f.opt_date("expiry")?,
            strike: f.decimal("strike")?,
            option_type: f.text("option_type")?,
            time: f.time("time")?,
            open: f.decimal("open")?,
            high: f.decimal("high")?,
            low: f.decimal("low")?,
            close: f.decimal("close")?,
            volume: f.opt_decimal("volume")?,
            oi: f.opt_decimal("oi")?,
        })
    }
}

/// 정규화된 테이블의 모든 행을 변환합니다.
pub fn candles_from_table<T>(table: &NormalizedTable) -> Result<Vec<T>, ValidationError>
where
    T: for<'a> TryFrom<&'a NormalizedRow, Error = ValidationError>,
{
    table.rows.iter().map(T::try_from).collect()
}

/// 시세 테이블 적재기.
pub struct MarketDataStore {
    db: Database,
    index_table: String,
    option_table: String,
    instrument_code: String,
}

impl MarketDataStore {
    pub fn new(db: Database, tables: &TablesConfig, ingest: &IngestConfig) -> StoreResult<Self> {
        Ok(Self {
            db,
            index_table: quote_qualified(&tables.index_candles)?,
            option_table: quote_qualified(&tables.option_candles)?,
            instrument_code: ingest.instrument_code.clone(),
        })
    }

    /// 지수 캔들을 삽입합니다.
    #[instrument(skip(self, candles), fields(count = candles.len()))]
    pub async fn insert_index_candles(&self, candles: &[IndexCandle]) -> StoreResult<usize> {
        if candles.is_empty() {
            return Ok(0);
        }

        let mut tx = self.db.pool().begin().await?;
        let mut inserted = 0;

        for chunk in candles.chunks(CHUNK_SIZE) {
            let sql = format!(
                "INSERT INTO {} (date, time, open, high, low, close, volume, oi, option_nm) VALUES {}",
                self.index_table,
                placeholders(chunk.len(), 9)
            );

            let mut query = sqlx::query(&sql);
            for candle in chunk {
                query = query
                    .bind(candle.date)
                    .bind(candle.time)
                    .bind(candle.open)
                    .bind(candle.high)
                    .bind(candle.low)
                    .bind(candle.close)
                    .bind(candle.volume)
                    .bind(candle.oi)
                    .bind(&self.instrument_code);
            }

            let result = query.execute(&mut *tx).await?;
            inserted += result.rows_affected() as usize;
        }

        tx.commit().await?;

        info!(inserted, "Index candles inserted");
        Ok(inserted)
    }

    /// 옵션 캔들을 삽입합니다.
    #[instrument(skip(self, candles), fields(count = candles.len()))]
    pub async fn insert_option_candles(&self, candles: &[OptionCandle]) -> StoreResult<usize> {
        if candles.is_empty() {
            return Ok(0);
        }

        let mut tx = self.db.pool().begin().await?;
        let mut inserted = 0;

        for chunk in candles.chunks(CHUNK_SIZE) {
            let sql = format!(
                "INSERT INTO {} (symbol, date, expiry, strike, option_type, time, open, high, low, close, volume, oi, option_nm) VALUES {}",
                self.option_table,
                placeholders(chunk.len(), 13)
            );

            let mut query = sqlx::query(&sql);
            for candle in chunk {
                query = query
                    .bind(&self.instrument_code)
                    .bind(candle.date)
                    .bind(candle.expiry)
                    .bind(candle.strike)
                    .bind(&candle.option_type)
                    .bind(candle.time)
                    .bind(candle.open)
                    .bind(candle.high)
                    .bind(candle.low)
                    .bind(candle.close)
                    .bind(candle.volume)
                    .bind(candle.oi)
                    .bind(&self.instrument_code);
            }

            let result = query.execute(&mut *tx).await?;
            inserted += result.rows_affected() as usize;
        }

        tx.commit().await?;

        info!(inserted, "Option candles inserted");
        Ok(inserted)
    }
}

/// `($1, $2, ...), ($n+1, ...)` 형태의 다중 행 자리표시자.
fn placeholders(rows: usize, width: usize) -> String {
    (0..rows)
        .map(|r| {
            let base = r * width;
            let params = (1..=width)
                .map(|c| format!("${}", base + c))
                .collect::<Vec<_>>()
                .join(", ");
            format!("({})", params)
        })
        .collect::<Vec<_>>()
        .join(", ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ingest::{FilterMode, NormalizeOptions, Normalizer, RawTable, RowFilter, TableSchema};
    use rust_decimal_macros::dec;

    #[test]
    fn test_placeholders() {
        assert_eq!(placeholders(2, 3), "($1, $2, $3), ($4, $5, $6)");
        assert_eq!(placeholders(1, 1), "($1)");
    }

    #[test]
    fn test_option_candles_from_vendor_rows() {
        let config = IngestConfig::default();
        let raw = RawTable::from_text_rows(
            "NIFTY_01082025.csv",
            &["date", "expiry", "strike", "option_type", "time", "open", "high", "low", "close", "volume", "OI"],
            &[
                &["01-08-2025", "", "Index", "", "09:15:00", "1", "1", "1", "1", "", ""],
                &["01-08-2025", "07-08-2025", "24500", "PE", "09:15:00", "10", "12", "9", "11", "1500", "300"],
            ],
        );
        let table = Normalizer::new(
            TableSchema::option_candles(),
            NormalizeOptions::from_config(&config)
                .with_filter(RowFilter::index_rows(&config, FilterMode::Exclude)),
        )
        .normalize(&raw)
        .unwrap();
        assert_eq!(table.filtered_out, 1);

        let candles: Vec<OptionCandle> = candles_from_table(&table).unwrap();
        assert_eq!(candles.len(), 1);
        assert_eq!(candles[0].option_type, "P");
        assert_eq!(candles[0].strike, dec!(24500));
        assert_eq!(candles[0].expiry, NaiveDate::from_ymd_opt(2025, 8, 7));
        assert_eq!(candles[0].oi, Some(dec!(300)));
    }

    #[test]
    fn test_index_candles_from_vendor_rows() {
        let config = IngestConfig::default();
        let raw = RawTable::from_text_rows(
            "NIFTY_01082025.csv",
            &["date", "time", "open", "high", "low", "close", "volume", "OI", "strike"],
            &[
                &["01-08-2025", "09:15:00", "24700", "24750", "24690", "24720", "", "", "Index"],
                &["01-08-2025", "09:15:00", "10", "12", "9", "11", "1500", "300", "24500"],
            ],
        );
        let table = Normalizer::new(
            TableSchema::index_candles(),
            NormalizeOptions::from_config(&config)
                .with_filter(RowFilter::index_rows(&config, FilterMode::Only)),
        )
        .normalize(&raw)
        .unwrap();

        let candles: Vec<IndexCandle> = candles_from_table(&table).unwrap();
        assert_eq!(candles.len(), 1);
        assert_eq!(candles[0].close, dec!(24720));
        assert_eq!(candles[0].volume, None);
    }
}
