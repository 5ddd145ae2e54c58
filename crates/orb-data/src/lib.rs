//! 업로드 정규화 및 관계형 저장소.
//!
//! 이 crate는 다음을 제공합니다:
//! - CSV / XLS(X) 업로드를 `RawTable`로 읽는 리더
//! - 스키마 기반 정규화 (`Normalizer`) 및 행 단위 에러 누적
//! - 전략 설정 / 조건 저장소 (`ConfigStore`: PostgreSQL, 인메모리)
//! - 지수 / 옵션 캔들 적재 (`MarketDataStore`)
//! - 저장 프로시저 엔진 및 결과 뷰 구현 (`PgBacktestEngine`, `PgResultSource`)

pub mod error;
pub mod ingest;
pub mod storage;

pub use error::{
    CellProblem, NormalizationError, ProblemKind, ReadError, RowError, StoreError, StoreResult,
};

pub use ingest::{
    read_csv, read_table, read_xlsx, Cell, ColumnKind, ColumnSpec, ExtraColumns, FilterMode,
    NormalizeOptions, NormalizedRow, NormalizedTable, Normalizer, OptionTypeMap, RawRow, RawTable,
    RowFilter, TableSchema, Value,
};

pub use storage::config_store::{ConfigStore, PgConfigStore};
pub use storage::engine::PgBacktestEngine;
pub use storage::market_data::{candles_from_table, IndexCandle, MarketDataStore, OptionCandle};
pub use storage::memory::{MemoryConfigStore, MemoryResultSource};
pub use storage::postgres::Database;
pub use storage::results::PgResultSource;
