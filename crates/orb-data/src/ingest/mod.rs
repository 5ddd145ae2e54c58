//! 업로드 수집: 파일 읽기, 스키마, 정규화, 도메인 변환.

pub mod convert;
pub mod normalizer;
pub mod reader;
pub mod schema;
pub mod table;

pub use normalizer::{
    FilterMode, NormalizeOptions, NormalizedRow, NormalizedTable, Normalizer, OptionTypeMap,
    RowFilter, Value,
};
pub use reader::{read_csv, read_table, read_xlsx};
pub use schema::{ColumnKind, ColumnSpec, ExtraColumns, TableSchema};
pub use table::{Cell, RawRow, RawTable};
