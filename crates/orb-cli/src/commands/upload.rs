//! 1분봉 CSV 폴더 적재 명령어.
//!
//! 폴더의 `*.csv` 파일을 이름순으로 하나씩 적재합니다. 파일 단위로 독립적이며,
//! 실패한 파일은 기록만 하고 다음 파일로 넘어갑니다.
//!
//! ```bash
//! orb upload-index -d data/nifty_1min
//! orb upload-options -d data/nifty_1min
//! ```

use anyhow::{anyhow, Context, Result};
use orb_core::{AppConfig, IngestConfig};
use orb_data::{
    candles_from_table, read_table, Database, FilterMode, IndexCandle, MarketDataStore,
    NormalizeOptions, NormalizedTable, Normalizer, OptionCandle, RawTable, RowFilter, TableSchema,
};
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// 적재 대상.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CandleKind {
    /// `strike == Index` 행만
    Index,
    /// `Index` 행을 제외한 옵션 행
    Options,
}

impl CandleKind {
    fn label(self) -> &'static str {
        match self {
            CandleKind::Index => "index",
            CandleKind::Options => "options",
        }
    }
}

/// 폴더 적재 결과.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct UploadSummary {
    /// 발견한 CSV 파일 수
    pub files: usize,
    /// 적재에 성공한 파일 수
    pub succeeded: usize,
    /// 삽입한 행 수
    pub rows: usize,
    /// (파일 이름, 실패 사유)
    pub failed: Vec<(String, String)>,
}

/// 폴더의 CSV 파일을 이름순으로 나열합니다. 확장자는 대소문자를 무시합니다.
pub async fn csv_files(dir: &Path) -> Result<Vec<PathBuf>> {
    let mut entries = tokio::fs::read_dir(dir)
        .await
        .with_context(|| format!("Cannot read folder: {}", dir.display()))?;

    let mut files = Vec::new();
    while let Some(entry) = entries.next_entry().await? {
        let path = entry.path();
        let is_csv = path
            .extension()
            .and_then(|e| e.to_str())
            .is_some_and(|e| e.eq_ignore_ascii_case("csv"));
        if is_csv && entry.file_type().await?.is_file() {
            files.push(path);
        }
    }

    files.sort();
    Ok(files)
}

fn normalize(raw: &RawTable, ingest: &IngestConfig, kind: CandleKind) -> Result<NormalizedTable> {
    let (schema, options) = match kind {
        CandleKind::Index => (
            TableSchema::index_candles(),
            NormalizeOptions::from_config(ingest)
                .without_option_types()
                .with_filter(RowFilter::index_rows(ingest, FilterMode::Only)),
        ),
        CandleKind::Options => (
            TableSchema::option_candles(),
            NormalizeOptions::from_config(ingest)
                .with_filter(RowFilter::index_rows(ingest, FilterMode::Exclude)),
        ),
    };

    let table = Normalizer::new(schema, options).normalize(raw)?;
    if let Some(first) = table.failures.first() {
        return Err(anyhow!(
            "{} row(s) failed normalization; first: {}",
            table.failures.len(),
            first
        ));
    }
    Ok(table)
}

/// 업로드 파일에서 지수 캔들을 만듭니다. 변환 실패 행이 있으면 파일 전체를 거부합니다.
pub fn prepare_index(raw: &RawTable, ingest: &IngestConfig) -> Result<Vec<IndexCandle>> {
    let table = normalize(raw, ingest, CandleKind::Index)?;
    Ok(candles_from_table(&table)?)
}

/// 업로드 파일에서 옵션 캔들을 만듭니다.
pub fn prepare_options(raw: &RawTable, ingest: &IngestConfig) -> Result<Vec<OptionCandle>> {
    let table = normalize(raw, ingest, CandleKind::Options)?;
    Ok(candles_from_table(&table)?)
}

async fn upload_file(
    store: &MarketDataStore,
    ingest: &IngestConfig,
    kind: CandleKind,
    path: &Path,
) -> Result<usize> {
    let raw = read_table(path).await?;
    let inserted = match kind {
        CandleKind::Index => {
            store
                .insert_index_candles(&prepare_index(&raw, ingest)?)
                .await?
        }
        CandleKind::Options => {
            store
                .insert_option_candles(&prepare_options(&raw, ingest)?)
                .await?
        }
    };
    Ok(inserted)
}

/// 폴더의 모든 CSV를 적재합니다. 파일마다 별도 트랜잭션입니다.
pub async fn upload_folder(config: &AppConfig, kind: CandleKind, dir: &Path) -> Result<UploadSummary> {
    let files = csv_files(dir).await?;
    info!(kind = kind.label(), dir = %dir.display(), files = files.len(), "CSV files found");

    let db = Database::connect(&config.database).await?;
    let store = MarketDataStore::new(db.clone(), &config.tables, &config.ingest)?;

    let mut summary = UploadSummary {
        files: files.len(),
        ..Default::default()
    };

    for path in &files {
        let name = path
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or_default()
            .to_string();

        match upload_file(&store, &config.ingest, kind, path).await {
            Ok(rows) => {
                info!(file = %name, rows, "File uploaded");
                summary.succeeded += 1;
                summary.rows += rows;
            }
            Err(e) => {
                warn!(file = %name, error = %e, "File upload failed");
                println!("❌ {} 처리 실패: {}", name, e);
                summary.failed.push((name, e.to_string()));
            }
        }
    }

    db.close().await;
    Ok(summary)
}
