//! 리포트 내보내기.
//!
//! - [`workbook`]: 전략별 거래 로그 워크북, 업로드 템플릿
//! - [`csv`]: 일별 요약 CSV, 거래 로그 CSV
//! - [`chart`]: 전략별 일별 PnL / 누적 시리즈, 포트폴리오 MTM 곡선

pub mod chart;
pub mod csv;
pub mod workbook;

pub use chart::{cumulative_series, daily_series, mtm_series, ChartPoint, ChartSeries};
pub use self::csv::{summary_csv, trades_csv};
pub use workbook::{
    sheet_name, sheet_names, template_workbook, trade_log_workbook, SHEET_NAME_FORBIDDEN,
    SHEET_NAME_LIMIT,
};

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{info, instrument};

use crate::aggregate::ResultBundle;
use crate::error::ExportError;

/// 워크북 파일 이름.
pub const WORKBOOK_FILE: &str = "backtest_trade_logs.xlsx";
/// 일별 요약 CSV 파일 이름.
pub const SUMMARY_FILE: &str = "strategy_daily_summary.csv";
/// 차트 시리즈 JSON 파일 이름.
pub const CHART_FILE: &str = "chart_series.json";

/// 내보내기 결과물.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReportArtifacts {
    /// XLSX 바이트
    #[serde(skip)]
    pub workbook: Vec<u8>,
    /// 워크북 시트 이름 (전략 순서)
    pub sheet_names: Vec<String>,
    /// UTF-8 CSV 바이트
    #[serde(skip)]
    pub summary_csv: Vec<u8>,
    /// 전략별 일별 PnL
    pub chart_series: Vec<ChartSeries>,
    /// 전략별 누적 PnL (자산 곡선)
    pub equity_series: Vec<ChartSeries>,
    /// 포트폴리오 MTM 곡선 (뷰가 설정된 경우)
    pub portfolio_mtm: Option<Vec<ChartPoint>>,
}

/// `chart_series.json` 형태.
#[derive(Serialize)]
struct ChartFile<'a> {
    daily: &'a [ChartSeries],
    equity: &'a [ChartSeries],
    portfolio_mtm: Option<&'a [ChartPoint]>,
}

impl ReportArtifacts {
    /// 결과물을 디렉터리에 씁니다. 작성한 파일 경로를 반환합니다.
    pub async fn write_to_dir(&self, dir: &Path) -> Result<Vec<PathBuf>, ExportError> {
        tokio::fs::create_dir_all(dir).await?;

        let chart_json = serde_json::to_vec_pretty(&ChartFile {
            daily: &self.chart_series,
            equity: &self.equity_series,
            portfolio_mtm: self.portfolio_mtm.as_deref(),
        })
        .map_err(|e| ExportError::Json(e.to_string()))?;

        let files = [
            (WORKBOOK_FILE, self.workbook.as_slice()),
            (SUMMARY_FILE, self.summary_csv.as_slice()),
            (CHART_FILE, chart_json.as_slice()),
        ];

        let mut written = Vec::with_capacity(files.len());
        for (name, bytes) in files {
            let path = dir.join(name);
            tokio::fs::write(&path, bytes).await?;
            written.push(path);
        }

        info!(dir = %dir.display(), files = written.len(), "Report written");
        Ok(written)
    }
}

/// 리포트 내보내기.
#[derive(Debug, Clone, Copy, Default)]
pub struct ReportExporter;

impl ReportExporter {
    pub fn new() -> Self {
        Self
    }

    /// 결과 묶음에서 워크북, 요약 CSV, 일별 / 누적 차트 시리즈, MTM 곡선을 만듭니다.
    ///
    /// 시트 이름 충돌이 있으면 아무것도 만들지 않고 실패합니다.
    #[instrument(skip(self, bundle), fields(strategies = bundle.strategies.len()))]
    pub fn export(&self, bundle: &ResultBundle) -> Result<ReportArtifacts, ExportError> {
        let (workbook, sheet_names) = trade_log_workbook(&bundle.strategies)?;
        let summary_csv = summary_csv(&bundle.daily_summary)?;
        let chart_series = daily_series(&bundle.daily_summary, &bundle.strategy_names());
        let equity_series = chart_series.iter().map(cumulative_series).collect();
        let portfolio_mtm = bundle.portfolio_mtm.as_deref().map(mtm_series);

        info!(
            sheets = sheet_names.len(),
            summary_rows = bundle.daily_summary.len(),
            "Report exported"
        );

        Ok(ReportArtifacts {
            workbook,
            sheet_names,
            summary_csv,
            chart_series,
            equity_series,
            portfolio_mtm,
        })
    }
}
