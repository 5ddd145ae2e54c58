//! 업로드 → 저장 → 디스패치 → 집계 → 내보내기 전체 흐름.

use chrono::NaiveDate;
use orb_core::{DateRange, DispatchReport, IngestConfig, StrategyConfig};
use orb_data::{ConfigStore, NormalizeOptions, Normalizer, RawTable, RowError, TableSchema};
use serde::Serialize;
use std::collections::HashSet;
use std::sync::Arc;
use tracing::{info, instrument, warn};

use crate::aggregate::{ResultAggregator, ResultBundle};
use crate::dispatch::BacktestDispatcher;
use crate::error::PipelineError;
use crate::report::{sheet_names, ReportArtifacts, ReportExporter};

/// 실행 결과.
#[derive(Debug, Clone, Serialize)]
pub struct PipelineOutcome {
    /// 조건 테이블에 적재한 행 수 (저장된 전략 실행 시 0)
    pub conditions_loaded: usize,
    /// `strategy_settings`에 upsert한 설정 수
    pub settings_upserted: usize,
    /// 정규화에 실패해 저장/실행에서 빠진 업로드 행
    pub rejected_rows: Vec<RowError>,
    pub report: DispatchReport,
    pub bundle: ResultBundle,
    pub artifacts: ReportArtifacts,
}

/// 전체 흐름 오케스트레이터.
pub struct BacktestPipeline {
    store: Arc<dyn ConfigStore>,
    dispatcher: BacktestDispatcher,
    aggregator: ResultAggregator,
    exporter: ReportExporter,
    ingest: IngestConfig,
    sync_settings: bool,
}

impl BacktestPipeline {
    pub fn new(
        store: Arc<dyn ConfigStore>,
        dispatcher: BacktestDispatcher,
        aggregator: ResultAggregator,
        ingest: IngestConfig,
    ) -> Self {
        Self {
            store,
            dispatcher,
            aggregator,
            exporter: ReportExporter::new(),
            ingest,
            sync_settings: false,
        }
    }

    /// 조건 행을 `StrategyConfig`로 변환해 설정 테이블에도 upsert합니다.
    pub fn with_settings_sync(mut self, enabled: bool) -> Self {
        self.sync_settings = enabled;
        self
    }

    /// 업로드된 조건 테이블로 전체 흐름을 실행합니다.
    ///
    /// 정규화에 실패한 행은 `rejected_rows`로 보고하고 나머지 행으로 계속합니다.
    /// 유효한 행이 하나도 없거나 전략 이름을 시트 이름으로 쓸 수 없으면 저장소를
    /// 건드리기 전에 중단합니다.
    #[instrument(skip(self, upload), fields(source = %upload.source))]
    pub async fn run_upload(
        &self,
        upload: &RawTable,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<PipelineOutcome, PipelineError> {
        let range = DateRange::new(start, end)?;

        let normalizer = Normalizer::new(
            TableSchema::strategy_conditions(),
            NormalizeOptions::from_config(&self.ingest),
        );
        let mut table = normalizer.normalize(upload)?;
        let rejected_rows = std::mem::take(&mut table.failures);
        for row in &rejected_rows {
            warn!(line = row.line, error = %row, "Upload row rejected");
        }

        let names = table.distinct_text("strategy_name");
        if names.is_empty() {
            return Err(if rejected_rows.is_empty() {
                PipelineError::NoStrategies
            } else {
                PipelineError::RejectedRows(rejected_rows)
            });
        }
        sheet_names(names.iter().map(String::as_str))?;

        let settings_upserted = if self.sync_settings {
            let mut seen = HashSet::new();
            let configs = table
                .rows
                .iter()
                .map(StrategyConfig::try_from)
                .collect::<Result<Vec<_>, _>>()?
                .into_iter()
                .filter(|c| seen.insert(c.strategy_name.clone()))
                .collect::<Vec<_>>();
            self.store.upsert_strategy_configs(&configs).await?
        } else {
            0
        };

        let conditions_loaded = self.store.replace_conditions(&table).await?;
        info!(
            conditions_loaded,
            settings_upserted,
            rejected = rejected_rows.len(),
            strategies = names.len(),
            "Upload stored"
        );

        let mut outcome = self.dispatch_and_report(&names, range).await?;
        outcome.conditions_loaded = conditions_loaded;
        outcome.settings_upserted = settings_upserted;
        outcome.rejected_rows = rejected_rows;
        Ok(outcome)
    }

    /// 이미 저장된 전략을 실행합니다. `names`가 비어 있으면 저장소의 모든 전략을 실행합니다.
    #[instrument(skip(self, names))]
    pub async fn run_stored(
        &self,
        names: &[String],
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<PipelineOutcome, PipelineError> {
        let range = DateRange::new(start, end)?;

        let names = if names.is_empty() {
            self.store.strategy_names().await?
        } else {
            names.to_vec()
        };
        if names.is_empty() {
            return Err(PipelineError::NoStrategies);
        }
        sheet_names(names.iter().map(String::as_str))?;

        self.dispatch_and_report(&names, range).await
    }

    async fn dispatch_and_report(
        &self,
        names: &[String],
        range: DateRange,
    ) -> Result<PipelineOutcome, PipelineError> {
        let report = self.dispatcher.run_range(names, range).await?;
        for (name, reason) in report.failed() {
            warn!(strategy = name, reason, "Strategy excluded from report");
        }

        let bundle = self.aggregator.collect_succeeded(&report).await?;
        let artifacts = self.exporter.export(&bundle)?;

        Ok(PipelineOutcome {
            conditions_loaded: 0,
            settings_upserted: 0,
            rejected_rows: Vec::new(),
            report,
            bundle,
            artifacts,
        })
    }
}
