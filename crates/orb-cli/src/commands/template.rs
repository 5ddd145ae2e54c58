//! 전략 조건 템플릿 명령어.
//!
//! ```bash
//! orb template -o strategy_conditions_template.xlsx
//! ```

use anyhow::{Context, Result};
use orb_analytics::template_workbook;
use std::path::Path;
use tracing::info;

/// 기본 템플릿 파일 이름.
pub const TEMPLATE_FILE: &str = "strategy_conditions_template.xlsx";

/// 예시 전략 두 개가 담긴 업로드 템플릿을 씁니다.
pub async fn write_template(output: &Path) -> Result<usize> {
    let bytes = template_workbook()?;

    if let Some(parent) = output.parent().filter(|p| !p.as_os_str().is_empty()) {
        tokio::fs::create_dir_all(parent).await?;
    }
    tokio::fs::write(output, &bytes)
        .await
        .with_context(|| format!("Failed to write template: {}", output.display()))?;

    info!(path = %output.display(), bytes = bytes.len(), "Template written");
    Ok(bytes.len())
}

#[cfg(test)]
mod tests {
    use super::*;
    use orb_core::IngestConfig;
    use orb_data::{read_table, NormalizeOptions, Normalizer, TableSchema};

    #[tokio::test]
    async fn test_template_is_a_clean_upload() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join(TEMPLATE_FILE);

        write_template(&path).await.unwrap();

        let raw = read_table(&path).await.unwrap();
        let table = Normalizer::new(
            TableSchema::strategy_conditions(),
            NormalizeOptions::from_config(&IngestConfig::default()),
        )
        .normalize(&raw)
        .unwrap();
        assert!(table.is_clean());
        assert_eq!(table.distinct_text("strategy_name").len(), 2);
    }
}
