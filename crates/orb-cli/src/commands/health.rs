//! 상태 점검 명령어.

use anyhow::Result;
use orb_core::AppConfig;
use orb_data::{ConfigStore, Database, PgConfigStore};
use tracing::{info, warn};

/// 데이터베이스 연결과 설정 테이블 조회를 확인합니다.
///
/// 연결이 되면 `Ok(true)`, 설정 테이블 조회만 실패하면 `Ok(false)`를 반환합니다.
pub async fn check_health(config: &AppConfig) -> Result<bool> {
    let db = Database::connect(&config.database).await?;
    db.health_check().await?;
    println!("✅ 데이터베이스 연결 정상");

    let store = PgConfigStore::new(db.clone(), &config.tables)?;
    let healthy = match store.strategy_names().await {
        Ok(names) => {
            info!(strategies = names.len(), "Strategy settings readable");
            println!(
                "✅ {} 조회 정상: 저장된 전략 {}개",
                config.tables.strategy_settings,
                names.len()
            );
            true
        }
        Err(e) => {
            warn!(error = %e, "Strategy settings not readable");
            println!("⚠️  {} 조회 실패: {}", config.tables.strategy_settings, e);
            false
        }
    };

    db.close().await;
    Ok(healthy)
}
