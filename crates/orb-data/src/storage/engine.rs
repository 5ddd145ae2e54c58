//! 저장 프로시저 기반 백테스트 엔진.

use async_trait::async_trait;
use orb_core::{BacktestEngine, DateRange, EngineConfig, EngineError, ValidationError};
use tracing::{debug, instrument};

use super::postgres::Database;
use super::sql::quote_qualified;

fn engine_error(err: sqlx::Error) -> EngineError {
    match err {
        sqlx::Error::PoolTimedOut | sqlx::Error::PoolClosed | sqlx::Error::Io(_) => {
            EngineError::Connection(err.to_string())
        }
        sqlx::Error::Database(db_err) => EngineError::Rejected(db_err.message().to_string()),
        other => EngineError::Rejected(other.to_string()),
    }
}

/// `CALL <procedure>(strategy_name, start_date, end_date)`를 실행하는 엔진.
///
/// 호출마다 자체 트랜잭션에서 실행하고 커밋합니다.
pub struct PgBacktestEngine {
    db: Database,
    procedure: String,
}

impl PgBacktestEngine {
    pub fn new(db: Database, config: &EngineConfig) -> Result<Self, ValidationError> {
        Ok(Self {
            db,
            procedure: quote_qualified(&config.procedure)?,
        })
    }
}

#[async_trait]
impl BacktestEngine for PgBacktestEngine {
    #[instrument(skip(self), fields(procedure = %self.procedure, range = %range))]
    async fn run(&self, strategy_name: &str, range: &DateRange) -> Result<(), EngineError> {
        let sql = format!("CALL {}($1, $2, $3)", self.procedure);

        let mut tx = self.db.pool().begin().await.map_err(engine_error)?;
        sqlx::query(&sql)
            .bind(strategy_name)
            .bind(range.start())
            .bind(range.end())
            .execute(&mut *tx)
            .await
            .map_err(engine_error)?;
        tx.commit().await.map_err(engine_error)?;

        debug!("Engine procedure completed");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_classification() {
        assert!(engine_error(sqlx::Error::PoolTimedOut).is_batch_fatal());
        assert!(!engine_error(sqlx::Error::RowNotFound).is_batch_fatal());
    }
}
