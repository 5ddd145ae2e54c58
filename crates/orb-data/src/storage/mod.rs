//! 관계형 저장소.
//!
//! - `postgres`: 연결 풀 (`Database`)
//! - `config_store`: 전략 설정 upsert / 조건 테이블 교체
//! - `market_data`: 지수 / 옵션 캔들 적재
//! - `engine`, `results`: 저장 프로시저 엔진 및 결과 뷰
//! - `memory`: 테스트 및 드라이런용 인메모리 구현

pub mod config_store;
pub mod engine;
pub mod market_data;
pub mod memory;
pub mod postgres;
pub mod results;
pub(crate) mod sql;
