//! # ORB Core
//!
//! ORB 백테스트 하네스의 핵심 도메인 모델 및 타입을 제공합니다.
//!
//! 이 크레이트는 하네스 전반에서 사용되는 기본 타입을 제공합니다:
//! - 전략 설정 (`StrategyConfig`) 및 범주형 파라미터
//! - 거래 기록 / 일별 요약 / PnL 값
//! - 디스패치 보고서 타입
//! - 외부 백테스트 엔진 및 결과 뷰 trait
//! - 설정 관리
//! - 로깅 인프라

pub mod config;
pub mod domain;
pub mod error;
pub mod logging;
pub mod types;

pub use config::*;
pub use domain::*;
pub use error::*;
pub use logging::*;
pub use types::*;
