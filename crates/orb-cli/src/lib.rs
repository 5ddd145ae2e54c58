//! ORB 백테스트 CLI 도구 모음.
//!
//! 이 crate는 다음 기능을 제공합니다:
//! - 전략 조건 템플릿 생성
//! - 업로드 / 저장된 전략 백테스트 실행 및 리포트 저장
//! - 지수 / 옵션 1분봉 CSV 폴더 적재
//! - 데이터베이스 상태 점검

pub mod commands;
