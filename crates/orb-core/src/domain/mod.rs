//! 백테스트 하네스의 도메인 모델.

mod dispatch;
mod engine;
mod result_source;
mod strategy;
mod trade;

pub use dispatch::*;
pub use engine::*;
pub use result_source::*;
pub use strategy::*;
pub use trade::*;
