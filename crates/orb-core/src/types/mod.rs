//! 하네스 전반에서 사용하는 기본 값 타입.

mod date_range;
mod pnl;

pub use date_range::*;
pub use pnl::*;
