//! 工具模块
//!
//! - [`logger`]: tracing 订阅器初始化
//! - [`clock`]: 可注入时钟

pub mod clock;
pub mod logger;

pub use clock::{Clock, ManualClock, SystemClock};
pub use logger::{init_logger, init_logger_with_file};
