//! 核心模块 - 引擎配置与状态
//!
//! # 模块结构
//!
//! - [`Config`] - 引擎配置
//! - [`EngineState`] - 引擎状态（组件装配）

pub mod config;
pub mod state;

pub use config::{Config, ConfigError};
pub use state::EngineState;
