//! Order Engine - 餐厅桌台 / 订单 / 支付生命周期状态机
//!
//! # 架构概述
//!
//! 顾客扫桌台二维码入座、下单、请求结账；员工扫支付条码收款、清台。
//! 本 crate 只负责状态规则，不涉及 HTTP 与界面：
//!
//! - **令牌** (`tokens`): HMAC-SHA256 签名、带有效期的二维码 / 条码令牌
//! - **桌台** (`tables`): 桌台状态机
//! - **订单** (`orders`): 订单快照、税额计算、出餐状态
//! - **支付** (`payments`): 单笔支付与整桌结账请求
//! - **会话** (`sessions`): 扫码入座后的桌台会话
//! - **编排** (`workflows`): 扫码入座、扫码结账、报表
//!
//! # 模块结构
//!
//! ```text
//! order-engine/src/
//! ├── core/          # 配置、状态
//! ├── tokens/        # 签名令牌
//! ├── storage/       # 持久化端口、内存实现
//! ├── locks.rs       # 按实体串行化
//! ├── tables/        # 桌台状态机
//! ├── orders/        # 订单生命周期
//! ├── payments/      # 支付状态机
//! ├── sessions.rs    # 桌台会话
//! ├── audit/         # 履历元数据、报表
//! ├── workflows/     # 业务流程编排
//! └── utils/         # 日志、时钟
//! ```

pub mod audit;
pub mod core;
pub mod error;
pub mod locks;
pub mod orders;
pub mod payments;
pub mod sessions;
pub mod storage;
pub mod tables;
pub mod tokens;
pub mod utils;
pub mod workflows;

// Re-export 公共类型
pub use audit::TransitionMeta;
pub use crate::core::{Config, ConfigError, EngineState};
pub use error::{EngineError, EngineResult, ErrorKind, TransitionScope};
pub use locks::{EntityKey, EntityLocks};
pub use orders::OrderLifecycle;
pub use payments::PaymentStateMachine;
pub use sessions::{SessionRegistry, TableSession};
pub use storage::{ChangeSet, HistoryQuery, InMemoryStore, OrderStore, StorageError};
pub use tables::TableStateMachine;
pub use tokens::{PaymentClaims, SecretProvider, StaticSecrets, TableClaims, TokenCodec, TokenError};
pub use utils::{Clock, ManualClock, SystemClock};
pub use workflows::{BarcodeScan, FlowOutcome, Receipt, SeatingOutcome};

// Re-export logger functions
pub use utils::logger::{init_logger, init_logger_with_file};
