use std::fmt;
use std::sync::Arc;

use crate::core::{Config, ConfigError};
use crate::locks::EntityLocks;
use crate::orders::OrderLifecycle;
use crate::payments::PaymentStateMachine;
use crate::sessions::SessionRegistry;
use crate::storage::{InMemoryStore, OrderStore};
use crate::tables::TableStateMachine;
use crate::tokens::{SecretProvider, StaticSecrets, TokenCodec};
use crate::utils::{Clock, SystemClock};

/// 引擎状态 - 持有所有组件的共享引用
///
/// Cloning is cheap: every component sits behind an `Arc`. The three state
/// machines share one store, one clock and one lock registry, so per-entity
/// serialization holds across them.
///
/// Compound workflows (QR seating, barcode checkout, reports) are methods on
/// this type, see [`crate::workflows`].
#[derive(Clone)]
pub struct EngineState {
    /// 引擎配置
    pub config: Config,
    pub store: Arc<dyn OrderStore>,
    pub clock: Arc<dyn Clock>,
    pub tokens: Arc<TokenCodec>,
    pub locks: Arc<EntityLocks>,
    pub tables: Arc<TableStateMachine>,
    pub orders: Arc<OrderLifecycle>,
    pub payments: Arc<PaymentStateMachine>,
    /// 扫码入座会话
    pub sessions: Arc<SessionRegistry>,
}

impl fmt::Debug for EngineState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EngineState")
            .field("environment", &self.config.environment)
            .field("tax_rate", &self.config.tax_rate)
            .field("tokens", &self.tokens)
            .finish_non_exhaustive()
    }
}

impl EngineState {
    /// Wire every component from explicit collaborators
    pub fn new(
        config: Config,
        store: Arc<dyn OrderStore>,
        clock: Arc<dyn Clock>,
        secrets: Arc<dyn SecretProvider>,
    ) -> Self {
        let locks = Arc::new(EntityLocks::new());
        let tokens = Arc::new(TokenCodec::from_config(&config, secrets, clock.clone()));
        let tables = Arc::new(TableStateMachine::new(
            store.clone(),
            locks.clone(),
            clock.clone(),
        ));
        let orders = Arc::new(OrderLifecycle::new(
            store.clone(),
            locks.clone(),
            clock.clone(),
            config.tax_rate,
        ));
        let payments = Arc::new(PaymentStateMachine::new(
            store.clone(),
            locks.clone(),
            clock.clone(),
            tokens.clone(),
            config.mobile_pay_scheme.clone(),
        ));
        let sessions = Arc::new(SessionRegistry::new(
            clock.clone(),
            config.table_session_ttl_millis(),
        ));

        Self {
            config,
            store,
            clock,
            tokens,
            locks,
            tables,
            orders,
            payments,
            sessions,
        }
    }

    /// System clock and secrets from the config
    pub fn with_store(config: Config, store: Arc<dyn OrderStore>) -> Self {
        let secrets = Arc::new(StaticSecrets::from_config(&config));
        Self::new(config, store, Arc::new(SystemClock), secrets)
    }

    /// 校验配置并以内存存储启动
    pub fn initialize(config: Config) -> Result<Self, ConfigError> {
        config.validate()?;
        tracing::info!(
            environment = %config.environment,
            tax_rate = %config.tax_rate,
            "Order engine initialized"
        );
        Ok(Self::with_store(config, Arc::new(InMemoryStore::new())))
    }
}
