use crate::utils::logger::init_logger_with_file;
use rust_decimal::Decimal;
use shared::error::{AppError, ErrorCode};
use std::str::FromStr;
use thiserror::Error;

/// 开发环境默认密钥，生产环境必须覆盖
const DEV_TABLE_TOKEN_SECRET: &str = "dev-table-token-secret-change-me";
const DEV_PAYMENT_TOKEN_SECRET: &str = "dev-payment-token-secret-change-me";

/// 配置校验错误
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Tax rate out of range [0, 1]: {0}")]
    TaxRateOutOfRange(Decimal),

    #[error("Token TTL must be positive: {0}")]
    InvalidTtl(&'static str),

    #[error("Empty token secret: {0}")]
    EmptySecret(&'static str),

    #[error("Development secret used in production: {0}")]
    DevelopmentSecret(&'static str),
}

impl ConfigError {
    /// 出错的环境变量名
    pub fn variable(&self) -> &'static str {
        match self {
            Self::TaxRateOutOfRange(_) => "TAX_RATE",
            Self::InvalidTtl(name) | Self::EmptySecret(name) | Self::DevelopmentSecret(name) => *name,
        }
    }
}

impl From<ConfigError> for AppError {
    fn from(err: ConfigError) -> Self {
        AppError::with_message(ErrorCode::ConfigError, err.to_string())
            .with_detail("variable", err.variable())
    }
}

/// 引擎配置 - 订单/支付/桌台状态机的所有配置项
///
/// # 环境变量
///
/// 所有配置项都可以通过环境变量覆盖：
///
/// | 环境变量 | 默认值 | 说明 |
/// |----------|--------|------|
/// | ENVIRONMENT | development | 运行环境 |
/// | TAX_RATE | 0.10 | 税率 |
/// | TABLE_TOKEN_SECRET | (开发密钥) | 桌台二维码签名密钥 |
/// | PAYMENT_TOKEN_SECRET | (开发密钥) | 支付条码签名密钥 |
/// | TABLE_TOKEN_TTL_SECS | 86400 | 桌台令牌有效期(秒) |
/// | PAYMENT_TOKEN_TTL_SECS | 1800 | 支付令牌有效期(秒) |
/// | TABLE_SESSION_TTL_SECS | 43200 | 桌台会话有效期(秒) |
/// | CUSTOMER_BASE_URL | https://example.com/customer/ | 顾客端入口 |
/// | MOBILE_PAY_SCHEME | mobilepay://payment | 移动支付深链 |
/// | STORE_NAME | Mobile Order | 小票店名 |
/// | LOG_LEVEL | info | 日志级别 |
/// | LOG_DIR | (无) | 日志目录 |
/// | LOG_JSON | false | JSON 日志 |
///
/// # 示例
///
/// ```ignore
/// TAX_RATE=0.08 PAYMENT_TOKEN_TTL_SECS=600 cargo run
/// ```
#[derive(Debug, Clone)]
pub struct Config {
    /// 运行环境: development | staging | production
    pub environment: String,
    /// 税率 (0.10 = 10%)
    pub tax_rate: Decimal,
    pub table_token_secret: String,
    pub payment_token_secret: String,
    pub table_token_ttl_secs: u64,
    pub payment_token_ttl_secs: u64,
    /// 扫码入座后会话有效期
    pub table_session_ttl_secs: u64,
    /// 桌台二维码指向的顾客端地址
    pub customer_base_url: String,
    pub mobile_pay_scheme: String,
    pub store_name: String,
    pub log_level: String,
    pub log_dir: Option<String>,
    pub log_json: bool,
}

impl Config {
    /// 先读取 .env 文件，再从环境变量加载
    pub fn load() -> Self {
        if let Err(e) = dotenv::dotenv() {
            tracing::debug!(error = %e, "No .env file loaded");
        }
        Self::from_env()
    }

    /// 从环境变量加载配置
    ///
    /// 如果环境变量未设置或无法解析，使用默认值
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            environment: std::env::var("ENVIRONMENT").unwrap_or(defaults.environment),
            tax_rate: std::env::var("TAX_RATE")
                .ok()
                .and_then(|v| Decimal::from_str(v.trim()).ok())
                .unwrap_or(defaults.tax_rate),
            table_token_secret: std::env::var("TABLE_TOKEN_SECRET")
                .unwrap_or(defaults.table_token_secret),
            payment_token_secret: std::env::var("PAYMENT_TOKEN_SECRET")
                .unwrap_or(defaults.payment_token_secret),
            table_token_ttl_secs: std::env::var("TABLE_TOKEN_TTL_SECS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(defaults.table_token_ttl_secs),
            payment_token_ttl_secs: std::env::var("PAYMENT_TOKEN_TTL_SECS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(defaults.payment_token_ttl_secs),
            table_session_ttl_secs: std::env::var("TABLE_SESSION_TTL_SECS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(defaults.table_session_ttl_secs),
            customer_base_url: std::env::var("CUSTOMER_BASE_URL")
                .unwrap_or(defaults.customer_base_url),
            mobile_pay_scheme: std::env::var("MOBILE_PAY_SCHEME")
                .unwrap_or(defaults.mobile_pay_scheme),
            store_name: std::env::var("STORE_NAME").unwrap_or(defaults.store_name),
            log_level: std::env::var("LOG_LEVEL").unwrap_or(defaults.log_level),
            log_dir: std::env::var("LOG_DIR").ok().filter(|d| !d.is_empty()),
            log_json: std::env::var("LOG_JSON")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(defaults.log_json),
        }
    }

    /// 使用自定义密钥覆盖
    ///
    /// 常用于测试场景
    pub fn with_secrets(table_secret: impl Into<String>, payment_secret: impl Into<String>) -> Self {
        Self {
            table_token_secret: table_secret.into(),
            payment_token_secret: payment_secret.into(),
            ..Self::default()
        }
    }

    /// 校验配置
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.tax_rate < Decimal::ZERO || self.tax_rate > Decimal::ONE {
            return Err(ConfigError::TaxRateOutOfRange(self.tax_rate));
        }
        if self.table_token_ttl_secs == 0 {
            return Err(ConfigError::InvalidTtl("TABLE_TOKEN_TTL_SECS"));
        }
        if self.payment_token_ttl_secs == 0 {
            return Err(ConfigError::InvalidTtl("PAYMENT_TOKEN_TTL_SECS"));
        }
        if self.table_session_ttl_secs == 0 {
            return Err(ConfigError::InvalidTtl("TABLE_SESSION_TTL_SECS"));
        }
        if self.table_token_secret.is_empty() {
            return Err(ConfigError::EmptySecret("TABLE_TOKEN_SECRET"));
        }
        if self.payment_token_secret.is_empty() {
            return Err(ConfigError::EmptySecret("PAYMENT_TOKEN_SECRET"));
        }
        if self.is_production() {
            if self.table_token_secret == DEV_TABLE_TOKEN_SECRET {
                return Err(ConfigError::DevelopmentSecret("TABLE_TOKEN_SECRET"));
            }
            if self.payment_token_secret == DEV_PAYMENT_TOKEN_SECRET {
                return Err(ConfigError::DevelopmentSecret("PAYMENT_TOKEN_SECRET"));
            }
        }
        Ok(())
    }

    pub fn table_token_ttl_millis(&self) -> i64 {
        secs_to_millis(self.table_token_ttl_secs)
    }

    pub fn payment_token_ttl_millis(&self) -> i64 {
        secs_to_millis(self.payment_token_ttl_secs)
    }

    pub fn table_session_ttl_millis(&self) -> i64 {
        secs_to_millis(self.table_session_ttl_secs)
    }

    /// 按 LOG_LEVEL / LOG_JSON / LOG_DIR 初始化日志
    pub fn init_logger(&self) {
        init_logger_with_file(Some(&self.log_level), self.log_json, self.log_dir.as_deref());
    }

    /// 是否生产环境
    pub fn is_production(&self) -> bool {
        self.environment == "production"
    }

    /// 是否开发环境
    pub fn is_development(&self) -> bool {
        self.environment == "development"
    }
}

fn secs_to_millis(secs: u64) -> i64 {
    i64::try_from(secs).unwrap_or(i64::MAX).saturating_mul(1000)
}

impl Default for Config {
    /// 内置默认值，不读取环境变量
    fn default() -> Self {
        Self {
            environment: "development".into(),
            tax_rate: Decimal::new(10, 2),
            table_token_secret: DEV_TABLE_TOKEN_SECRET.into(),
            payment_token_secret: DEV_PAYMENT_TOKEN_SECRET.into(),
            table_token_ttl_secs: 24 * 60 * 60,
            payment_token_ttl_secs: 30 * 60,
            table_session_ttl_secs: 12 * 60 * 60,
            customer_base_url: "https://example.com/customer/".into(),
            mobile_pay_scheme: "mobilepay://payment".into(),
            store_name: "Mobile Order".into(),
            log_level: "info".into(),
            log_dir: None,
            log_json: false,
        }
    }
}
