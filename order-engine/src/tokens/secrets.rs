use super::TokenSubject;
use crate::core::Config;
use std::fmt;

/// Supplies the HMAC key for each token subject
pub trait SecretProvider: Send + Sync {
    fn secret(&self, subject: TokenSubject) -> &[u8];
}

/// Fixed keys, usually taken from [`Config`]
#[derive(Clone)]
pub struct StaticSecrets {
    table: Vec<u8>,
    payment: Vec<u8>,
}

impl StaticSecrets {
    pub fn new(table: impl Into<Vec<u8>>, payment: impl Into<Vec<u8>>) -> Self {
        Self {
            table: table.into(),
            payment: payment.into(),
        }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(
            config.table_token_secret.as_bytes(),
            config.payment_token_secret.as_bytes(),
        )
    }
}

impl SecretProvider for StaticSecrets {
    fn secret(&self, subject: TokenSubject) -> &[u8] {
        match subject {
            TokenSubject::Table => &self.table,
            TokenSubject::Payment => &self.payment,
        }
    }
}

// 不输出密钥内容
impl fmt::Debug for StaticSecrets {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StaticSecrets")
            .field("table", &"***")
            .field("payment", &"***")
            .finish()
    }
}
