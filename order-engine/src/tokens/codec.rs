use super::SecretProvider;
use crate::core::Config;
use crate::utils::Clock;
use base64::Engine as _;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use hmac::{Hmac, Mac};
use serde::{Deserialize, Serialize};
use sha2::Sha256;
use std::fmt;
use std::sync::Arc;
use thiserror::Error;

type HmacSha256 = Hmac<Sha256>;

/// HMAC-SHA256 输出长度 (hex 64 字符)
const SIGNATURE_HEX_LEN: usize = 64;

/// What a token points at
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TokenSubject {
    Table,
    Payment,
}

impl TokenSubject {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Table => "table",
            Self::Payment => "payment",
        }
    }
}

impl fmt::Display for TokenSubject {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Token verification failure
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum TokenError {
    #[error("malformed token: {0}")]
    Malformed(&'static str),

    #[error("signature mismatch")]
    SignatureMismatch,

    #[error("wrong token subject: expected {expected}, found {found}")]
    WrongSubject {
        expected: TokenSubject,
        found: String,
    },

    #[error("token expired at {expired_at} (issued at {issued_at})")]
    Expired { issued_at: i64, expired_at: i64 },

    #[error("token issued in the future: {0}")]
    IssuedInFuture(i64),

    #[error("invalid signing key")]
    InvalidKey,
}

/// Verified table token content
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableClaims {
    pub table_id: i64,
    pub issued_at: i64,
}

/// Verified payment token content
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentClaims {
    pub order_id: i64,
    pub amount: i64,
    pub issued_at: i64,
}

/// Issues and verifies signed tokens
pub struct TokenCodec {
    secrets: Arc<dyn SecretProvider>,
    clock: Arc<dyn Clock>,
    table_ttl_millis: i64,
    payment_ttl_millis: i64,
}

impl fmt::Debug for TokenCodec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TokenCodec")
            .field("table_ttl_millis", &self.table_ttl_millis)
            .field("payment_ttl_millis", &self.payment_ttl_millis)
            .finish_non_exhaustive()
    }
}

impl TokenCodec {
    pub fn new(
        secrets: Arc<dyn SecretProvider>,
        clock: Arc<dyn Clock>,
        table_ttl_millis: i64,
        payment_ttl_millis: i64,
    ) -> Self {
        Self {
            secrets,
            clock,
            table_ttl_millis,
            payment_ttl_millis,
        }
    }

    pub fn from_config(
        config: &Config,
        secrets: Arc<dyn SecretProvider>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self::new(
            secrets,
            clock,
            config.table_token_ttl_millis(),
            config.payment_token_ttl_millis(),
        )
    }

    // ========== Issue ==========

    /// 桌台二维码令牌 (默认 24h)
    pub fn issue_table_token(&self, table_id: i64) -> Result<String, TokenError> {
        self.issue(TokenSubject::Table, table_id, "")
    }

    /// 支付条码令牌 (默认 30min)
    pub fn issue_payment_token(&self, order_id: i64, amount: i64) -> Result<String, TokenError> {
        self.issue(TokenSubject::Payment, order_id, &amount.to_string())
    }

    fn issue(&self, subject: TokenSubject, id: i64, payload: &str) -> Result<String, TokenError> {
        let issued_at = self.clock.now_millis();
        let body = format!("{}|{}|{}|{}", subject.as_str(), id, payload, issued_at);
        let signature = self.mac(subject, body.as_bytes())?.finalize().into_bytes();
        Ok(format!(
            "{}.{}",
            URL_SAFE_NO_PAD.encode(body.as_bytes()),
            hex::encode(signature)
        ))
    }

    // ========== Verify ==========

    pub fn verify_table_token(&self, token: &str) -> Result<TableClaims, TokenError> {
        let fields = self.verify(TokenSubject::Table, token)?;
        if !fields.payload.is_empty() {
            return Err(TokenError::Malformed("unexpected payload"));
        }
        Ok(TableClaims {
            table_id: fields.id,
            issued_at: fields.issued_at,
        })
    }

    /// Checks signature and TTL only; comparing `amount` with the order total
    /// is the caller's job.
    pub fn verify_payment_token(&self, token: &str) -> Result<PaymentClaims, TokenError> {
        let fields = self.verify(TokenSubject::Payment, token)?;
        let amount = fields
            .payload
            .parse()
            .map_err(|_| TokenError::Malformed("amount is not an integer"))?;
        Ok(PaymentClaims {
            order_id: fields.id,
            amount,
            issued_at: fields.issued_at,
        })
    }

    fn verify(&self, subject: TokenSubject, token: &str) -> Result<TokenFields, TokenError> {
        let (encoded_body, signature_hex) = token
            .trim()
            .split_once('.')
            .ok_or(TokenError::Malformed("missing signature separator"))?;

        // 只接受小写 hex，避免大小写变体也能通过验证
        if signature_hex.len() != SIGNATURE_HEX_LEN
            || !signature_hex
                .bytes()
                .all(|b| b.is_ascii_digit() || (b'a'..=b'f').contains(&b))
        {
            return Err(TokenError::Malformed("signature is not lowercase hex"));
        }
        let signature =
            hex::decode(signature_hex).map_err(|_| TokenError::Malformed("signature is not hex"))?;
        let body = URL_SAFE_NO_PAD
            .decode(encoded_body)
            .map_err(|_| TokenError::Malformed("body is not base64url"))?;

        // constant-time comparison via hmac::verify_slice
        self.mac(subject, &body)?
            .verify_slice(&signature)
            .map_err(|_| TokenError::SignatureMismatch)?;

        let body =
            String::from_utf8(body).map_err(|_| TokenError::Malformed("body is not utf-8"))?;
        let fields = TokenFields::parse(subject, &body)?;
        self.check_ttl(subject, fields.issued_at)?;
        Ok(fields)
    }

    fn check_ttl(&self, subject: TokenSubject, issued_at: i64) -> Result<(), TokenError> {
        let now = self.clock.now_millis();
        if issued_at > now {
            return Err(TokenError::IssuedInFuture(issued_at));
        }
        let ttl = match subject {
            TokenSubject::Table => self.table_ttl_millis,
            TokenSubject::Payment => self.payment_ttl_millis,
        };
        let expired_at = issued_at.saturating_add(ttl);
        if now > expired_at {
            return Err(TokenError::Expired {
                issued_at,
                expired_at,
            });
        }
        Ok(())
    }

    fn mac(&self, subject: TokenSubject, body: &[u8]) -> Result<HmacSha256, TokenError> {
        let mut mac = HmacSha256::new_from_slice(self.secrets.secret(subject))
            .map_err(|_| TokenError::InvalidKey)?;
        mac.update(body);
        Ok(mac)
    }
}

/// `subject|id|payload|issuedAtMs`
struct TokenFields {
    id: i64,
    payload: String,
    issued_at: i64,
}

impl TokenFields {
    fn parse(expected: TokenSubject, body: &str) -> Result<Self, TokenError> {
        let parts: Vec<&str> = body.split('|').collect();
        let [subject, id, payload, issued_at] = parts.as_slice() else {
            return Err(TokenError::Malformed("expected 4 fields"));
        };
        if *subject != expected.as_str() {
            return Err(TokenError::WrongSubject {
                expected,
                found: (*subject).to_string(),
            });
        }
        Ok(Self {
            id: id
                .parse()
                .map_err(|_| TokenError::Malformed("subject id is not an integer"))?,
            payload: (*payload).to_string(),
            issued_at: issued_at
                .parse()
                .map_err(|_| TokenError::Malformed("issued_at is not an integer"))?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tokens::StaticSecrets;
    use crate::utils::ManualClock;

    const T0: i64 = 1_737_700_000_000;
    const DAY: i64 = 24 * 60 * 60 * 1000;
    const HALF_HOUR: i64 = 30 * 60 * 1000;

    fn create_codec() -> (TokenCodec, Arc<ManualClock>) {
        let clock = Arc::new(ManualClock::new(T0));
        let secrets = Arc::new(StaticSecrets::new("table-secret", "payment-secret"));
        (TokenCodec::new(secrets, clock.clone(), DAY, HALF_HOUR), clock)
    }

    /// 把第 i 个字符换成同字母表中的另一个字符
    fn flip_char(token: &str, index: usize) -> String {
        token
            .char_indices()
            .map(|(i, c)| {
                if i != index {
                    c
                } else if c == '0' {
                    '1'
                } else if c == 'A' {
                    'B'
                } else if c.is_ascii_hexdigit() && c.is_ascii_lowercase() || c.is_ascii_digit() {
                    '0'
                } else {
                    'A'
                }
            })
            .collect()
    }

    #[test]
    fn test_table_token_roundtrip() {
        let (codec, _) = create_codec();
        let token = codec.issue_table_token(12).unwrap();

        let claims = codec.verify_table_token(&token).unwrap();
        assert_eq!(claims.table_id, 12);
        assert_eq!(claims.issued_at, T0);
    }

    #[test]
    fn test_token_format() {
        let (codec, _) = create_codec();
        let token = codec.issue_payment_token(1001, 1920).unwrap();

        let (body, signature) = token.split_once('.').unwrap();
        let body = URL_SAFE_NO_PAD.decode(body).unwrap();
        assert_eq!(
            String::from_utf8(body).unwrap(),
            format!("payment|1001|1920|{}", T0)
        );
        assert_eq!(signature.len(), 64);
    }

    #[test]
    fn test_payment_ttl_boundary() {
        let (codec, clock) = create_codec();
        let token = codec.issue_payment_token(1001, 1920).unwrap();

        clock.set(T0 + HALF_HOUR);
        let claims = codec.verify_payment_token(&token).unwrap();
        assert_eq!(claims.amount, 1920);
        assert_eq!(claims.order_id, 1001);

        clock.set(T0 + HALF_HOUR + 1);
        assert!(matches!(
            codec.verify_payment_token(&token),
            Err(TokenError::Expired { .. })
        ));
    }

    #[test]
    fn test_table_ttl_boundary() {
        let (codec, clock) = create_codec();
        let token = codec.issue_table_token(3).unwrap();

        clock.set(T0 + DAY);
        assert!(codec.verify_table_token(&token).is_ok());

        clock.set(T0 + DAY + 1);
        assert_eq!(
            codec.verify_table_token(&token),
            Err(TokenError::Expired {
                issued_at: T0,
                expired_at: T0 + DAY
            })
        );
    }

    #[test]
    fn test_future_token_rejected() {
        let (codec, clock) = create_codec();
        let token = codec.issue_table_token(3).unwrap();

        clock.set(T0 - 1);
        assert_eq!(
            codec.verify_table_token(&token),
            Err(TokenError::IssuedInFuture(T0))
        );
    }

    #[test]
    fn test_any_tampered_byte_is_rejected() {
        let (codec, _) = create_codec();
        let token = codec.issue_payment_token(1001, 1920).unwrap();

        for index in 0..token.len() {
            let tampered = flip_char(&token, index);
            assert_ne!(tampered, token);
            assert!(
                codec.verify_payment_token(&tampered).is_err(),
                "tampered token accepted at index {}",
                index
            );
        }
    }

    #[test]
    fn test_uppercase_signature_rejected() {
        let (codec, _) = create_codec();
        let token = codec.issue_table_token(1).unwrap();
        let (body, signature) = token.split_once('.').unwrap();
        let upper = format!("{}.{}", body, signature.to_ascii_uppercase());

        if upper != token {
            assert!(matches!(
                codec.verify_table_token(&upper),
                Err(TokenError::Malformed(_))
            ));
        }
    }

    #[test]
    fn test_subjects_use_separate_secrets() {
        let (codec, _) = create_codec();
        let table_token = codec.issue_table_token(1001).unwrap();

        assert_eq!(
            codec.verify_payment_token(&table_token),
            Err(TokenError::SignatureMismatch)
        );
    }

    #[test]
    fn test_forged_signature_with_other_secret() {
        let (codec, _) = create_codec();
        let clock = Arc::new(ManualClock::new(T0));
        let forger = TokenCodec::new(
            Arc::new(StaticSecrets::new("guess", "guess")),
            clock,
            DAY,
            HALF_HOUR,
        );
        let forged = forger.issue_payment_token(1001, 1).unwrap();

        assert_eq!(
            codec.verify_payment_token(&forged),
            Err(TokenError::SignatureMismatch)
        );
    }

    #[test]
    fn test_malformed_inputs() {
        let (codec, _) = create_codec();
        for raw in ["", "no-separator", "abc.def", ".", "A1"] {
            assert!(matches!(
                codec.verify_table_token(raw),
                Err(TokenError::Malformed(_))
            ));
        }
    }

    #[test]
    fn test_replay_succeeds_at_codec_layer() {
        let (codec, _) = create_codec();
        let token = codec.issue_payment_token(1001, 1920).unwrap();

        assert!(codec.verify_payment_token(&token).is_ok());
        assert!(codec.verify_payment_token(&token).is_ok());
    }
}
