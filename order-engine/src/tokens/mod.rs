//! Signed tokens (二维码 / 支付条码)
//!
//! Stateless, tamper-evident references to a table or to an order amount.
//! Validity depends only on the token content, the secret and the clock:
//! there is no registry and no revocation list. Replays are stopped by the
//! state machines, not here.
//!
//! ```text
//! base64url("table|12||1737700000000") + "." + hex(HMAC-SHA256(secret, body))
//! base64url("payment|1001|1920|1737700000000") + "." + hex(...)
//! ```

mod codec;
mod secrets;

pub use codec::{PaymentClaims, TableClaims, TokenCodec, TokenError, TokenSubject};
pub use secrets::{SecretProvider, StaticSecrets};
