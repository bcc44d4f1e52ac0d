//! Method-specific payment artifacts
//!
//! | Method | Artifact |
//! |--------|----------|
//! | cash | signed payment token, printed as a CODE128 barcode |
//! | credit card | `CC-` + 16 hex of SHA-256(`orderId|amount|method`) |
//! | mobile | `<scheme>?amount=<amount>&reference=<orderId>` |

use crate::tokens::{TokenCodec, TokenError};
use sha2::{Digest, Sha256};
use shared::models::{PaymentArtifact, PaymentMethod};

/// 卡支付交易号占位符
pub fn card_transaction_id(order_id: i64, amount: i64, method: PaymentMethod) -> String {
    let digest = Sha256::digest(format!("{}|{}|{}", order_id, amount, method).as_bytes());
    let hex = hex::encode(digest);
    format!("CC-{}", &hex[..16])
}

pub fn mobile_deep_link(scheme: &str, order_id: i64, amount: i64) -> String {
    format!("{}?amount={}&reference={}", scheme, amount, order_id)
}

pub fn build_artifact(
    codec: &TokenCodec,
    mobile_pay_scheme: &str,
    order_id: i64,
    amount: i64,
    method: PaymentMethod,
) -> Result<PaymentArtifact, TokenError> {
    Ok(match method {
        PaymentMethod::Cash => PaymentArtifact::Barcode {
            token: codec.issue_payment_token(order_id, amount)?,
        },
        PaymentMethod::CreditCard => PaymentArtifact::CardTransaction {
            transaction_id: card_transaction_id(order_id, amount, method),
        },
        PaymentMethod::MobilePayment => PaymentArtifact::MobileDeepLink {
            url: mobile_deep_link(mobile_pay_scheme, order_id, amount),
        },
    })
}
