//! Gateway signature scheme.
//!
//! Checkout and notification hashes share one construction: the merchant
//! secret is digested once to an uppercase hex string, that salt is appended
//! to the field concatenation, and the whole is digested again. The amount
//! must carry exactly two decimal digits before hashing; a formatting
//! mismatch silently invalidates every signature, so callers hash the wire
//! value as received and never re-derive it from stored state.

use rust_decimal::{Decimal, RoundingStrategy};
use sha2::{Digest, Sha256};

/// Formats an amount the way the gateway hashes it: exactly two decimals,
/// midpoints rounded away from zero (the gateway's convention, not the
/// banker's rounding `round_dp` defaults to).
pub fn format_amount(amount: Decimal) -> String {
    format!(
        "{:.2}",
        amount.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero)
    )
}

fn digest_upper(input: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(input);
    hex::encode_upper(hasher.finalize())
}

/// Hash sent with the buyer's redirect to the gateway.
pub fn compute_checkout_signature(
    merchant_id: &str,
    order_id: &str,
    amount: &str,
    currency: &str,
    secret: &str,
) -> String {
    let salted_secret = digest_upper(secret.as_bytes());
    let payload = format!("{merchant_id}{order_id}{amount}{currency}{salted_secret}");
    digest_upper(payload.as_bytes())
}

/// Hash the gateway sends back with its asynchronous notification. The
/// status code participates so a replayed success hash cannot vouch for a
/// different outcome.
pub fn compute_notification_signature(
    merchant_id: &str,
    order_id: &str,
    amount: &str,
    currency: &str,
    status_code: i32,
    secret: &str,
) -> String {
    let salted_secret = digest_upper(secret.as_bytes());
    let payload =
        format!("{merchant_id}{order_id}{amount}{currency}{status_code}{salted_secret}");
    digest_upper(payload.as_bytes())
}

/// Verifies a notification signature against the values as received on the
/// wire. Comparison is constant-time and case-insensitive on the candidate.
pub fn verify_notification_signature(
    merchant_id: &str,
    order_id: &str,
    amount: &str,
    currency: &str,
    status_code: i32,
    secret: &str,
    candidate: &str,
) -> bool {
    let expected = compute_notification_signature(
        merchant_id,
        order_id,
        amount,
        currency,
        status_code,
        secret,
    );
    constant_time_eq(&expected, &candidate.to_ascii_uppercase())
}

fn constant_time_eq(a: &str, b: &str) -> bool {
    if a.len() != b.len() {
        return false;
    }
    let mut res = 0u8;
    for (x, y) in a.as_bytes().iter().zip(b.as_bytes()) {
        res |= x ^ y;
    }
    res == 0
}
