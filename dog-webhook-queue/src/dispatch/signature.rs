//! Webhook signing: `X-HYPER-SIGNATURE: t=<epoch-ms>,sig=<hex>` where `sig` is
//! HMAC-SHA256 over `"{t}.{json(payload)}"` keyed with the queue's secret.

use hmac::{Hmac, Mac};
use serde_json::Value;
use sha2::Sha256;

use crate::{QueueResult, QueueError};

type HmacSha256 = Hmac<Sha256>;

pub const SIGNATURE_HEADER: &str = "X-HYPER-SIGNATURE";

fn mac(secret: &str, payload: &Value, time_ms: i64) -> QueueResult<HmacSha256> {
    let mut mac = HmacSha256::new_from_slice(secret.as_bytes())
        .map_err(|e| QueueError::Internal(format!("invalid hmac key: {e}")))?;
    mac.update(format!("{time_ms}.{payload}").as_bytes());
    Ok(mac)
}

/// Hex HMAC-SHA256 of `"{time_ms}.{compact json payload}"`
pub fn compute_signature(secret: &str, payload: &Value, time_ms: i64) -> QueueResult<String> {
    let bytes = mac(secret, payload, time_ms)?.finalize().into_bytes();
    Ok(hex::encode(bytes))
}

/// Value of the signature header
pub fn signature_header(secret: &str, payload: &Value, time_ms: i64) -> QueueResult<String> {
    Ok(format!("t={time_ms},sig={}", compute_signature(secret, payload, time_ms)?))
}

/// Check a received signature header against the payload, in constant time.
/// Returns `false` for malformed headers.
pub fn verify_signature(secret: &str, header: &str, payload: &Value) -> bool {
    let mut time_ms = None;
    let mut sig = None;
    for part in header.split(',') {
        match part.trim().split_once('=') {
            Some(("t", value)) => time_ms = value.parse::<i64>().ok(),
            Some(("sig", value)) => sig = hex::decode(value).ok(),
            _ => {}
        }
    }

    match (time_ms, sig) {
        (Some(time_ms), Some(sig)) => mac(secret, payload, time_ms)
            .map(|mac| mac.verify_slice(&sig).is_ok())
            .unwrap_or(false),
        _ => false,
    }
}
