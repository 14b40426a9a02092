//! HMAC-SHA256 signing and verification for webhook payloads.
//!
//! Shared by the ingestion endpoint (verifying inbound signatures against a
//! subscription's secret) and the delivery worker (signing outbound requests
//! with the same secret).

use hex;
use hmac::{Hmac, Mac};
use sha2::Sha256;

type HmacSha256 = Hmac<Sha256>;

/// Compute `hex(HMAC_SHA256(secret, body))`.
pub fn sign(secret: &str, body: &[u8]) -> String {
    let mut mac =
        HmacSha256::new_from_slice(secret.as_bytes()).expect("HMAC accepts a key of any size");
    mac.update(body);
    hex::encode(mac.finalize().into_bytes())
}

/// Verify a `sha256=<hex>` signature header against the raw request body.
///
/// - No secret configured → accept unconditionally.
/// - Secret configured but no header present → reject.
/// - Header present but malformed (no `=`, or algorithm isn't `sha256`) → reject.
/// - Otherwise compare the computed signature to the header's hex digest in
///   constant time.
pub fn verify_signature(secret: Option<&str>, body: &[u8], header: Option<&str>) -> bool {
    let secret = match secret {
        Some(s) if !s.is_empty() => s,
        _ => return true,
    };

    let header = match header {
        Some(h) => h,
        None => return false,
    };

    let (algorithm, signature_hex) = match header.split_once('=') {
        Some(pair) => pair,
        None => return false,
    };

    if !algorithm.eq_ignore_ascii_case("sha256") {
        return false;
    }

    let expected = sign(secret, body);
    constant_time_eq(expected.as_bytes(), signature_hex.as_bytes())
}

/// Fixed-time byte comparison: every byte pair is inspected regardless of
/// earlier mismatches, so the number of differing bytes can't be inferred
/// from execution time.
fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    let mut diff: u8 = 0;
    for (x, y) in a.iter().zip(b.iter()) {
        diff |= x ^ y;
    }
    diff == 0
}
