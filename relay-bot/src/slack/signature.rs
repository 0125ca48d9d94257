//! Slack request signing (`X-Slack-Signature`, version `v0`).

use hmac::{Hmac, Mac};
use sha2::Sha256;

type HmacSha256 = Hmac<Sha256>;

/// Requests older or newer than this many seconds are rejected.
pub const MAX_CLOCK_SKEW_SECS: i64 = 60 * 5;

/// Verify a Slack request signature.
///
/// The signed base string is `v0:{timestamp}:{body}` and the header value
/// is `v0=<hex hmac-sha256>`.
pub fn verify_slack_signature(
    signing_secret: &str,
    timestamp: &str,
    body: &[u8],
    signature_header: &str,
    now_unix: i64,
) -> bool {
    let Ok(ts) = timestamp.parse::<i64>() else {
        return false;
    };
    if now_unix.abs_diff(ts) > MAX_CLOCK_SKEW_SECS.unsigned_abs() {
        return false;
    }

    let Some(hex_sig) = signature_header.strip_prefix("v0=") else {
        return false;
    };
    let Ok(expected) = hex::decode(hex_sig) else {
        return false;
    };

    let Ok(mut mac) = HmacSha256::new_from_slice(signing_secret.as_bytes()) else {
        return false;
    };
    mac.update(format!("v0:{timestamp}:").as_bytes());
    mac.update(body);

    // Constant-time comparison
    mac.verify_slice(&expected).is_ok()
}

/// Compute the `v0=` signature header for a body.
pub fn sign_slack_request(signing_secret: &str, timestamp: &str, body: &[u8]) -> String {
    let mut mac = match HmacSha256::new_from_slice(signing_secret.as_bytes()) {
        Ok(m) => m,
        Err(_) => return String::new(),
    };
    mac.update(format!("v0:{timestamp}:").as_bytes());
    mac.update(body);
    format!("v0={}", hex::encode(mac.finalize().into_bytes()))
}

#[cfg(test)]
mod tests {
    use super::*;

    const SECRET: &str = "8f742231b10e8888abcd99yyyzzz85a5";
    const NOW: i64 = 1_531_420_618;

    #[test]
    fn test_valid_signature_passes() {
        let body = b"token=x&command=/context-stats";
        let sig = sign_slack_request(SECRET, "1531420618", body);
        assert!(sig.starts_with("v0="));
        assert!(verify_slack_signature(SECRET, "1531420618", body, &sig, NOW));
    }

    #[test]
    fn test_tampered_body_fails() {
        let sig = sign_slack_request(SECRET, "1531420618", b"a=1");
        assert!(!verify_slack_signature(SECRET, "1531420618", b"a=2", &sig, NOW));
    }

    #[test]
    fn test_stale_timestamp_fails() {
        let body = b"a=1";
        let sig = sign_slack_request(SECRET, "1531420618", body);
        assert!(!verify_slack_signature(
            SECRET,
            "1531420618",
            body,
            &sig,
            NOW + MAX_CLOCK_SKEW_SECS + 1
        ));
    }

    #[test]
    fn test_malformed_headers_fail() {
        assert!(!verify_slack_signature(SECRET, "abc", b"", "v0=00", NOW));
        assert!(!verify_slack_signature(SECRET, "1531420618", b"", "sha256=00", NOW));
        assert!(!verify_slack_signature(SECRET, "1531420618", b"", "v0=zz", NOW));
    }

    #[test]
    fn test_extreme_timestamps_are_rejected() {
        let body = b"a=1";
        for ts in [i64::MIN, i64::MAX] {
            let ts = ts.to_string();
            let sig = sign_slack_request(SECRET, &ts, body);
            assert!(!verify_slack_signature(SECRET, &ts, body, &sig, NOW));
        }
    }
}
