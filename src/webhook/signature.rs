//! HMAC-SHA256 signing and verification for execution-service callbacks.
//!
//! The signature header carries `sha256=` followed by the base64-encoded
//! MAC of the raw request body. Verification goes through
//! [`hmac::Mac::verify_slice`], which compares in constant time.

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use hmac::{Hmac, Mac};
use sha2::Sha256;

use crate::error::{DispatchError, Result};

type HmacSha256 = Hmac<Sha256>;

const SIGNATURE_PREFIX: &str = "sha256=";

/// Sign a callback body with the shared secret. Used by tests and by
/// clients producing callbacks.
pub fn sign(secret: &str, body: &[u8]) -> Result<String> {
    let mut mac = HmacSha256::new_from_slice(secret.as_bytes())
        .map_err(|e| DispatchError::CallbackAuth(e.to_string()))?;
    mac.update(body);
    Ok(format!(
        "{SIGNATURE_PREFIX}{}",
        BASE64.encode(mac.finalize().into_bytes())
    ))
}

/// Verify a callback body against its signature header
pub fn verify(secret: &str, body: &[u8], signature: &str) -> Result<()> {
    let encoded = signature
        .strip_prefix(SIGNATURE_PREFIX)
        .ok_or_else(|| DispatchError::CallbackAuth("missing sha256= prefix".to_string()))?;
    let claimed = BASE64
        .decode(encoded)
        .map_err(|_| DispatchError::CallbackAuth("signature is not valid base64".to_string()))?;

    let mut mac = HmacSha256::new_from_slice(secret.as_bytes())
        .map_err(|e| DispatchError::CallbackAuth(e.to_string()))?;
    mac.update(body);
    mac.verify_slice(&claimed)
        .map_err(|_| DispatchError::CallbackAuth("signature mismatch".to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sign_then_verify() {
        let body = br#"{"correlation_id":"corr-1","event":"completed"}"#;
        let signature = sign("secret", body).unwrap();
        assert!(signature.starts_with("sha256="));
        assert!(verify("secret", body, &signature).is_ok());
    }

    #[test]
    fn test_wrong_secret_rejected() {
        let body = b"payload";
        let signature = sign("secret", body).unwrap();
        assert!(verify("other-secret", body, &signature).is_err());
    }

    #[test]
    fn test_tampered_body_rejected() {
        let signature = sign("secret", b"payload").unwrap();
        assert!(verify("secret", b"payload2", &signature).is_err());
    }

    #[test]
    fn test_malformed_header_rejected() {
        assert!(verify("secret", b"payload", "md5=abc").is_err());
        assert!(verify("secret", b"payload", "sha256=!!not-base64!!").is_err());
    }
}
