//! Project API key generation.

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine as _;
use rand::RngCore;

/// Every project key starts with this so keys are recognizable in logs
/// and support tickets without revealing the secret part.
pub const API_KEY_PREFIX: &str = "proj_";

/// Length of the random portion after base64 encoding.
const KEY_BODY_LEN: usize = 43;

/// Generate a fresh project API key: 32 bytes of OS entropy, URL-safe
/// base64 without padding (43 chars), prefixed `proj_`.
pub fn generate_api_key() -> String {
    let mut bytes = [0u8; 32];
    rand::rng().fill_bytes(&mut bytes);
    let encoded = URL_SAFE_NO_PAD.encode(bytes);
    format!("{}{}", API_KEY_PREFIX, &encoded[..KEY_BODY_LEN])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn key_has_prefix_and_expected_length() {
        let key = generate_api_key();
        assert!(key.starts_with(API_KEY_PREFIX));
        assert_eq!(key.len(), API_KEY_PREFIX.len() + KEY_BODY_LEN);
    }

    #[test]
    fn key_body_is_url_safe() {
        let key = generate_api_key();
        let body = &key[API_KEY_PREFIX.len()..];
        assert!(body
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_'));
    }

    #[test]
    fn keys_are_unique() {
        let a = generate_api_key();
        let b = generate_api_key();
        assert_ne!(a, b);
    }
}
