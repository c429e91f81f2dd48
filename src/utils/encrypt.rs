use std::collections::BTreeMap;

use argonautica::{Hasher, Verifier};
use chrono::Utc;
use hmac::{Hmac, Mac};
use jwt::{SignWithKey, VerifyWithKey};
use rand::RngCore;
use sha2::Sha256;

const CONSOLE_TOKEN_TTL_SECS: i64 = 12 * 60 * 60;
const TOTP_STEP_SECS: i64 = 30;

pub fn hash_password(password: &str, secret: &str) -> Result<String, String> {
    let mut hasher = Hasher::default();
    hasher
        .with_password(password)
        .with_secret_key(secret)
        .configure_iterations(64)
        .configure_memory_size(4096)
        .configure_variant(argonautica::config::Variant::Argon2id)
        .hash()
        .map_err(|e| e.to_string())
}

pub fn verify_password(password: &str, hash: &str, secret: &str) -> Result<bool, String> {
    let mut verifier = Verifier::default();
    verifier
        .with_hash(hash)
        .with_password(password)
        .with_secret_key(secret)
        .verify()
        .map_err(|e| e.to_string())
}

fn signing_key(secret: &str) -> Result<Hmac<Sha256>, String> {
    Hmac::new_from_slice(secret.as_bytes()).map_err(|e| e.to_string())
}

// Bearer token for the super-admin console. Tenant sessions use opaque
// database-backed tokens instead, this is only the console path.
pub fn issue_console_token(superadmin_id: &str, secret: &str) -> Result<String, String> {
    let key = signing_key(secret)?;
    let exp = Utc::now().timestamp() + CONSOLE_TOKEN_TTL_SECS;

    let mut claims = BTreeMap::new();
    claims.insert("sub".to_string(), superadmin_id.to_string());
    claims.insert("exp".to_string(), exp.to_string());
    claims.sign_with_key(&key).map_err(|e| e.to_string())
}

// Returns the super-admin id when the token is well formed and unexpired.
pub fn verify_console_token(token: &str, secret: &str) -> Option<String> {
    let key = signing_key(secret).ok()?;
    let claims: BTreeMap<String, String> = token.verify_with_key(&key).ok()?;

    let exp: i64 = claims.get("exp")?.parse().ok()?;
    if exp <= Utc::now().timestamp() {
        return None;
    }
    claims.get("sub").cloned()
}

pub fn generate_totp_secret() -> String {
    let mut bytes = [0u8; 20];
    rand::thread_rng().fill_bytes(&mut bytes);
    hex::encode(bytes)
}

pub fn totp_code(secret_hex: &str, unix_time: i64) -> Option<String> {
    let secret = hex::decode(secret_hex).ok()?;
    let counter = (unix_time / TOTP_STEP_SECS) as u64;

    let mut mac = Hmac::<Sha256>::new_from_slice(&secret).ok()?;
    mac.update(&counter.to_be_bytes());
    let digest = mac.finalize().into_bytes();

    let offset = (digest[digest.len() - 1] & 0x0f) as usize;
    let bin = ((digest[offset] & 0x7f) as u32) << 24
        | (digest[offset + 1] as u32) << 16
        | (digest[offset + 2] as u32) << 8
        | digest[offset + 3] as u32;

    Some(format!("{:06}", bin % 1_000_000))
}

// One step of clock skew is tolerated either way.
pub fn verify_totp(secret_hex: &str, code: &str, unix_time: i64) -> bool {
    for skew in [-1i64, 0, 1] {
        let at = unix_time + skew * TOTP_STEP_SECS;
        if let Some(expected) = totp_code(secret_hex, at) {
            if expected == code {
                return true;
            }
        }
    }
    false
}

#[cfg(test)]
mod tests {
    use super::*;

    const SECRET: &str = "unit-test-secret";

    #[test]
    fn password_hash_round_trip() {
        let hash = hash_password("hunter2", SECRET).unwrap();
        assert_ne!(hash, "hunter2");
        assert!(verify_password("hunter2", &hash, SECRET).unwrap());
        assert!(!verify_password("hunter3", &hash, SECRET).unwrap());
    }

    #[test]
    fn console_token_round_trip() {
        let token = issue_console_token("sa-123", SECRET).unwrap();
        assert_eq!(verify_console_token(&token, SECRET), Some("sa-123".to_string()));
    }

    #[test]
    fn console_token_rejects_wrong_secret_and_garbage() {
        let token = issue_console_token("sa-123", SECRET).unwrap();
        assert_eq!(verify_console_token(&token, "other-secret"), None);
        assert_eq!(verify_console_token("not-a-token", SECRET), None);
    }

    #[test]
    fn totp_codes_are_six_digits_and_stable_within_a_step() {
        let secret = generate_totp_secret();
        let code = totp_code(&secret, 1_700_000_010).unwrap();
        assert_eq!(code.len(), 6);
        assert!(code.chars().all(|c| c.is_ascii_digit()));
        assert_eq!(code, totp_code(&secret, 1_700_000_029).unwrap());
    }

    #[test]
    fn totp_verification_tolerates_one_step_of_skew() {
        let secret = "aaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaa";
        let code = totp_code(secret, 1_700_000_000).unwrap();
        assert!(verify_totp(secret, &code, 1_700_000_000));
        assert!(verify_totp(secret, &code, 1_700_000_000 + TOTP_STEP_SECS));
        assert!(verify_totp(secret, &code, 1_700_000_000 - TOTP_STEP_SECS));
        assert!(!verify_totp(secret, "12345", 1_700_000_000));
        assert!(!verify_totp("zz-not-hex", "123456", 1_700_000_000));
    }
}
