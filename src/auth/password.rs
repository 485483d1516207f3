use argon2::{
    password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Algorithm, Argon2, Params, Version,
};
use lazy_static::lazy_static;
use rand::rngs::OsRng;
use rand::{Rng, RngCore};
use regex::Regex;
use sha2::{Digest, Sha256};
use tracing::error;

/// Reset codes draw from digits plus both alphabet cases, no specials, so
/// they survive being read out loud or typed from a phone screen.
const OTP_CHARSET: &[u8] = b"0123456789abcdefghijklmnopqrstuvwxyzABCDEFGHIJKLMNOPQRSTUVWXYZ";
pub const OTP_LENGTH: usize = 16;

pub(crate) fn is_valid_email(email: &str) -> bool {
    lazy_static! {
        static ref EMAIL_RE: Regex = Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").unwrap();
    }
    EMAIL_RE.is_match(email)
}

pub(crate) fn is_valid_phone_number(phone: &str) -> bool {
    lazy_static! {
        static ref PHONE_RE: Regex = Regex::new(r"^\+?[0-9]{7,15}$").unwrap();
    }
    PHONE_RE.is_match(phone)
}

/// Password policy: at least 8 characters with an uppercase letter, a
/// lowercase letter, a digit and a symbol. Checked before hashing, on every
/// write path that sets a password.
pub fn check_password_policy(plain: &str) -> Result<(), String> {
    if plain.chars().count() < 8 {
        return Err("Password must contain at least 8 characters".into());
    }
    if !plain.chars().any(|c| c.is_ascii_uppercase()) {
        return Err("Password must contain an uppercase letter".into());
    }
    if !plain.chars().any(|c| c.is_ascii_lowercase()) {
        return Err("Password must contain a lowercase letter".into());
    }
    if !plain.chars().any(|c| c.is_ascii_digit()) {
        return Err("Password must contain a digit".into());
    }
    if plain.chars().all(|c| c.is_ascii_alphanumeric()) {
        return Err("Password must contain a symbol".into());
    }
    Ok(())
}

fn hasher(work_factor: u32) -> anyhow::Result<Argon2<'static>> {
    let params = Params::new(Params::DEFAULT_M_COST, work_factor, Params::DEFAULT_P_COST, None)
        .map_err(|e| anyhow::anyhow!(e.to_string()))?;
    Ok(Argon2::new(Algorithm::Argon2id, Version::V0x13, params))
}

pub fn hash_password(plain: &str, work_factor: u32) -> anyhow::Result<String> {
    let salt = SaltString::generate(&mut OsRng);
    let hash = hasher(work_factor)?
        .hash_password(plain.as_bytes(), &salt)
        .map_err(|e| {
            error!(error = %e, "argon2 hash_password error");
            anyhow::anyhow!(e.to_string())
        })?
        .to_string();
    Ok(hash)
}

pub fn verify_password(plain: &str, hash: &str) -> anyhow::Result<bool> {
    let parsed = PasswordHash::new(hash).map_err(|e| {
        error!(error = %e, "argon2 parse hash error");
        anyhow::anyhow!(e.to_string())
    })?;
    Ok(Argon2::default()
        .verify_password(plain.as_bytes(), &parsed)
        .is_ok())
}

/// Fast one-way digest for one-time secrets (reset codes, verification
/// tokens). These are high-entropy and short-lived, so the salted slow hash
/// is unnecessary; only this digest is ever stored.
pub fn digest(value: &str) -> String {
    hex::encode(Sha256::digest(value.as_bytes()))
}

pub fn generate_otp() -> String {
    let mut rng = OsRng;
    (0..OTP_LENGTH)
        .map(|_| OTP_CHARSET[rng.gen_range(0..OTP_CHARSET.len())] as char)
        .collect()
}

pub fn generate_verify_token() -> String {
    let mut buf = [0u8; 32];
    OsRng.fill_bytes(&mut buf);
    hex::encode(buf)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hash_and_verify_roundtrip() {
        let password = "Secur3P@ssw0rd!";
        let hash = hash_password(password, 2).expect("hashing should succeed");
        assert_ne!(hash, password);
        assert!(verify_password(password, &hash).expect("verify should succeed"));
    }

    #[test]
    fn verify_rejects_wrong_password() {
        let password = "correct-Horse7-battery";
        let hash = hash_password(password, 2).expect("hashing should succeed");
        assert!(!verify_password("wrong-password", &hash).expect("verify should not error"));
    }

    #[test]
    fn verify_errors_on_malformed_hash() {
        let err = verify_password("anything", "not-a-valid-hash").unwrap_err();
        assert!(!err.to_string().is_empty());
    }

    #[test]
    fn policy_accepts_compliant_passwords() {
        for p in ["Abc123!@", "paSsw0rd#", "Longer-Passw0rd"] {
            assert!(check_password_policy(p).is_ok(), "{p} should pass");
        }
    }

    #[test]
    fn policy_rejects_each_missing_rule() {
        assert!(check_password_policy("Ab1!").is_err()); // too short
        assert!(check_password_policy("abc123!@abc").is_err()); // no uppercase
        assert!(check_password_policy("ABC123!@ABC").is_err()); // no lowercase
        assert!(check_password_policy("Abcdefg!@").is_err()); // no digit
        assert!(check_password_policy("Abcdefg123").is_err()); // no symbol
    }

    #[test]
    fn otp_has_expected_length_and_charset() {
        let otp = generate_otp();
        assert_eq!(otp.len(), OTP_LENGTH);
        assert!(otp.bytes().all(|b| OTP_CHARSET.contains(&b)));
    }

    #[test]
    fn verify_token_is_hex_of_32_bytes() {
        let token = generate_verify_token();
        assert_eq!(token.len(), 64);
        assert!(token.bytes().all(|b| b.is_ascii_hexdigit()));
    }

    #[test]
    fn digest_is_deterministic_and_differs_from_input() {
        let otp = "9fKq2ZrT7wLm4xAb";
        assert_eq!(digest(otp), digest(otp));
        assert_ne!(digest(otp), otp);
        assert_ne!(digest(otp), digest("9fKq2ZrT7wLm4xAc"));
    }

    #[test]
    fn email_validation() {
        assert!(is_valid_email("a@b.com"));
        assert!(is_valid_email("user.name+tag@sub.example.org"));
        assert!(!is_valid_email("not-an-email"));
        assert!(!is_valid_email("a@b"));
        assert!(!is_valid_email("a b@c.com"));
    }

    #[test]
    fn phone_validation() {
        assert!(is_valid_phone_number("+4917612345678"));
        assert!(is_valid_phone_number("5551234567"));
        assert!(!is_valid_phone_number("call-me"));
        assert!(!is_valid_phone_number("+1"));
    }
}
