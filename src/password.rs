// password.rs
// Salted, iterated SHA-256 password hashes stored as "sha256$<iterations>$<salt hex>$<hash hex>".

use data_encoding::{BASE32_NOPAD, HEXLOWER};
use rand::RngCore;
use sha2::{Digest, Sha256};

pub const MIN_PASSWORD_LEN: usize = 6;
const ITERATIONS: u32 = 10_000;
const SALT_BYTES: usize = 16;
const SCHEME: &str = "sha256";

pub fn hash_password(plain: &str) -> String {
    let mut salt = [0u8; SALT_BYTES];
    rand::rng().fill_bytes(&mut salt);
    let digest = derive(plain, &salt, ITERATIONS);
    format!(
        "{SCHEME}${ITERATIONS}${}${}",
        HEXLOWER.encode(&salt),
        HEXLOWER.encode(&digest)
    )
}

pub fn verify_password(plain: &str, stored: &str) -> bool {
    let mut parts = stored.split('$');
    let (Some(scheme), Some(iterations), Some(salt), Some(expected), None) = (
        parts.next(),
        parts.next(),
        parts.next(),
        parts.next(),
        parts.next(),
    ) else {
        return false;
    };
    if scheme != SCHEME {
        return false;
    }
    let Ok(iterations) = iterations.parse::<u32>() else {
        return false;
    };
    let (Ok(salt), Ok(expected)) = (
        HEXLOWER.decode(salt.as_bytes()),
        HEXLOWER.decode(expected.as_bytes()),
    ) else {
        return false;
    };
    let actual = derive(plain, &salt, iterations.max(1));
    constant_time_eq(&actual, &expected)
}

/// Random Base32 (NOPAD) token of `bytes` random bytes.
pub fn generate_token(bytes: usize) -> String {
    let mut buf = vec![0u8; bytes];
    rand::rng().fill_bytes(&mut buf);
    BASE32_NOPAD.encode(&buf)
}

fn derive(plain: &str, salt: &[u8], iterations: u32) -> Vec<u8> {
    let mut digest = Sha256::new()
        .chain_update(salt)
        .chain_update(plain.as_bytes())
        .finalize()
        .to_vec();
    for _ in 1..iterations {
        digest = Sha256::new()
            .chain_update(salt)
            .chain_update(&digest)
            .finalize()
            .to_vec();
    }
    digest
}

fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    a.iter().zip(b).fold(0u8, |acc, (x, y)| acc | (x ^ y)) == 0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hash_verifies_only_the_same_password() {
        let stored = hash_password("admin123");
        assert!(stored.starts_with("sha256$"));
        assert!(verify_password("admin123", &stored));
        assert!(!verify_password("admin124", &stored));
    }

    #[test]
    fn same_password_gets_different_salts() {
        assert_ne!(hash_password("secreto"), hash_password("secreto"));
    }

    #[test]
    fn malformed_hashes_never_verify() {
        assert!(!verify_password("x", ""));
        assert!(!verify_password("x", "plain-text"));
        assert!(!verify_password("x", "md5$1$00$00"));
    }

    #[test]
    fn tokens_are_base32() {
        let token = generate_token(32);
        assert!(token.len() >= 51);
        assert!(BASE32_NOPAD.decode(token.as_bytes()).is_ok());
    }
}
