use sha2::{Digest, Sha256};
use uuid::Uuid;

const SCHEME: &str = "sha256";

fn digest(salt: &str, password: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(salt.as_bytes());
    hasher.update(password.as_bytes());
    format!("{:x}", hasher.finalize())
}

/// `sha256${salt}${hex digest}` with a random per-password salt
pub fn hash_password(password: &str) -> String {
    let salt = Uuid::new_v4().simple().to_string();
    format!("{}${}${}", SCHEME, salt, digest(&salt, password))
}

pub fn verify_password(password: &str, stored: &str) -> bool {
    let mut parts = stored.splitn(3, '$');
    match (parts.next(), parts.next(), parts.next()) {
        (Some(SCHEME), Some(salt), Some(expected)) => digest(salt, password) == expected,
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn verifies_only_the_right_password() {
        let stored = hash_password("s3cret");
        assert!(stored.starts_with("sha256$"));
        assert!(!stored.contains("s3cret"));
        assert!(verify_password("s3cret", &stored));
        assert!(!verify_password("s3cret!", &stored));
    }

    #[test]
    fn salts_each_hash() {
        assert_ne!(hash_password("same"), hash_password("same"));
        assert!(!verify_password("x", "plaintext"));
    }
}
