use sha2::{Digest, Sha256};

use crate::error::{AppError, AppResult};

// 与既有用户数据的 bcrypt 轮数保持一致
const SALT_ROUNDS: u32 = 10;

/// bcrypt 哈希密码
pub fn hash_password(plain: &str) -> AppResult<String> {
    bcrypt::hash(plain, SALT_ROUNDS).map_err(|e| AppError::Internal(e.into()))
}

/// 校验明文密码与哈希是否匹配
pub fn verify_password(plain: &str, hashed: &str) -> AppResult<bool> {
    bcrypt::verify(plain, hashed).map_err(|e| AppError::Internal(e.into()))
}

/// 刷新令牌落库前先做 SHA-256 摘要再 bcrypt
///
/// bcrypt 只处理前 72 字节，JWT 长度超出该限制。
pub fn hash_refresh_token(token: &str) -> AppResult<String> {
    hash_password(&sha256_hex(token))
}

/// 校验刷新令牌与存储的哈希是否匹配
pub fn verify_refresh_token(token: &str, hashed: &str) -> AppResult<bool> {
    verify_password(&sha256_hex(token), hashed)
}

pub fn sha256_hex(input: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(input.as_bytes());
    hex::encode(hasher.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sha256_hex_known_vector() {
        assert_eq!(
            sha256_hex("abc"),
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
    }

    #[test]
    fn test_password_roundtrip() {
        let hashed = hash_password("admin123").unwrap();
        assert!(verify_password("admin123", &hashed).unwrap());
        assert!(!verify_password("admin124", &hashed).unwrap());
    }

    #[test]
    fn test_refresh_token_roundtrip() {
        // 构造一个超过 72 字节的令牌，确认摘要绕过了 bcrypt 截断
        let token = "x".repeat(200);
        let other = format!("{}y", "x".repeat(199));
        let hashed = hash_refresh_token(&token).unwrap();
        assert!(verify_refresh_token(&token, &hashed).unwrap());
        assert!(!verify_refresh_token(&other, &hashed).unwrap());
    }
}
