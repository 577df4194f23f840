use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::comm::config::ConfigManager;
use crate::comm::duration::parse_duration_secs;
use crate::error::{AppError, AppResult};

const DEFAULT_ACCESS_EXPIRES: i64 = 86400; // 1d
const DEFAULT_REFRESH_EXPIRES: i64 = 604800; // 7d

/// JWT 载荷
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Claims {
    pub user_id: i64,
    pub iat: i64,
    pub exp: i64,
}

/// 一次签发的令牌对
#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct TokenPair {
    pub access_token: String,
    pub refresh_token: String,
    pub access_expires_in: i64,
    pub refresh_expires_in: i64,
}

/// 访问/刷新令牌签发器，双密钥 HS256
#[derive(Clone)]
pub struct TokenIssuer {
    access_secret: String,
    refresh_secret: String,
    access_expires_in: i64,
    refresh_expires_in: i64,
}

impl TokenIssuer {
    pub fn new(
        access_secret: impl Into<String>,
        refresh_secret: impl Into<String>,
        access_expires_in: i64,
        refresh_expires_in: i64,
    ) -> Self {
        Self {
            access_secret: access_secret.into(),
            refresh_secret: refresh_secret.into(),
            access_expires_in,
            refresh_expires_in,
        }
    }

    /// 从配置构建，读取 `jwt.{access_secret,refresh_secret}` 与
    /// `security.{expires_in,refresh_in}`
    pub fn from_config(mgr: &ConfigManager) -> AppResult<Self> {
        let access_secret: String = mgr.get_safe("jwt.access_secret")?;
        let refresh_secret: String = mgr.get_safe("jwt.refresh_secret")?;
        let expires_in: String = mgr.get_or("security.expires_in", "1d".to_string());
        let refresh_in: String = mgr.get_or("security.refresh_in", "7d".to_string());
        Ok(Self::new(
            access_secret,
            refresh_secret,
            parse_duration_secs(&expires_in).unwrap_or(DEFAULT_ACCESS_EXPIRES),
            parse_duration_secs(&refresh_in).unwrap_or(DEFAULT_REFRESH_EXPIRES),
        ))
    }

    /// 同时签发访问令牌与刷新令牌
    pub fn issue_pair(&self, user_id: i64) -> AppResult<TokenPair> {
        Ok(TokenPair {
            access_token: self.sign(user_id, &self.access_secret, self.access_expires_in)?,
            refresh_token: self.sign(user_id, &self.refresh_secret, self.refresh_expires_in)?,
            access_expires_in: self.access_expires_in,
            refresh_expires_in: self.refresh_expires_in,
        })
    }

    fn sign(&self, user_id: i64, secret: &str, expires_in: i64) -> AppResult<String> {
        let now = chrono::Utc::now().timestamp();
        let claims = Claims {
            user_id,
            iat: now,
            exp: now + expires_in,
        };
        encode(
            &Header::default(),
            &claims,
            &EncodingKey::from_secret(secret.as_bytes()),
        )
        .map_err(|e| AppError::auth(format!("令牌签发失败: {}", e)))
    }

    pub fn verify_access(&self, token: &str) -> AppResult<Claims> {
        Self::verify(token, &self.access_secret)
    }

    pub fn verify_refresh(&self, token: &str) -> AppResult<Claims> {
        Self::verify(token, &self.refresh_secret)
    }

    fn verify(token: &str, secret: &str) -> AppResult<Claims> {
        decode::<Claims>(
            token,
            &DecodingKey::from_secret(secret.as_bytes()),
            &Validation::default(),
        )
        .map(|data| data.claims)
        .map_err(|_| AppError::auth("无效或过期的令牌"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn issuer() -> TokenIssuer {
        TokenIssuer::new("access-secret", "refresh-secret", 3600, 7200)
    }

    #[test]
    fn test_issue_and_verify_pair() {
        let issuer = issuer();
        let pair = issuer.issue_pair(42).unwrap();

        let access = issuer.verify_access(&pair.access_token).unwrap();
        assert_eq!(access.user_id, 42);
        assert_eq!(access.exp - access.iat, 3600);

        let refresh = issuer.verify_refresh(&pair.refresh_token).unwrap();
        assert_eq!(refresh.user_id, 42);
        assert_eq!(refresh.exp - refresh.iat, 7200);
    }

    #[test]
    fn test_secrets_are_not_interchangeable() {
        let issuer = issuer();
        let pair = issuer.issue_pair(1).unwrap();
        assert!(issuer.verify_access(&pair.refresh_token).is_err());
        assert!(issuer.verify_refresh(&pair.access_token).is_err());
    }

    #[test]
    fn test_wrong_secret_rejected() {
        let pair = issuer().issue_pair(7).unwrap();
        let other = TokenIssuer::new("other", "other", 3600, 7200);
        assert!(other.verify_access(&pair.access_token).is_err());
    }

    #[test]
    fn test_expired_token_rejected() {
        // exp 落在默认 60s leeway 之前
        let issuer = TokenIssuer::new("access-secret", "refresh-secret", -120, -120);
        let pair = issuer.issue_pair(9).unwrap();
        assert!(issuer.verify_access(&pair.access_token).is_err());
    }

    #[test]
    fn test_garbage_token_rejected() {
        assert!(issuer().verify_access("not-a-jwt").is_err());
    }
}
