use captcha_rs::{Captcha, CaptchaBuilder};
use tracing::debug;

use crate::cache::RedisCache;
use crate::comm::random;
use crate::error::AppResult;

/// 验证码存活时间（秒）
pub const CAPTCHA_TTL_SECS: u64 = 300;

pub struct GeneratedCaptcha {
    /// base64 data URL
    pub image: String,
    pub token: String,
}

fn build_captcha() -> Captcha {
    CaptchaBuilder::new()
        .length(4)
        .width(150)
        .height(45)
        .dark_mode(false)
        .complexity(5) // min: 1, max: 10
        .compression(99) // min: 1, max: 99
        .build()
}

/// 生成验证码并以 token 为 key 存入 Redis
pub async fn generate(redis: &RedisCache) -> AppResult<GeneratedCaptcha> {
    let captcha = build_captcha();
    let token = random::token_id("captcha");
    redis.set_ex(&token, &captcha.text, CAPTCHA_TTL_SECS).await?;
    debug!("captcha issued: token={}", token);
    Ok(GeneratedCaptcha {
        image: captcha.to_base64(),
        token,
    })
}

/// 校验验证码；key 留待过期，不在校验后删除
pub async fn validate(redis: &RedisCache, token: &str, input: &str) -> AppResult<bool> {
    let stored = redis.get(token).await?;
    Ok(matches(stored.as_deref(), Some(input)))
}

/// 大小写不敏感比较，token 不存在或输入缺失时一律不通过
pub fn matches(stored: Option<&str>, input: Option<&str>) -> bool {
    match (stored, input) {
        (Some(stored), Some(input)) => stored.to_lowercase() == input.to_lowercase(),
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_matches_is_case_insensitive() {
        assert!(matches(Some("Ab3D"), Some("ab3d")));
        assert!(matches(Some("ab3d"), Some("AB3D")));
        assert!(!matches(Some("ab3d"), Some("ab3e")));
    }

    #[test]
    fn test_unknown_token_never_validates() {
        assert!(!matches(None, Some("anything")));
        assert!(!matches(Some("ab3d"), None));
        assert!(!matches(None, None));
    }

    #[test]
    fn test_build_captcha_shape() {
        let captcha = build_captcha();
        assert_eq!(captcha.text.len(), 4);
        assert!(captcha.to_base64().starts_with("data:image/"));
    }
}
