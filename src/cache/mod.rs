use redis::aio::ConnectionManager;
use redis::{AsyncCommands, Client};

use crate::comm::config::ConfigManager;
use crate::error::AppResult;

/// Redis 缓存客户端，内部使用自动重连的 ConnectionManager
#[derive(Clone)]
pub struct RedisCache {
    manager: ConnectionManager,
}

impl RedisCache {
    pub async fn connect(url: &str) -> AppResult<Self> {
        let client = Client::open(url).map_err(crate::error::AppError::from)?;
        let manager = ConnectionManager::new(client).await?;
        Ok(Self { manager })
    }

    /// 从配置构建，读取 `redis.url` 或 `redis.{host,port,pass,db}`
    pub async fn from_config(mgr: &ConfigManager) -> AppResult<Self> {
        let url = match mgr.get::<String>("redis.url") {
            Ok(url) => url,
            Err(_) => {
                let host: String = mgr.get_or("redis.host", "127.0.0.1".to_string());
                let port: i64 = mgr.get_or("redis.port", 6379);
                let pass: String = mgr.get_or("redis.pass", "".to_string());
                let db: i64 = mgr.get_or("redis.db", 0);
                build_redis_url(&host, port, &pass, db)
            }
        };
        Self::connect(&url).await
    }

    pub async fn get(&self, key: &str) -> AppResult<Option<String>> {
        let mut conn = self.manager.clone();
        Ok(conn.get(key).await?)
    }

    pub async fn set(&self, key: &str, value: &str) -> AppResult<()> {
        let mut conn = self.manager.clone();
        conn.set::<_, _, ()>(key, value).await?;
        Ok(())
    }

    /// 写入并设置过期时间（秒）
    pub async fn set_ex(&self, key: &str, value: &str, ttl_secs: u64) -> AppResult<()> {
        let mut conn = self.manager.clone();
        conn.set_ex::<_, _, ()>(key, value, ttl_secs).await?;
        Ok(())
    }

    pub async fn del(&self, key: &str) -> AppResult<()> {
        let mut conn = self.manager.clone();
        conn.del::<_, ()>(key).await?;
        Ok(())
    }

    pub async fn exists(&self, key: &str) -> AppResult<bool> {
        let mut conn = self.manager.clone();
        Ok(conn.exists(key).await?)
    }

    /// 比较存储值与输入值是否一致，键不存在视为不一致
    pub async fn compare_token(&self, key: &str, input: &str) -> AppResult<bool> {
        Ok(self.get(key).await?.as_deref() == Some(input))
    }
}

pub fn build_redis_url(host: &str, port: i64, pass: &str, db: i64) -> String {
    if pass.is_empty() {
        format!("redis://{}:{}/{}", host, port, db)
    } else {
        format!("redis://:{}@{}:{}/{}", urlencoding::encode(pass), host, port, db)
    }
}

/// Redis key 约定，与既有数据保持一致
pub mod keys {
    /// 邮箱验证码令牌，令牌本身即为 Redis key
    pub fn email_verification(email: &str, suffix: &str) -> String {
        format!("emailVerification:{}_{}", email, suffix)
    }

    /// 邮箱验证码重发记录
    pub fn email_refresh(email: &str) -> String {
        format!("emailRefresh:{}", email)
    }

    /// 短信验证码令牌
    pub fn sms_verification(phone: &str, suffix: &str) -> String {
        format!("smsVerification:{}_{}", phone, suffix)
    }

    /// IP 地理位置缓存
    pub fn ip_geo(ip: &str) -> String {
        format!("ip:geo:{}", ip)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_build_redis_url() {
        assert_eq!(build_redis_url("127.0.0.1", 6379, "", 0), "redis://127.0.0.1:6379/0");
        assert_eq!(
            build_redis_url("cache", 6380, "p@ss", 1),
            "redis://:p%40ss@cache:6380/1"
        );
    }

    #[test]
    fn test_key_conventions() {
        assert_eq!(
            keys::email_verification("a@b.com", "deadbeef"),
            "emailVerification:a@b.com_deadbeef"
        );
        assert_eq!(keys::email_refresh("a@b.com"), "emailRefresh:a@b.com");
        assert_eq!(
            keys::sms_verification("18300000000", "cafe"),
            "smsVerification:18300000000_cafe"
        );
        assert_eq!(keys::ip_geo("1.2.3.4"), "ip:geo:1.2.3.4");
    }
}
