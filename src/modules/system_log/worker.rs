//! 访问日志的后台落库与 IP 地理信息补全
//!
//! 两个常驻任务：写入任务消费中间件发来的记录并插库；
//! 地理任务查 ip-api.com，结果进 Redis 缓存（7 天）并
//! 回填所有同 IP 日志行的 location 字段。

use sqlx::PgPool;
use tokio::sync::mpsc;
use tracing::{error, info, warn};

use crate::cache::{keys, RedisCache};
use crate::geo::GeoClient;
use crate::middleware::system_log::SystemLogRecord;

/// 地理信息缓存 7 天
pub const GEO_CACHE_TTL_SECS: u64 = 60 * 60 * 24 * 7;

const LOG_CHANNEL_CAPACITY: usize = 1024;
const GEO_CHANNEL_CAPACITY: usize = 256;

/// 启动写入与地理两个任务，返回给中间件用的发送端
pub fn spawn(pool: PgPool, cache: RedisCache, geo: GeoClient) -> mpsc::Sender<SystemLogRecord> {
    let (log_tx, log_rx) = mpsc::channel(LOG_CHANNEL_CAPACITY);
    let (geo_tx, geo_rx) = mpsc::channel(GEO_CHANNEL_CAPACITY);
    tokio::spawn(run_writer(pool.clone(), cache.clone(), log_rx, geo_tx));
    tokio::spawn(run_geo_worker(pool, cache, geo, geo_rx));
    log_tx
}

async fn run_writer(
    pool: PgPool,
    cache: RedisCache,
    mut rx: mpsc::Receiver<SystemLogRecord>,
    geo_tx: mpsc::Sender<String>,
) {
    while let Some(record) = rx.recv().await {
        let cached = match cache.get(&keys::ip_geo(&record.ip)).await {
            Ok(v) => v,
            Err(e) => {
                warn!(ip = %record.ip, error = %e, "读取地理缓存失败");
                None
            }
        };

        // 登录/注册请求总是刷新地理信息，其余仅在缓存未命中时查询
        if (is_auth_route(&record.request_url) || cached.is_none())
            && geo_tx.try_send(record.ip.clone()).is_err()
        {
            warn!(ip = %record.ip, "地理信息队列已满，跳过本次查询");
        }

        let location = cached.and_then(|s| serde_json::from_str::<serde_json::Value>(&s).ok());
        if let Err(e) = insert_record(&pool, &record, location).await {
            error!(url = %record.request_url, error = %e, "访问日志写入失败");
        }
    }
}

async fn run_geo_worker(
    pool: PgPool,
    cache: RedisCache,
    geo: GeoClient,
    mut rx: mpsc::Receiver<String>,
) {
    while let Some(ip) = rx.recv().await {
        let location = match geo.fetch_with_retry(&ip).await {
            Ok(location) => location,
            Err(e) => {
                warn!(ip, error = %e, "IP 地理信息获取失败");
                continue;
            }
        };
        let json = match serde_json::to_string(&location) {
            Ok(json) => json,
            Err(e) => {
                error!(ip, error = %e, "地理信息序列化失败");
                continue;
            }
        };

        if let Err(e) = cache
            .set_ex(&keys::ip_geo(&ip), &json, GEO_CACHE_TTL_SECS)
            .await
        {
            warn!(ip, error = %e, "地理缓存写入失败");
        }

        match sqlx::query("UPDATE system_logs SET location = $1::jsonb WHERE ip = $2")
            .bind(&json)
            .bind(&ip)
            .execute(&pool)
            .await
        {
            Ok(result) => {
                info!(ip, rows = result.rows_affected(), "IP 地理信息已回填");
            }
            Err(e) => {
                error!(ip, error = %e, "地理信息回填失败");
            }
        }
    }
}

async fn insert_record(
    pool: &PgPool,
    record: &SystemLogRecord,
    location: Option<serde_json::Value>,
) -> sqlx::Result<()> {
    sqlx::query(
        r#"
        INSERT INTO system_logs
            (user_id, username, request_url, method, status, ip, user_agent,
             duration_ms, error_msg, params, location)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
        "#,
    )
    .bind(record.user_id)
    .bind(&record.username)
    .bind(&record.request_url)
    .bind(&record.method)
    .bind(record.status)
    .bind(&record.ip)
    .bind(&record.user_agent)
    .bind(record.duration_ms)
    .bind(&record.error_msg)
    .bind(&record.params)
    .bind(location)
    .execute(pool)
    .await?;
    Ok(())
}

/// 登录与邮箱注册请求的地理信息不走缓存
pub fn is_auth_route(url: &str) -> bool {
    url.starts_with("/api/auth/login") || url.starts_with("/api/auth/registerByEmail")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_auth_route_detection() {
        assert!(is_auth_route("/api/auth/login"));
        assert!(is_auth_route("/api/auth/registerByEmail"));
        assert!(!is_auth_route("/api/auth/refresh"));
        assert!(!is_auth_route("/api/users"));
    }

    #[test]
    fn test_geo_ttl_is_seven_days() {
        assert_eq!(GEO_CACHE_TTL_SECS, 7 * 24 * 3600);
    }
}
