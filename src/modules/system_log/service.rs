use chrono::{Duration, Utc};
use sqlx::PgPool;

use crate::error::{AppError, AppResult};

use super::models::{ClearResult, LogQuery, SystemLog, SystemLogPage};

const FILTER_CLAUSE: &str = r#"
    ($1::bigint IS NULL OR user_id = $1)
    AND ($2::text IS NULL OR username LIKE '%' || $2 || '%')
    AND ($3::text IS NULL OR request_url LIKE '%' || $3 || '%')
    AND ($4::text IS NULL OR method = $4)
    AND ($5::int IS NULL OR status = $5)
    AND ($6::timestamptz IS NULL OR created_at >= $6)
    AND ($7::timestamptz IS NULL OR created_at <= $7)
"#;

pub async fn find_all(pool: &PgPool, query: &LogQuery) -> AppResult<SystemLogPage> {
    let total: i64 = sqlx::query_scalar(&format!(
        "SELECT COUNT(*) FROM system_logs WHERE {}",
        FILTER_CLAUSE
    ))
    .bind(query.user_id)
    .bind(&query.username)
    .bind(&query.request_url)
    .bind(&query.method)
    .bind(query.status)
    .bind(query.start_time)
    .bind(query.end_time)
    .fetch_one(pool)
    .await?;

    let page = query.page();
    let page_size = query.page_size();
    let data: Vec<SystemLog> = sqlx::query_as(&format!(
        "SELECT * FROM system_logs WHERE {} ORDER BY created_at DESC LIMIT $8 OFFSET $9",
        FILTER_CLAUSE
    ))
    .bind(query.user_id)
    .bind(&query.username)
    .bind(&query.request_url)
    .bind(&query.method)
    .bind(query.status)
    .bind(query.start_time)
    .bind(query.end_time)
    .bind(page_size as i64)
    .bind(((page - 1) * page_size) as i64)
    .fetch_all(pool)
    .await?;

    Ok(SystemLogPage {
        total,
        data,
        page,
        page_size,
    })
}

pub async fn find_one(pool: &PgPool, id: i64) -> AppResult<SystemLog> {
    let log: Option<SystemLog> = sqlx::query_as("SELECT * FROM system_logs WHERE id = $1")
        .bind(id)
        .fetch_optional(pool)
        .await?;
    log.ok_or_else(|| AppError::not_found(format!("Log #{}", id)))
}

/// 按同样的过滤条件导出全部，不分页
pub async fn export(pool: &PgPool, query: &LogQuery) -> AppResult<Vec<SystemLog>> {
    let logs: Vec<SystemLog> = sqlx::query_as(&format!(
        "SELECT * FROM system_logs WHERE {} ORDER BY created_at DESC",
        FILTER_CLAUSE
    ))
    .bind(query.user_id)
    .bind(&query.username)
    .bind(&query.request_url)
    .bind(&query.method)
    .bind(query.status)
    .bind(query.start_time)
    .bind(query.end_time)
    .fetch_all(pool)
    .await?;
    Ok(logs)
}

/// 清掉 days 天之前的日志
pub async fn clear(pool: &PgPool, days: i64) -> AppResult<ClearResult> {
    let cutoff = Utc::now() - Duration::days(days);
    let result = sqlx::query("DELETE FROM system_logs WHERE created_at < $1")
        .bind(cutoff)
        .execute(pool)
        .await?;
    let count = result.rows_affected();
    Ok(ClearResult {
        message: format!("Cleared {} logs older than {} days", count, days),
        count,
    })
}
