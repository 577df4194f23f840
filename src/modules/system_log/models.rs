use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::ToSchema;

#[derive(Debug, Clone, Serialize, FromRow, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct SystemLog {
    pub id: i64,
    pub user_id: Option<i64>,
    pub username: String,
    pub request_url: String,
    pub method: String,
    pub status: i32,
    pub ip: String,
    pub user_agent: Option<String>,
    pub duration_ms: i64,
    pub error_msg: Option<String>,
    /// 请求头（已脱敏）、查询参数与语言
    #[schema(value_type = Object)]
    pub params: serde_json::Value,
    /// ip-api.com 返回的地理信息，异步回填
    #[schema(value_type = Object, nullable)]
    pub location: Option<serde_json::Value>,
    pub created_at: DateTime<Utc>,
}

/// 日志分页响应，固定 {total, data, page, pageSize}
#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct SystemLogPage {
    pub total: i64,
    pub data: Vec<SystemLog>,
    pub page: u64,
    pub page_size: u64,
}

#[derive(Debug, Default, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct LogQuery {
    pub user_id: Option<i64>,
    pub username: Option<String>,
    pub request_url: Option<String>,
    pub method: Option<String>,
    pub status: Option<i32>,
    pub start_time: Option<DateTime<Utc>>,
    pub end_time: Option<DateTime<Utc>>,
    pub page: Option<u64>,
    pub page_size: Option<u64>,
}

impl LogQuery {
    pub fn page(&self) -> u64 {
        match self.page {
            Some(p) if p > 0 => p,
            _ => 1,
        }
    }

    pub fn page_size(&self) -> u64 {
        match self.page_size {
            Some(s) if s > 0 => s,
            _ => 10,
        }
    }
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct ClearQuery {
    /// 保留最近多少天的日志
    pub days: i64,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct ClearResult {
    pub message: String,
    pub count: u64,
}
