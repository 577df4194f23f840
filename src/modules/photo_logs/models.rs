use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::ToSchema;
use validator::Validate;

use crate::modules::images::models::Creator;

#[derive(Debug, Clone, Serialize, FromRow, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct PhotoLog {
    pub id: i64,
    pub description: String,
    pub area: String,
    pub photos: Vec<String>,
    pub created_by_id: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct PhotoLogWithCreator {
    #[serde(flatten)]
    pub log: PhotoLog,
    pub created_by: Creator,
}

/// 分页响应，pagination 固定 {current, pageSize, total}
#[derive(Debug, Serialize, ToSchema)]
pub struct PhotoLogPage {
    pub data: Vec<PhotoLogWithCreator>,
    pub pagination: PhotoLogPagination,
}

#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct PhotoLogPagination {
    pub current: u32,
    pub page_size: u32,
    pub total: u64,
}

#[derive(Debug, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct PhotoLogPageQuery {
    #[serde(default = "default_current")]
    pub current: u32,
    #[serde(default = "default_page_size")]
    pub page_size: u32,
}

fn default_current() -> u32 {
    1
}

fn default_page_size() -> u32 {
    10
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CreatePhotoLogDto {
    #[validate(length(min = 1, message = "描述不能为空"))]
    pub description: String,
    #[validate(length(min = 1, message = "区域不能为空"))]
    pub area: String,
    pub photos: Vec<String>,
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct UpdatePhotoLogDto {
    #[validate(length(min = 1, message = "描述不能为空"))]
    pub description: Option<String>,
    #[validate(length(min = 1, message = "区域不能为空"))]
    pub area: Option<String>,
    pub photos: Option<Vec<String>>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_page_query_defaults() {
        let q: PhotoLogPageQuery = serde_json::from_str("{}").unwrap();
        assert_eq!(q.current, 1);
        assert_eq!(q.page_size, 10);

        let q: PhotoLogPageQuery =
            serde_json::from_str(r#"{"current": 3, "pageSize": 20}"#).unwrap();
        assert_eq!(q.current, 3);
        assert_eq!(q.page_size, 20);
    }

    #[test]
    fn test_entry_serialization() {
        let entry = PhotoLogWithCreator {
            log: PhotoLog {
                id: 1,
                description: "桩基施工".to_string(),
                area: "K12+300".to_string(),
                photos: vec!["a.jpg".to_string()],
                created_by_id: 7,
                created_at: Utc::now(),
                updated_at: Utc::now(),
            },
            created_by: Creator {
                id: 7,
                username: Some("张三".to_string()),
                avatar: "https://gravatar.com/avatar/x".to_string(),
            },
        };
        let v = serde_json::to_value(&entry).unwrap();
        assert_eq!(v["createdById"], 7);
        assert_eq!(v["createdBy"]["username"], "张三");
        assert_eq!(v["photos"][0], "a.jpg");
    }
}
