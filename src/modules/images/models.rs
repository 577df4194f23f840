use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::ToSchema;
use validator::{Validate, ValidationError};

/// 图片分类取值
pub const CATEGORIES: [&str; 3] = ["安全", "质量", "进度"];
pub const DEFAULT_CATEGORY: &str = "进度";

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ImageThumbnail {
    pub size: String,
    pub path: String,
    pub url: String,
}

/// GPS 坐标，入库前序列化为 JSON 字符串
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct LocationDto {
    pub latitude: f64,
    pub longitude: f64,
}

/// 图片表记录
#[derive(Debug, Clone, Serialize, FromRow, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Image {
    pub id: i64,
    pub description: String,
    pub area: String,
    pub photos: Vec<String>,
    #[schema(value_type = Vec<ImageThumbnail>)]
    pub thumbnails: sqlx::types::Json<Vec<ImageThumbnail>>,
    /// JSON 字符串形式的 GPS 坐标，原样返回给前端
    pub location: Option<String>,
    pub stake_number: Option<String>,
    pub offset: Option<f64>,
    pub category: String,
    pub tags: Vec<String>,
    pub created_by_id: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, FromRow, ToSchema)]
pub struct Creator {
    pub id: i64,
    pub username: Option<String>,
    pub avatar: String,
}

#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ImageWithCreator {
    #[serde(flatten)]
    pub image: Image,
    pub created_by: Creator,
}

/// 图片列表分页元信息，不带 totalPages
#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ImagePagination {
    pub current: u32,
    pub page_size: u32,
    pub total: u64,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct ImagePage {
    pub data: Vec<ImageWithCreator>,
    pub pagination: ImagePagination,
}

#[derive(Debug, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ImagePageQuery {
    #[serde(default = "default_current")]
    pub current: u32,
    #[serde(default = "default_page_size")]
    pub page_size: u32,
    pub description: Option<String>,
    pub area: Option<String>,
    pub category: Option<String>,
    pub stake_number: Option<String>,
    /// 逗号分隔的标签列表，任一命中即返回
    pub tags: Option<String>,
    /// JSON 字符串，形如 `{"username":"张"}`
    pub created_by: Option<String>,
    pub start_date: Option<String>,
    pub end_date: Option<String>,
}

fn default_current() -> u32 {
    1
}
fn default_page_size() -> u32 {
    10
}

#[derive(Debug, Deserialize)]
pub struct CreatedByFilter {
    pub username: Option<String>,
}

fn validate_category(value: &str) -> Result<(), ValidationError> {
    if CATEGORIES.contains(&value) {
        return Ok(());
    }
    Err(ValidationError::new("category"))
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CreateImageDto {
    #[validate(length(min = 1, message = "描述不能为空"))]
    pub description: String,
    #[validate(length(min = 1, message = "区域不能为空"))]
    pub area: String,
    pub photos: Vec<String>,
    /// 创建时仅接受字段，缩略图由后续处理写入
    pub thumbnails: Option<Vec<ImageThumbnail>>,
    pub location: Option<LocationDto>,
    pub stake_number: Option<String>,
    pub offset: Option<f64>,
    #[validate(custom(function = validate_category, message = "无效的分类"))]
    pub category: Option<String>,
    pub tags: Option<Vec<String>>,
}

#[derive(Debug, Default, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct UpdateImageDto {
    #[validate(length(min = 1, message = "描述不能为空"))]
    pub description: Option<String>,
    pub area: Option<String>,
    pub photos: Option<Vec<String>>,
    pub thumbnails: Option<Vec<ImageThumbnail>>,
    pub location: Option<LocationDto>,
    pub stake_number: Option<String>,
    pub offset: Option<f64>,
    #[validate(custom(function = validate_category, message = "无效的分类"))]
    pub category: Option<String>,
    pub tags: Option<Vec<String>>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_category_validation() {
        let dto: CreateImageDto = serde_json::from_str(
            r#"{"description":"d","area":"a","photos":[],"category":"质量"}"#,
        )
        .unwrap();
        assert!(dto.validate().is_ok());

        let dto: CreateImageDto = serde_json::from_str(
            r#"{"description":"d","area":"a","photos":[],"category":"其他"}"#,
        )
        .unwrap();
        assert!(dto.validate().is_err());

        // 缺省分类合法，由服务端补默认值
        let dto: CreateImageDto =
            serde_json::from_str(r#"{"description":"d","area":"a","photos":[]}"#).unwrap();
        assert!(dto.validate().is_ok());
    }

    #[test]
    fn test_image_serializes_with_creator() {
        let now = Utc::now();
        let entry = ImageWithCreator {
            image: Image {
                id: 1,
                description: "桥面铺装".into(),
                area: "K12标段".into(),
                photos: vec!["https://cdn/x.jpg".into()],
                thumbnails: sqlx::types::Json(vec![]),
                location: Some(r#"{"latitude":30.5,"longitude":114.3}"#.into()),
                stake_number: Some("K12+300".into()),
                offset: Some(1.5),
                category: "进度".into(),
                tags: vec!["桥梁".into()],
                created_by_id: 2,
                created_at: now,
                updated_at: now,
            },
            created_by: Creator {
                id: 2,
                username: Some("张工".into()),
                avatar: "https://gravatar.com/avatar/0000?d=mp&f=y".into(),
            },
        };
        let value = serde_json::to_value(&entry).unwrap();
        assert_eq!(value["stakeNumber"], "K12+300");
        assert_eq!(value["createdBy"]["username"], "张工");
        assert_eq!(value["createdById"], 2);
        assert!(value["thumbnails"].as_array().unwrap().is_empty());
    }

    #[test]
    fn test_page_query_defaults() {
        let q: ImagePageQuery = serde_json::from_str("{}").unwrap();
        assert_eq!(q.current, 1);
        assert_eq!(q.page_size, 10);
        assert!(q.tags.is_none());
    }
}
