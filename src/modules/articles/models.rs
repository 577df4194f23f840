use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::ToSchema;
use validator::Validate;

/// 文章表记录
#[derive(Debug, Clone, Serialize, FromRow, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Article {
    pub id: i64,
    pub title: String,
    pub description: Option<String>,
    pub body: String,
    pub published: bool,
    pub author_id: Option<i64>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CreateArticleDto {
    #[validate(length(min = 1, message = "标题不能为空"))]
    pub title: String,
    pub description: Option<String>,
    #[validate(length(min = 1, message = "正文不能为空"))]
    pub body: String,
    #[serde(default)]
    pub published: bool,
    pub author_id: Option<i64>,
}

#[derive(Debug, Default, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct UpdateArticleDto {
    #[validate(length(min = 1, message = "标题不能为空"))]
    pub title: Option<String>,
    pub description: Option<String>,
    pub body: Option<String>,
    pub published: Option<bool>,
    pub author_id: Option<i64>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_create_dto_published_defaults_false() {
        let dto: CreateArticleDto =
            serde_json::from_str(r#"{"title":"Hello","body":"World"}"#).unwrap();
        assert!(!dto.published);
        assert!(dto.author_id.is_none());
    }

    #[test]
    fn test_article_serializes_camel_case() {
        let now = Utc::now();
        let article = Article {
            id: 1,
            title: "Hello".into(),
            description: None,
            body: "World".into(),
            published: true,
            author_id: Some(2),
            created_at: now,
            updated_at: now,
        };
        let value = serde_json::to_value(&article).unwrap();
        assert_eq!(value["authorId"], 2);
        assert!(value["description"].is_null());
        assert!(value.get("createdAt").is_some());
    }
}
