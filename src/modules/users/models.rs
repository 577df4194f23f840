use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::ToSchema;
use validator::Validate;

use crate::comm::pagination::PageQuery;

/// 用户行；密码与刷新令牌哈希永不序列化
#[derive(Debug, Clone, Serialize, FromRow, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: i64,
    pub email: String,
    #[serde(skip_serializing)]
    pub password: String,
    #[serde(skip_serializing)]
    pub hashed_rt: Option<String>,
    pub status: String,
    pub username: Option<String>,
    pub avatar: String,
    pub gender: Option<String>,
    pub is_admin: bool,
    pub department_id: Option<i64>,
    pub phone_number: Option<String>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub wechat_id: Option<String>,
    pub mini_wechat_id: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, FromRow, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct RoleItem {
    pub id: i64,
    pub name: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct UserWithRoles {
    #[serde(flatten)]
    pub user: User,
    pub roles: Vec<RoleItem>,
}

#[derive(Debug, Clone, Serialize, FromRow, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct PermissionItem {
    pub id: i64,
    pub name: String,
    pub action: String,
    pub path: String,
    pub permission_group_id: Option<i64>,
}

#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct RoleWithPermissions {
    pub id: i64,
    pub name: String,
    pub permissions: Vec<PermissionItem>,
}

/// 当前用户画像：用户 + 角色 + 角色下的权限
#[derive(Debug, Serialize, ToSchema)]
pub struct UserProfile {
    #[serde(flatten)]
    pub user: User,
    pub roles: Vec<RoleWithPermissions>,
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CreateUserDto {
    #[validate(length(min = 1, message = "用户名不能为空"))]
    pub username: String,
    #[validate(email(message = "请输入有效的邮箱地址"))]
    pub email: String,
    #[validate(length(min = 6, message = "密码至少 6 位"))]
    pub password: String,
    #[validate(length(min = 1))]
    pub status: String,
    pub avatar: Option<String>,
    #[validate(length(min = 1))]
    pub gender: String,
    // 请求体兼容字段；创建时固定 is_admin=false、department_id=123
    #[serde(default)]
    pub is_admin: bool,
    pub department_id: Option<i64>,
    /// 角色 ID 数组
    pub roles: Vec<i64>,
}

#[derive(Debug, Default, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct UpdateUserDto {
    pub username: Option<String>,
    #[validate(email(message = "请输入有效的邮箱地址"))]
    pub email: Option<String>,
    #[validate(length(min = 6, message = "密码至少 6 位"))]
    pub password: Option<String>,
    pub status: Option<String>,
    pub avatar: Option<String>,
    pub gender: Option<String>,
    pub is_admin: Option<bool>,
    pub department_id: Option<i64>,
    /// 角色 ID 数组；缺省时清空关联
    pub roles: Option<Vec<i64>>,
}

/// 分页查询参数；isAdmin 以字符串 'true'/'false' 传入
#[derive(Debug, Default, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct UserPageQuery {
    #[serde(default = "default_current")]
    pub current: u32,
    #[serde(default = "default_page_size")]
    pub page_size: u32,
    /// antd 表格排序参数，形如 `{"createdAt":"descend"}`
    pub sorter: Option<String>,
    pub username: Option<String>,
    pub email: Option<String>,
    pub status: Option<String>,
    pub is_admin: Option<String>,
}

fn default_current() -> u32 {
    1
}
fn default_page_size() -> u32 {
    10
}

impl UserPageQuery {
    pub fn page(&self) -> PageQuery {
        PageQuery {
            current: self.current,
            page_size: self.page_size,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_user_serialization_hides_secrets() {
        let user = User {
            id: 1,
            email: "a@b.com".to_string(),
            password: "$2b$10$secret".to_string(),
            hashed_rt: Some("$2b$10$rt".to_string()),
            status: "1".to_string(),
            username: Some("admin".to_string()),
            avatar: "https://gravatar.com/avatar/0000?d=mp&f=y".to_string(),
            gender: Some("1".to_string()),
            is_admin: true,
            department_id: Some(1),
            phone_number: None,
            first_name: None,
            last_name: None,
            wechat_id: None,
            mini_wechat_id: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        };
        let value = serde_json::to_value(&user).unwrap();
        assert!(value.get("password").is_none());
        assert!(value.get("hashedRt").is_none());
        assert_eq!(value["isAdmin"], true);
        assert_eq!(value["departmentId"], 1);
    }

    #[test]
    fn test_update_dto_partial() {
        let dto: UpdateUserDto =
            serde_json::from_value(serde_json::json!({ "username": "改名" })).unwrap();
        assert_eq!(dto.username.as_deref(), Some("改名"));
        assert!(dto.roles.is_none());
        assert!(dto.validate().is_ok());
    }

    #[test]
    fn test_create_dto_requires_valid_email() {
        let dto: CreateUserDto = serde_json::from_value(serde_json::json!({
            "username": "u",
            "email": "bad",
            "password": "secret1",
            "status": "1",
            "gender": "1",
            "roles": [1]
        }))
        .unwrap();
        assert!(dto.validate().is_err());
    }
}
