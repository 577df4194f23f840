use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::ToSchema;
use validator::Validate;

/// 角色表记录
#[derive(Debug, Clone, Serialize, FromRow, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Role {
    pub id: i64,
    pub name: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, FromRow, ToSchema)]
pub struct PermissionBrief {
    pub id: i64,
    pub name: String,
}

#[derive(Debug, Clone, Serialize, FromRow, ToSchema)]
pub struct UserBrief {
    pub username: Option<String>,
}

/// 列表响应，角色带权限与用户引用
#[derive(Debug, Serialize, ToSchema)]
pub struct RoleWithRefs {
    #[serde(flatten)]
    pub role: Role,
    pub permissions: Vec<PermissionBrief>,
    pub users: Vec<UserBrief>,
}

/// 权限组引用，详情接口里父组原样带出
#[derive(Debug, Clone, Serialize, FromRow, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct PermissionGroupRef {
    pub id: i64,
    pub name: String,
    pub path: String,
    pub parent_id: Option<i64>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct GroupWithParent {
    pub name: String,
    pub parent: Option<PermissionGroupRef>,
}

#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct PermissionWithGroup {
    pub name: String,
    pub permission_group: Option<GroupWithParent>,
}

/// 详情响应，权限展开到所属权限组及其父组
#[derive(Debug, Serialize, ToSchema)]
pub struct RoleDetail {
    #[serde(flatten)]
    pub role: Role,
    pub permissions: Vec<PermissionWithGroup>,
    pub users: Vec<UserBrief>,
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct CreateRoleDto {
    #[validate(length(min = 1, message = "角色名不能为空"))]
    pub name: String,
    /// 权限 ID 数组
    #[serde(default)]
    pub permissions: Vec<i64>,
}

#[derive(Debug, Default, Deserialize, Validate, ToSchema)]
pub struct UpdateRoleDto {
    #[validate(length(min = 1, message = "角色名不能为空"))]
    pub name: Option<String>,
    /// 权限 ID 数组，缺省时清空关联
    pub permissions: Option<Vec<i64>>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_create_dto_defaults_permissions() {
        let dto: CreateRoleDto = serde_json::from_str(r#"{"name":"Editor"}"#).unwrap();
        assert_eq!(dto.name, "Editor");
        assert!(dto.permissions.is_empty());

        let dto: CreateRoleDto =
            serde_json::from_str(r#"{"name":"Editor","permissions":[1,2]}"#).unwrap();
        assert_eq!(dto.permissions, vec![1, 2]);
    }

    #[test]
    fn test_detail_serializes_nested_group() {
        let detail = RoleDetail {
            role: Role {
                id: 1,
                name: "Editor".into(),
                created_at: Utc::now(),
                updated_at: Utc::now(),
            },
            permissions: vec![PermissionWithGroup {
                name: "查看用户".into(),
                permission_group: Some(GroupWithParent {
                    name: "用户管理".into(),
                    parent: None,
                }),
            }],
            users: vec![UserBrief {
                username: Some("admin".into()),
            }],
        };
        let value = serde_json::to_value(&detail).unwrap();
        assert_eq!(value["name"], "Editor");
        assert_eq!(value["permissions"][0]["permissionGroup"]["name"], "用户管理");
        assert!(value["permissions"][0]["permissionGroup"]["parent"].is_null());
        assert_eq!(value["users"][0]["username"], "admin");
    }
}
