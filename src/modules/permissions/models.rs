use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::ToSchema;
use validator::Validate;

/// 权限表记录，(action, path) 与路由声明逐字匹配
#[derive(Debug, Clone, Serialize, FromRow, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Permission {
    pub id: i64,
    pub name: String,
    pub action: String,
    pub path: String,
    pub permission_group_id: Option<i64>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, FromRow, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct GroupRef {
    pub id: i64,
    pub name: String,
    pub path: String,
    pub parent_id: Option<i64>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct GroupWithParent {
    #[serde(flatten)]
    pub group: GroupRef,
    pub parent: Option<GroupRef>,
}

/// 列表响应，权限带所属权限组及其父组
#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct PermissionWithGroup {
    #[serde(flatten)]
    pub permission: Permission,
    pub permission_group: Option<GroupWithParent>,
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CreatePermissionDto {
    #[validate(length(min = 1, message = "权限名不能为空"))]
    pub name: String,
    #[validate(length(min = 1, message = "action 不能为空"))]
    pub action: String,
    #[validate(length(min = 1, message = "path 不能为空"))]
    pub path: String,
    pub permission_group_id: i64,
}

#[derive(Debug, Default, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct UpdatePermissionDto {
    #[validate(length(min = 1, message = "权限名不能为空"))]
    pub name: Option<String>,
    pub action: Option<String>,
    pub path: Option<String>,
    pub permission_group_id: Option<i64>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_create_dto_camel_case() {
        let dto: CreatePermissionDto = serde_json::from_str(
            r#"{"name":"查看用户","action":"GET","path":"/users","permissionGroupId":2}"#,
        )
        .unwrap();
        assert_eq!(dto.action, "GET");
        assert_eq!(dto.permission_group_id, 2);
    }

    #[test]
    fn test_group_flattens_into_response() {
        let now = Utc::now();
        let entry = PermissionWithGroup {
            permission: Permission {
                id: 7,
                name: "查看用户".into(),
                action: "GET".into(),
                path: "/users".into(),
                permission_group_id: Some(2),
                created_at: now,
                updated_at: now,
            },
            permission_group: Some(GroupWithParent {
                group: GroupRef {
                    id: 2,
                    name: "用户管理".into(),
                    path: "/users".into(),
                    parent_id: Some(1),
                    created_at: now,
                    updated_at: now,
                },
                parent: None,
            }),
        };
        let value = serde_json::to_value(&entry).unwrap();
        assert_eq!(value["permissionGroupId"], 2);
        assert_eq!(value["permissionGroup"]["name"], "用户管理");
        assert_eq!(value["permissionGroup"]["parentId"], 1);
        assert!(value["permissionGroup"]["parent"].is_null());
    }
}
