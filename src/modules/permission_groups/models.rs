use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::ToSchema;
use validator::Validate;

/// 权限组表记录，parent_id 为空表示顶层分组
#[derive(Debug, Clone, Serialize, FromRow, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct PermissionGroup {
    pub id: i64,
    pub name: String,
    pub path: String,
    pub parent_id: Option<i64>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, FromRow, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct PermissionRef {
    pub id: i64,
    pub name: String,
    pub action: String,
    pub path: String,
    pub permission_group_id: Option<i64>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// 二级子组，再往下一层只带裸记录
#[derive(Debug, Serialize, ToSchema)]
pub struct GroupChild {
    #[serde(flatten)]
    pub group: PermissionGroup,
    pub children: Vec<PermissionGroup>,
}

/// 顶层分组树，带直属权限与两层子组
#[derive(Debug, Serialize, ToSchema)]
pub struct GroupTree {
    #[serde(flatten)]
    pub group: PermissionGroup,
    pub permissions: Vec<PermissionRef>,
    pub children: Vec<GroupChild>,
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CreatePermissionGroupDto {
    #[validate(length(min = 1, message = "分组名不能为空"))]
    pub name: String,
    #[validate(length(min = 1, message = "path 不能为空"))]
    pub path: String,
    pub parent_id: Option<i64>,
    /// 挂到本组下的权限 ID 数组
    pub permissions: Option<Vec<i64>>,
}

#[derive(Debug, Default, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct UpdatePermissionGroupDto {
    #[validate(length(min = 1, message = "分组名不能为空"))]
    pub name: Option<String>,
    pub path: Option<String>,
    pub parent_id: Option<i64>,
    pub permissions: Option<Vec<i64>>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tree_serialization_shape() {
        let now = Utc::now();
        let group = |id: i64, name: &str, parent: Option<i64>| PermissionGroup {
            id,
            name: name.to_string(),
            path: format!("/g{}", id),
            parent_id: parent,
            created_at: now,
            updated_at: now,
        };
        let tree = GroupTree {
            group: group(1, "权限管理", None),
            permissions: vec![],
            children: vec![GroupChild {
                group: group(2, "用户管理", Some(1)),
                children: vec![group(3, "细分", Some(2))],
            }],
        };
        let value = serde_json::to_value(&tree).unwrap();
        assert_eq!(value["name"], "权限管理");
        assert!(value["parentId"].is_null());
        assert_eq!(value["children"][0]["name"], "用户管理");
        assert_eq!(value["children"][0]["children"][0]["id"], 3);
    }
}
