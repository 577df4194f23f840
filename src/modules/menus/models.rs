use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::ToSchema;
use validator::Validate;

/// 菜单节点，存储在权限组表
#[derive(Debug, Clone, Serialize, FromRow, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Menu {
    pub id: i64,
    pub name: String,
    pub path: String,
    pub parent_id: Option<i64>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, FromRow, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct MenuPermission {
    pub id: i64,
    pub name: String,
    pub action: String,
    pub path: String,
    pub permission_group_id: Option<i64>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct MenuChild {
    #[serde(flatten)]
    pub menu: Menu,
    pub children: Vec<Menu>,
}

/// 顶层菜单树，带直属权限与两层子菜单
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct MenuTree {
    #[serde(flatten)]
    pub menu: Menu,
    pub permissions: Vec<MenuPermission>,
    pub children: Vec<MenuChild>,
}

/// 分页条目。按名称过滤时是平铺记录，否则是顶层树
#[derive(Debug, Serialize, ToSchema)]
#[serde(untagged)]
pub enum MenuPageItem {
    Tree(MenuTree),
    Flat {
        #[serde(flatten)]
        menu: Menu,
        permissions: Vec<MenuPermission>,
    },
}

#[derive(Debug, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct MenuPageQuery {
    #[serde(default = "default_current")]
    pub current: u32,
    #[serde(default = "default_page_size")]
    pub page_size: u32,
    pub name: Option<String>,
}

fn default_current() -> u32 {
    1
}
fn default_page_size() -> u32 {
    10
}

impl MenuPageQuery {
    pub fn page(&self) -> crate::comm::pagination::PageQuery {
        crate::comm::pagination::PageQuery {
            current: self.current,
            page_size: self.page_size,
        }
    }
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CreateMenuDto {
    #[validate(length(min = 1, message = "菜单名不能为空"))]
    pub name: String,
    #[validate(length(min = 1, message = "path 不能为空"))]
    pub path: String,
    pub parent_id: Option<i64>,
}

#[derive(Debug, Default, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct UpdateMenuDto {
    #[validate(length(min = 1, message = "菜单名不能为空"))]
    pub name: Option<String>,
    pub path: Option<String>,
    pub parent_id: Option<i64>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_page_item_untagged_shapes() {
        let now = Utc::now();
        let menu = Menu {
            id: 1,
            name: "用户管理".into(),
            path: "/users".into(),
            parent_id: None,
            created_at: now,
            updated_at: now,
        };
        let flat = MenuPageItem::Flat {
            menu: menu.clone(),
            permissions: vec![],
        };
        let value = serde_json::to_value(&flat).unwrap();
        assert_eq!(value["name"], "用户管理");
        assert!(value.get("children").is_none());

        let tree = MenuPageItem::Tree(MenuTree {
            menu,
            permissions: vec![],
            children: vec![],
        });
        let value = serde_json::to_value(&tree).unwrap();
        assert!(value.get("children").is_some());
    }

    #[test]
    fn test_query_defaults() {
        let q: MenuPageQuery = serde_json::from_str("{}").unwrap();
        assert_eq!(q.current, 1);
        assert_eq!(q.page_size, 10);
        assert!(q.name.is_none());
    }
}
