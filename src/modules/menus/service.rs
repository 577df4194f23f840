use std::collections::{HashMap, HashSet};

use sqlx::{Pool, Postgres};

use crate::comm::pagination::Paginated;
use crate::error::{AppError, AppResult};

use super::models::{
    CreateMenuDto, Menu, MenuChild, MenuPageItem, MenuPageQuery, MenuPermission, MenuTree,
    UpdateMenuDto,
};

pub async fn create(pool: &Pool<Postgres>, dto: &CreateMenuDto) -> AppResult<Menu> {
    if let Some(parent_id) = dto.parent_id {
        ensure_parent_exists(pool, parent_id).await?;
    }
    let menu = sqlx::query_as(
        "INSERT INTO permission_groups (name, path, parent_id) VALUES ($1, $2, $3) RETURNING *",
    )
    .bind(&dto.name)
    .bind(&dto.path)
    .bind(dto.parent_id)
    .fetch_one(pool)
    .await?;
    Ok(menu)
}

/// 顶层菜单树，带直属权限与两层子菜单
pub async fn find_all(pool: &Pool<Postgres>) -> AppResult<Vec<MenuTree>> {
    let roots: Vec<Menu> =
        sqlx::query_as("SELECT * FROM permission_groups WHERE parent_id IS NULL ORDER BY id")
            .fetch_all(pool)
            .await?;
    let root_ids: Vec<i64> = roots.iter().map(|m| m.id).collect();
    load_trees(pool, roots, &root_ids).await
}

async fn load_trees(
    pool: &Pool<Postgres>,
    roots: Vec<Menu>,
    root_ids: &[i64],
) -> AppResult<Vec<MenuTree>> {
    let permissions: Vec<MenuPermission> = sqlx::query_as(
        "SELECT * FROM permissions WHERE permission_group_id = ANY($1) ORDER BY id",
    )
    .bind(root_ids)
    .fetch_all(pool)
    .await?;

    let level1: Vec<Menu> =
        sqlx::query_as("SELECT * FROM permission_groups WHERE parent_id = ANY($1) ORDER BY id")
            .bind(root_ids)
            .fetch_all(pool)
            .await?;
    let level1_ids: Vec<i64> = level1.iter().map(|m| m.id).collect();

    let level2: Vec<Menu> =
        sqlx::query_as("SELECT * FROM permission_groups WHERE parent_id = ANY($1) ORDER BY id")
            .bind(&level1_ids)
            .fetch_all(pool)
            .await?;

    Ok(assemble_trees(roots, permissions, level1, level2))
}

fn assemble_trees(
    roots: Vec<Menu>,
    permissions: Vec<MenuPermission>,
    level1: Vec<Menu>,
    level2: Vec<Menu>,
) -> Vec<MenuTree> {
    let mut permissions_by_menu: HashMap<i64, Vec<MenuPermission>> = HashMap::new();
    for p in permissions {
        if let Some(group_id) = p.permission_group_id {
            permissions_by_menu.entry(group_id).or_default().push(p);
        }
    }
    let mut level2_by_parent: HashMap<i64, Vec<Menu>> = HashMap::new();
    for m in level2 {
        if let Some(parent_id) = m.parent_id {
            level2_by_parent.entry(parent_id).or_default().push(m);
        }
    }
    let mut level1_by_parent: HashMap<i64, Vec<MenuChild>> = HashMap::new();
    for m in level1 {
        if let Some(parent_id) = m.parent_id {
            let children = level2_by_parent.remove(&m.id).unwrap_or_default();
            level1_by_parent
                .entry(parent_id)
                .or_default()
                .push(MenuChild { menu: m, children });
        }
    }

    roots
        .into_iter()
        .map(|root| MenuTree {
            permissions: permissions_by_menu.remove(&root.id).unwrap_or_default(),
            children: level1_by_parent.remove(&root.id).unwrap_or_default(),
            menu: root,
        })
        .collect()
}

/// 分页。带 name 时按名称模糊匹配返回平铺记录，否则返回顶层树
pub async fn find_all_paged(
    pool: &Pool<Postgres>,
    query: &MenuPageQuery,
) -> AppResult<Paginated<MenuPageItem>> {
    let page = query.page();
    let name = query.name.as_deref().filter(|n| !n.is_empty());

    match name {
        Some(name) => {
            let pattern = format!("%{}%", name);
            let total: i64 =
                sqlx::query_scalar("SELECT COUNT(*) FROM permission_groups WHERE name LIKE $1")
                    .bind(&pattern)
                    .fetch_one(pool)
                    .await?;
            let menus: Vec<Menu> = sqlx::query_as(
                "SELECT * FROM permission_groups WHERE name LIKE $1 ORDER BY id LIMIT $2 OFFSET $3",
            )
            .bind(&pattern)
            .bind(page.limit())
            .bind(page.offset())
            .fetch_all(pool)
            .await?;

            let menu_ids: Vec<i64> = menus.iter().map(|m| m.id).collect();
            let permissions: Vec<MenuPermission> = sqlx::query_as(
                "SELECT * FROM permissions WHERE permission_group_id = ANY($1) ORDER BY id",
            )
            .bind(&menu_ids)
            .fetch_all(pool)
            .await?;
            let mut by_menu: HashMap<i64, Vec<MenuPermission>> = HashMap::new();
            for p in permissions {
                if let Some(group_id) = p.permission_group_id {
                    by_menu.entry(group_id).or_default().push(p);
                }
            }

            let items = menus
                .into_iter()
                .map(|menu| MenuPageItem::Flat {
                    permissions: by_menu.remove(&menu.id).unwrap_or_default(),
                    menu,
                })
                .collect();
            Ok(Paginated::new(items, &page, total as u64))
        }
        None => {
            let total: i64 = sqlx::query_scalar(
                "SELECT COUNT(*) FROM permission_groups WHERE parent_id IS NULL",
            )
            .fetch_one(pool)
            .await?;
            let roots: Vec<Menu> = sqlx::query_as(
                r#"
                SELECT * FROM permission_groups
                WHERE parent_id IS NULL
                ORDER BY id
                LIMIT $1 OFFSET $2
                "#,
            )
            .bind(page.limit())
            .bind(page.offset())
            .fetch_all(pool)
            .await?;
            let root_ids: Vec<i64> = roots.iter().map(|m| m.id).collect();
            let trees = load_trees(pool, roots, &root_ids).await?;
            Ok(Paginated::new(
                trees.into_iter().map(MenuPageItem::Tree).collect(),
                &page,
                total as u64,
            ))
        }
    }
}

/// 当前用户可见的菜单树，按权限所属的菜单节点过滤
pub async fn find_menu_by_user(pool: &Pool<Postgres>, user_id: i64) -> AppResult<Vec<MenuTree>> {
    let ids: Vec<i64> = sqlx::query_scalar(
        r#"
        SELECT DISTINCT p.permission_group_id
        FROM permissions p
        JOIN role_permissions rp ON rp.permission_id = p.id
        JOIN user_roles ur ON ur.role_id = rp.role_id
        WHERE ur.user_id = $1 AND p.permission_group_id IS NOT NULL
        "#,
    )
    .bind(user_id)
    .fetch_all(pool)
    .await?;

    let menus = find_all(pool).await?;
    Ok(filter_menus_by_ids(menus, &ids.into_iter().collect()))
}

/// 节点可见当且仅当自身命中或任一后代命中
fn filter_menus_by_ids(menus: Vec<MenuTree>, ids: &HashSet<i64>) -> Vec<MenuTree> {
    menus
        .into_iter()
        .filter_map(|tree| {
            let MenuTree {
                menu,
                permissions,
                children,
            } = tree;
            let children = filter_children(children, ids);
            if ids.contains(&menu.id) || !children.is_empty() {
                Some(MenuTree {
                    menu,
                    permissions,
                    children,
                })
            } else {
                None
            }
        })
        .collect()
}

fn filter_children(children: Vec<MenuChild>, ids: &HashSet<i64>) -> Vec<MenuChild> {
    children
        .into_iter()
        .filter_map(|child| {
            let grandchildren: Vec<Menu> = child
                .children
                .into_iter()
                .filter(|m| ids.contains(&m.id))
                .collect();
            if ids.contains(&child.menu.id) || !grandchildren.is_empty() {
                Some(MenuChild {
                    menu: child.menu,
                    children: grandchildren,
                })
            } else {
                None
            }
        })
        .collect()
}

pub async fn find_one(pool: &Pool<Postgres>, id: i64) -> AppResult<Menu> {
    sqlx::query_as("SELECT * FROM permission_groups WHERE id = $1")
        .bind(id)
        .fetch_optional(pool)
        .await?
        .ok_or_else(|| AppError::not_found(format!("菜单(id: {})", id)))
}

pub async fn update(pool: &Pool<Postgres>, id: i64, dto: &UpdateMenuDto) -> AppResult<Menu> {
    if let Some(parent_id) = dto.parent_id {
        ensure_parent_exists(pool, parent_id).await?;
    }
    sqlx::query_as(
        r#"
        UPDATE permission_groups SET
            name = COALESCE($2, name),
            path = COALESCE($3, path),
            parent_id = COALESCE($4, parent_id),
            updated_at = now()
        WHERE id = $1
        RETURNING *
        "#,
    )
    .bind(id)
    .bind(&dto.name)
    .bind(&dto.path)
    .bind(dto.parent_id)
    .fetch_optional(pool)
    .await?
    .ok_or_else(|| AppError::not_found(format!("菜单(id: {})", id)))
}

/// 删除菜单及整棵子树
pub async fn remove(pool: &Pool<Postgres>, id: i64) -> AppResult<Menu> {
    let menu = find_one(pool, id).await?;
    sqlx::query(
        r#"
        WITH RECURSIVE subtree AS (
            SELECT id FROM permission_groups WHERE id = $1
            UNION ALL
            SELECT g.id FROM permission_groups g JOIN subtree s ON g.parent_id = s.id
        )
        DELETE FROM permission_groups WHERE id IN (SELECT id FROM subtree)
        "#,
    )
    .bind(id)
    .execute(pool)
    .await?;
    Ok(menu)
}

/// 逐个删除，任一 id 不存在立即报错
pub async fn remove_by_ids(pool: &Pool<Postgres>, ids: &[i64]) -> AppResult<u64> {
    let mut count = 0u64;
    for id in ids {
        remove(pool, *id).await?;
        count += 1;
    }
    Ok(count)
}

async fn ensure_parent_exists(pool: &Pool<Postgres>, parent_id: i64) -> AppResult<()> {
    let exists: bool =
        sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM permission_groups WHERE id = $1)")
            .bind(parent_id)
            .fetch_one(pool)
            .await?;
    if !exists {
        return Err(AppError::validation(
            "parentId",
            format!("Parent menu with id {} does not exist", parent_id),
        ));
    }
    Ok(())
}
