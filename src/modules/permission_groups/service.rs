use std::collections::HashMap;

use sqlx::{Pool, Postgres};

use crate::error::{AppError, AppResult};

use super::models::{
    CreatePermissionGroupDto, GroupChild, GroupTree, PermissionGroup, PermissionRef,
    UpdatePermissionGroupDto,
};

pub async fn create(
    pool: &Pool<Postgres>,
    dto: &CreatePermissionGroupDto,
) -> AppResult<PermissionGroup> {
    if let Some(parent_id) = dto.parent_id {
        ensure_parent_exists(pool, parent_id).await?;
    }

    let mut tx = pool.begin().await?;
    let group: PermissionGroup = sqlx::query_as(
        "INSERT INTO permission_groups (name, path, parent_id) VALUES ($1, $2, $3) RETURNING *",
    )
    .bind(&dto.name)
    .bind(&dto.path)
    .bind(dto.parent_id)
    .fetch_one(&mut *tx)
    .await?;

    if let Some(permissions) = &dto.permissions {
        attach_permissions(&mut tx, group.id, permissions).await?;
    }
    tx.commit().await?;
    Ok(group)
}

/// 顶层分组，带直属权限与两层子组
pub async fn find_all(pool: &Pool<Postgres>) -> AppResult<Vec<GroupTree>> {
    let roots: Vec<PermissionGroup> =
        sqlx::query_as("SELECT * FROM permission_groups WHERE parent_id IS NULL ORDER BY id")
            .fetch_all(pool)
            .await?;
    let root_ids: Vec<i64> = roots.iter().map(|g| g.id).collect();

    let permissions: Vec<PermissionRef> = sqlx::query_as(
        "SELECT * FROM permissions WHERE permission_group_id = ANY($1) ORDER BY id",
    )
    .bind(&root_ids)
    .fetch_all(pool)
    .await?;

    let level1: Vec<PermissionGroup> =
        sqlx::query_as("SELECT * FROM permission_groups WHERE parent_id = ANY($1) ORDER BY id")
            .bind(&root_ids)
            .fetch_all(pool)
            .await?;
    let level1_ids: Vec<i64> = level1.iter().map(|g| g.id).collect();

    let level2: Vec<PermissionGroup> =
        sqlx::query_as("SELECT * FROM permission_groups WHERE parent_id = ANY($1) ORDER BY id")
            .bind(&level1_ids)
            .fetch_all(pool)
            .await?;

    Ok(assemble_trees(roots, permissions, level1, level2))
}

fn assemble_trees(
    roots: Vec<PermissionGroup>,
    permissions: Vec<PermissionRef>,
    level1: Vec<PermissionGroup>,
    level2: Vec<PermissionGroup>,
) -> Vec<GroupTree> {
    let mut permissions_by_group: HashMap<i64, Vec<PermissionRef>> = HashMap::new();
    for p in permissions {
        if let Some(group_id) = p.permission_group_id {
            permissions_by_group.entry(group_id).or_default().push(p);
        }
    }
    let mut level2_by_parent: HashMap<i64, Vec<PermissionGroup>> = HashMap::new();
    for g in level2 {
        if let Some(parent_id) = g.parent_id {
            level2_by_parent.entry(parent_id).or_default().push(g);
        }
    }
    let mut level1_by_parent: HashMap<i64, Vec<GroupChild>> = HashMap::new();
    for g in level1 {
        if let Some(parent_id) = g.parent_id {
            let children = level2_by_parent.remove(&g.id).unwrap_or_default();
            level1_by_parent
                .entry(parent_id)
                .or_default()
                .push(GroupChild { group: g, children });
        }
    }

    roots
        .into_iter()
        .map(|root| GroupTree {
            permissions: permissions_by_group.remove(&root.id).unwrap_or_default(),
            children: level1_by_parent.remove(&root.id).unwrap_or_default(),
            group: root,
        })
        .collect()
}

pub async fn find_one(pool: &Pool<Postgres>, id: i64) -> AppResult<PermissionGroup> {
    sqlx::query_as("SELECT * FROM permission_groups WHERE id = $1")
        .bind(id)
        .fetch_optional(pool)
        .await?
        .ok_or_else(|| AppError::not_found(format!("权限组(id: {})", id)))
}

pub async fn update(
    pool: &Pool<Postgres>,
    id: i64,
    dto: &UpdatePermissionGroupDto,
) -> AppResult<PermissionGroup> {
    if let Some(parent_id) = dto.parent_id {
        ensure_parent_exists(pool, parent_id).await?;
    }

    let mut tx = pool.begin().await?;
    let group: PermissionGroup = sqlx::query_as(
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
    .fetch_optional(&mut *tx)
    .await?
    .ok_or_else(|| AppError::not_found(format!("权限组(id: {})", id)))?;

    // 更新时是追加挂载，不清空已有权限
    if let Some(permissions) = &dto.permissions {
        attach_permissions(&mut tx, id, permissions).await?;
    }
    tx.commit().await?;
    Ok(group)
}

/// 删除分组及整棵子树
pub async fn remove(pool: &Pool<Postgres>, id: i64) -> AppResult<PermissionGroup> {
    let group = find_one(pool, id).await?;
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
    Ok(group)
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
            format!("Parent permission group with id {} does not exist", parent_id),
        ));
    }
    Ok(())
}

async fn attach_permissions(
    tx: &mut sqlx::Transaction<'_, Postgres>,
    group_id: i64,
    permission_ids: &[i64],
) -> AppResult<()> {
    if permission_ids.is_empty() {
        return Ok(());
    }
    sqlx::query("UPDATE permissions SET permission_group_id = $1 WHERE id = ANY($2)")
        .bind(group_id)
        .bind(permission_ids)
        .execute(&mut **tx)
        .await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn group(id: i64, parent: Option<i64>) -> PermissionGroup {
        let now = Utc::now();
        PermissionGroup {
            id,
            name: format!("g{}", id),
            path: format!("/g{}", id),
            parent_id: parent,
            created_at: now,
            updated_at: now,
        }
    }

    fn permission(id: i64, group_id: i64) -> PermissionRef {
        let now = Utc::now();
        PermissionRef {
            id,
            name: format!("p{}", id),
            action: "GET".into(),
            path: "/users".into(),
            permission_group_id: Some(group_id),
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn test_assemble_trees_nests_two_levels() {
        let roots = vec![group(1, None), group(2, None)];
        let permissions = vec![permission(10, 1), permission(11, 1)];
        let level1 = vec![group(3, Some(1)), group(4, Some(2))];
        let level2 = vec![group(5, Some(3))];

        let trees = assemble_trees(roots, permissions, level1, level2);
        assert_eq!(trees.len(), 2);
        assert_eq!(trees[0].permissions.len(), 2);
        assert_eq!(trees[0].children.len(), 1);
        assert_eq!(trees[0].children[0].group.id, 3);
        assert_eq!(trees[0].children[0].children[0].id, 5);
        assert!(trees[1].permissions.is_empty());
        assert_eq!(trees[1].children[0].group.id, 4);
        assert!(trees[1].children[0].children.is_empty());
    }
}
