use std::collections::HashMap;

use sqlx::{FromRow, Pool, Postgres};

use crate::error::{AppError, AppResult};

use super::models::{
    CreateRoleDto, GroupWithParent, PermissionBrief, PermissionGroupRef, PermissionWithGroup, Role,
    RoleDetail, RoleWithRefs, UpdateRoleDto, UserBrief,
};

pub async fn create(pool: &Pool<Postgres>, dto: &CreateRoleDto) -> AppResult<Role> {
    ensure_permissions_exist(pool, &dto.permissions).await?;

    let mut tx = pool.begin().await?;
    let role: Role = sqlx::query_as("INSERT INTO roles (name) VALUES ($1) RETURNING *")
        .bind(&dto.name)
        .fetch_one(&mut *tx)
        .await?;
    link_permissions(&mut tx, role.id, &dto.permissions).await?;
    tx.commit().await?;
    Ok(role)
}

pub async fn find_all(pool: &Pool<Postgres>) -> AppResult<Vec<RoleWithRefs>> {
    let roles: Vec<Role> = sqlx::query_as("SELECT * FROM roles ORDER BY id")
        .fetch_all(pool)
        .await?;
    let role_ids: Vec<i64> = roles.iter().map(|r| r.id).collect();

    let permission_rows: Vec<(i64, i64, String)> = sqlx::query_as(
        r#"
        SELECT rp.role_id, p.id, p.name
        FROM permissions p
        JOIN role_permissions rp ON rp.permission_id = p.id
        WHERE rp.role_id = ANY($1)
        ORDER BY p.id
        "#,
    )
    .bind(&role_ids)
    .fetch_all(pool)
    .await?;

    let user_rows: Vec<(i64, Option<String>)> = sqlx::query_as(
        r#"
        SELECT ur.role_id, u.username
        FROM users u
        JOIN user_roles ur ON ur.user_id = u.id
        WHERE ur.role_id = ANY($1)
        ORDER BY u.id
        "#,
    )
    .bind(&role_ids)
    .fetch_all(pool)
    .await?;

    let mut permissions_by_role: HashMap<i64, Vec<PermissionBrief>> = HashMap::new();
    for (role_id, id, name) in permission_rows {
        permissions_by_role
            .entry(role_id)
            .or_default()
            .push(PermissionBrief { id, name });
    }
    let mut users_by_role: HashMap<i64, Vec<UserBrief>> = HashMap::new();
    for (role_id, username) in user_rows {
        users_by_role
            .entry(role_id)
            .or_default()
            .push(UserBrief { username });
    }

    Ok(roles
        .into_iter()
        .map(|role| RoleWithRefs {
            permissions: permissions_by_role.remove(&role.id).unwrap_or_default(),
            users: users_by_role.remove(&role.id).unwrap_or_default(),
            role,
        })
        .collect())
}

#[derive(FromRow)]
struct DetailPermissionRow {
    name: String,
    group_id: Option<i64>,
    group_name: Option<String>,
    parent_id: Option<i64>,
    parent_name: Option<String>,
    parent_path: Option<String>,
    parent_parent_id: Option<i64>,
    parent_created_at: Option<chrono::DateTime<chrono::Utc>>,
    parent_updated_at: Option<chrono::DateTime<chrono::Utc>>,
}

pub async fn find_one(pool: &Pool<Postgres>, id: i64) -> AppResult<RoleDetail> {
    let role: Role = sqlx::query_as("SELECT * FROM roles WHERE id = $1")
        .bind(id)
        .fetch_optional(pool)
        .await?
        .ok_or_else(|| AppError::not_found("角色"))?;

    let rows: Vec<DetailPermissionRow> = sqlx::query_as(
        r#"
        SELECT p.name,
               g.id AS group_id, g.name AS group_name,
               pp.id AS parent_id, pp.name AS parent_name, pp.path AS parent_path,
               pp.parent_id AS parent_parent_id,
               pp.created_at AS parent_created_at, pp.updated_at AS parent_updated_at
        FROM permissions p
        JOIN role_permissions rp ON rp.permission_id = p.id
        LEFT JOIN permission_groups g ON g.id = p.permission_group_id
        LEFT JOIN permission_groups pp ON pp.id = g.parent_id
        WHERE rp.role_id = $1
        ORDER BY p.id
        "#,
    )
    .bind(id)
    .fetch_all(pool)
    .await?;

    let users: Vec<UserBrief> = sqlx::query_as(
        r#"
        SELECT u.username
        FROM users u
        JOIN user_roles ur ON ur.user_id = u.id
        WHERE ur.role_id = $1
        ORDER BY u.id
        "#,
    )
    .bind(id)
    .fetch_all(pool)
    .await?;

    let permissions = rows.into_iter().map(assemble_permission).collect();
    Ok(RoleDetail {
        role,
        permissions,
        users,
    })
}

fn assemble_permission(row: DetailPermissionRow) -> PermissionWithGroup {
    let parent = match (
        row.parent_id,
        row.parent_name,
        row.parent_path,
        row.parent_created_at,
        row.parent_updated_at,
    ) {
        (Some(id), Some(name), Some(path), Some(created_at), Some(updated_at)) => {
            Some(PermissionGroupRef {
                id,
                name,
                path,
                parent_id: row.parent_parent_id,
                created_at,
                updated_at,
            })
        }
        _ => None,
    };
    let permission_group = row
        .group_id
        .and(row.group_name)
        .map(|name| GroupWithParent { name, parent });
    PermissionWithGroup {
        name: row.name,
        permission_group,
    }
}

pub async fn update(pool: &Pool<Postgres>, id: i64, dto: &UpdateRoleDto) -> AppResult<Role> {
    let permissions = dto.permissions.clone().unwrap_or_default();
    ensure_permissions_exist(pool, &permissions).await?;

    let mut tx = pool.begin().await?;
    let role: Role = sqlx::query_as(
        r#"
        UPDATE roles SET name = COALESCE($2, name), updated_at = now()
        WHERE id = $1
        RETURNING *
        "#,
    )
    .bind(id)
    .bind(&dto.name)
    .fetch_optional(&mut *tx)
    .await?
    .ok_or_else(|| AppError::not_found("角色"))?;

    // 权限全量替换，缺省视为清空
    sqlx::query("DELETE FROM role_permissions WHERE role_id = $1")
        .bind(id)
        .execute(&mut *tx)
        .await?;
    link_permissions(&mut tx, id, &permissions).await?;
    tx.commit().await?;
    Ok(role)
}

pub async fn remove(pool: &Pool<Postgres>, id: i64) -> AppResult<Role> {
    sqlx::query_as("DELETE FROM roles WHERE id = $1 RETURNING *")
        .bind(id)
        .fetch_optional(pool)
        .await?
        .ok_or_else(|| AppError::not_found("角色"))
}

pub async fn remove_by_ids(pool: &Pool<Postgres>, ids: &[i64]) -> AppResult<u64> {
    let result = sqlx::query("DELETE FROM roles WHERE id = ANY($1)")
        .bind(ids)
        .execute(pool)
        .await?;
    Ok(result.rows_affected())
}

async fn ensure_permissions_exist(pool: &Pool<Postgres>, permission_ids: &[i64]) -> AppResult<()> {
    if permission_ids.is_empty() {
        return Ok(());
    }
    let found: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM permissions WHERE id = ANY($1)")
        .bind(permission_ids)
        .fetch_one(pool)
        .await?;
    if found as usize != permission_ids.len() {
        return Err(AppError::validation(
            "permissions",
            "Some permissions do not exist",
        ));
    }
    Ok(())
}

async fn link_permissions(
    tx: &mut sqlx::Transaction<'_, Postgres>,
    role_id: i64,
    permission_ids: &[i64],
) -> AppResult<()> {
    if permission_ids.is_empty() {
        return Ok(());
    }
    sqlx::query(
        "INSERT INTO role_permissions (role_id, permission_id) SELECT $1, unnest($2::bigint[])",
    )
    .bind(role_id)
    .bind(permission_ids)
    .execute(&mut **tx)
    .await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(name: &str) -> DetailPermissionRow {
        DetailPermissionRow {
            name: name.to_string(),
            group_id: None,
            group_name: None,
            parent_id: None,
            parent_name: None,
            parent_path: None,
            parent_parent_id: None,
            parent_created_at: None,
            parent_updated_at: None,
        }
    }

    #[test]
    fn test_assemble_permission_without_group() {
        let assembled = assemble_permission(row("查看用户"));
        assert_eq!(assembled.name, "查看用户");
        assert!(assembled.permission_group.is_none());
    }

    #[test]
    fn test_assemble_permission_with_group_and_parent() {
        let mut r = row("查看用户");
        r.group_id = Some(2);
        r.group_name = Some("用户管理".into());
        r.parent_id = Some(1);
        r.parent_name = Some("权限管理".into());
        r.parent_path = Some("/auth".into());
        r.parent_created_at = Some(chrono::Utc::now());
        r.parent_updated_at = Some(chrono::Utc::now());

        let assembled = assemble_permission(r);
        let group = assembled.permission_group.unwrap();
        assert_eq!(group.name, "用户管理");
        let parent = group.parent.unwrap();
        assert_eq!(parent.id, 1);
        assert_eq!(parent.path, "/auth");
        assert!(parent.parent_id.is_none());
    }
}
