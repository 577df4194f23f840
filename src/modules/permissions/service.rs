use sqlx::{FromRow, Pool, Postgres};

use crate::error::{AppError, AppResult};

use super::models::{
    CreatePermissionDto, GroupRef, GroupWithParent, Permission, PermissionWithGroup,
    UpdatePermissionDto,
};

pub async fn create(pool: &Pool<Postgres>, dto: &CreatePermissionDto) -> AppResult<Permission> {
    let created = sqlx::query_as(
        r#"
        INSERT INTO permissions (name, action, path, permission_group_id)
        VALUES ($1, $2, $3, $4)
        RETURNING *
        "#,
    )
    .bind(&dto.name)
    .bind(&dto.action)
    .bind(&dto.path)
    .bind(dto.permission_group_id)
    .fetch_one(pool)
    .await?;
    Ok(created)
}

#[derive(FromRow)]
struct PermissionRow {
    #[sqlx(flatten)]
    permission: Permission,
    group_id: Option<i64>,
    group_name: Option<String>,
    group_path: Option<String>,
    group_parent_id: Option<i64>,
    group_created_at: Option<chrono::DateTime<chrono::Utc>>,
    group_updated_at: Option<chrono::DateTime<chrono::Utc>>,
    parent_id: Option<i64>,
    parent_name: Option<String>,
    parent_path: Option<String>,
    parent_parent_id: Option<i64>,
    parent_created_at: Option<chrono::DateTime<chrono::Utc>>,
    parent_updated_at: Option<chrono::DateTime<chrono::Utc>>,
}

pub async fn find_all(pool: &Pool<Postgres>) -> AppResult<Vec<PermissionWithGroup>> {
    let rows: Vec<PermissionRow> = sqlx::query_as(
        r#"
        SELECT p.*,
               g.id AS group_id, g.name AS group_name, g.path AS group_path,
               g.parent_id AS group_parent_id,
               g.created_at AS group_created_at, g.updated_at AS group_updated_at,
               pp.id AS parent_id, pp.name AS parent_name, pp.path AS parent_path,
               pp.parent_id AS parent_parent_id,
               pp.created_at AS parent_created_at, pp.updated_at AS parent_updated_at
        FROM permissions p
        LEFT JOIN permission_groups g ON g.id = p.permission_group_id
        LEFT JOIN permission_groups pp ON pp.id = g.parent_id
        ORDER BY p.id
        "#,
    )
    .fetch_all(pool)
    .await?;
    Ok(rows.into_iter().map(assemble).collect())
}

fn group_ref(
    id: Option<i64>,
    name: Option<String>,
    path: Option<String>,
    parent_id: Option<i64>,
    created_at: Option<chrono::DateTime<chrono::Utc>>,
    updated_at: Option<chrono::DateTime<chrono::Utc>>,
) -> Option<GroupRef> {
    match (id, name, path, created_at, updated_at) {
        (Some(id), Some(name), Some(path), Some(created_at), Some(updated_at)) => Some(GroupRef {
            id,
            name,
            path,
            parent_id,
            created_at,
            updated_at,
        }),
        _ => None,
    }
}

fn assemble(row: PermissionRow) -> PermissionWithGroup {
    let parent = group_ref(
        row.parent_id,
        row.parent_name,
        row.parent_path,
        row.parent_parent_id,
        row.parent_created_at,
        row.parent_updated_at,
    );
    let permission_group = group_ref(
        row.group_id,
        row.group_name,
        row.group_path,
        row.group_parent_id,
        row.group_created_at,
        row.group_updated_at,
    )
    .map(|group| GroupWithParent { group, parent });
    PermissionWithGroup {
        permission: row.permission,
        permission_group,
    }
}

pub async fn find_one(pool: &Pool<Postgres>, id: i64) -> AppResult<Permission> {
    sqlx::query_as("SELECT * FROM permissions WHERE id = $1")
        .bind(id)
        .fetch_optional(pool)
        .await?
        .ok_or_else(|| AppError::not_found("权限"))
}

pub async fn update(
    pool: &Pool<Postgres>,
    id: i64,
    dto: &UpdatePermissionDto,
) -> AppResult<Permission> {
    sqlx::query_as(
        r#"
        UPDATE permissions SET
            name = COALESCE($2, name),
            action = COALESCE($3, action),
            path = COALESCE($4, path),
            permission_group_id = COALESCE($5, permission_group_id),
            updated_at = now()
        WHERE id = $1
        RETURNING *
        "#,
    )
    .bind(id)
    .bind(&dto.name)
    .bind(&dto.action)
    .bind(&dto.path)
    .bind(dto.permission_group_id)
    .fetch_optional(pool)
    .await?
    .ok_or_else(|| AppError::not_found("权限"))
}

pub async fn remove(pool: &Pool<Postgres>, id: i64) -> AppResult<Permission> {
    sqlx::query_as("DELETE FROM permissions WHERE id = $1 RETURNING *")
        .bind(id)
        .fetch_optional(pool)
        .await?
        .ok_or_else(|| AppError::not_found("权限"))
}

pub async fn remove_by_ids(pool: &Pool<Postgres>, ids: &[i64]) -> AppResult<u64> {
    let result = sqlx::query("DELETE FROM permissions WHERE id = ANY($1)")
        .bind(ids)
        .execute(pool)
        .await?;
    Ok(result.rows_affected())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn base_row() -> PermissionRow {
        let now = Utc::now();
        PermissionRow {
            permission: Permission {
                id: 7,
                name: "查看用户".into(),
                action: "GET".into(),
                path: "/users".into(),
                permission_group_id: None,
                created_at: now,
                updated_at: now,
            },
            group_id: None,
            group_name: None,
            group_path: None,
            group_parent_id: None,
            group_created_at: None,
            group_updated_at: None,
            parent_id: None,
            parent_name: None,
            parent_path: None,
            parent_parent_id: None,
            parent_created_at: None,
            parent_updated_at: None,
        }
    }

    #[test]
    fn test_assemble_without_group() {
        let entry = assemble(base_row());
        assert!(entry.permission_group.is_none());
    }

    #[test]
    fn test_assemble_with_nested_parent() {
        let now = Utc::now();
        let mut row = base_row();
        row.group_id = Some(2);
        row.group_name = Some("用户管理".into());
        row.group_path = Some("/users".into());
        row.group_parent_id = Some(1);
        row.group_created_at = Some(now);
        row.group_updated_at = Some(now);
        row.parent_id = Some(1);
        row.parent_name = Some("权限管理".into());
        row.parent_path = Some("/auth".into());
        row.parent_created_at = Some(now);
        row.parent_updated_at = Some(now);

        let entry = assemble(row);
        let group = entry.permission_group.unwrap();
        assert_eq!(group.group.id, 2);
        assert_eq!(group.group.parent_id, Some(1));
        assert_eq!(group.parent.unwrap().name, "权限管理");
    }
}
