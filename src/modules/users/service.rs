use std::collections::HashMap;

use sqlx::{Pool, Postgres};

use crate::auth::password::hash_password;
use crate::comm::pagination::Paginated;
use crate::error::{AppError, AppResult};

use super::models::{
    CreateUserDto, PermissionItem, RoleItem, RoleWithPermissions, UpdateUserDto, User,
    UserPageQuery, UserProfile, UserWithRoles,
};

pub const DEFAULT_AVATAR: &str = "https://gravatar.com/avatar/0000?d=mp&f=y";

pub async fn create(pool: &Pool<Postgres>, dto: &CreateUserDto) -> AppResult<User> {
    ensure_roles_exist(pool, &dto.roles).await?;
    let hashed = hash_password(&dto.password)?;
    let avatar = dto
        .avatar
        .clone()
        .filter(|a| !a.is_empty())
        .unwrap_or_else(|| DEFAULT_AVATAR.to_string());

    let mut tx = pool.begin().await?;
    let user: User = sqlx::query_as(
        r#"
        INSERT INTO users (email, password, username, status, avatar, gender, is_admin, department_id)
        VALUES ($1, $2, $3, $4, $5, $6, false, 123)
        RETURNING *
        "#,
    )
    .bind(&dto.email)
    .bind(&hashed)
    .bind(&dto.username)
    .bind(&dto.status)
    .bind(&avatar)
    .bind(&dto.gender)
    .fetch_one(&mut *tx)
    .await?;

    link_roles(&mut tx, user.id, &dto.roles).await?;
    tx.commit().await?;
    Ok(user)
}

pub async fn find_all(pool: &Pool<Postgres>) -> AppResult<Vec<UserWithRoles>> {
    let users: Vec<User> = sqlx::query_as("SELECT * FROM users ORDER BY id")
        .fetch_all(pool)
        .await?;
    let links = load_role_links(pool, &users.iter().map(|u| u.id).collect::<Vec<_>>()).await?;
    Ok(attach_roles(users, links))
}

pub async fn find_all_paged(
    pool: &Pool<Postgres>,
    query: &UserPageQuery,
) -> AppResult<Paginated<UserWithRoles>> {
    if query.current == 0 || query.page_size == 0 {
        return Err(AppError::validation("current", "Invalid pagination parameters"));
    }

    let is_admin = query.is_admin.as_deref().map(|v| v == "true");
    let (order_column, order_dir) =
        parse_sorter(query.sorter.as_deref()).unwrap_or(("id", "ASC"));

    let total: i64 = sqlx::query_scalar(
        r#"
        SELECT COUNT(*) FROM users
        WHERE ($1::text IS NULL OR username LIKE '%' || $1 || '%')
          AND ($2::text IS NULL OR email = $2)
          AND ($3::text IS NULL OR status = $3)
          AND ($4::boolean IS NULL OR is_admin = $4)
        "#,
    )
    .bind(&query.username)
    .bind(&query.email)
    .bind(&query.status)
    .bind(is_admin)
    .fetch_one(pool)
    .await?;

    let page = query.page();
    let sql = format!(
        r#"
        SELECT * FROM users
        WHERE ($1::text IS NULL OR username LIKE '%' || $1 || '%')
          AND ($2::text IS NULL OR email = $2)
          AND ($3::text IS NULL OR status = $3)
          AND ($4::boolean IS NULL OR is_admin = $4)
        ORDER BY {} {}
        LIMIT $5 OFFSET $6
        "#,
        order_column, order_dir
    );
    let users: Vec<User> = sqlx::query_as(&sql)
        .bind(&query.username)
        .bind(&query.email)
        .bind(&query.status)
        .bind(is_admin)
        .bind(page.limit())
        .bind(page.offset())
        .fetch_all(pool)
        .await?;

    let links = load_role_links(pool, &users.iter().map(|u| u.id).collect::<Vec<_>>()).await?;
    Ok(Paginated::new(attach_roles(users, links), &page, total as u64))
}

pub async fn find_one(pool: &Pool<Postgres>, id: i64) -> AppResult<User> {
    sqlx::query_as("SELECT * FROM users WHERE id = $1")
        .bind(id)
        .fetch_optional(pool)
        .await?
        .ok_or_else(|| AppError::not_found("用户"))
}

/// 当前用户画像，带角色与角色下的权限
pub async fn find_current(pool: &Pool<Postgres>, user_id: i64) -> AppResult<UserProfile> {
    let user = find_one(pool, user_id).await?;

    let roles: Vec<RoleItem> = sqlx::query_as(
        r#"
        SELECT r.id, r.name, r.created_at, r.updated_at
        FROM roles r
        JOIN user_roles ur ON ur.role_id = r.id
        WHERE ur.user_id = $1
        ORDER BY r.id
        "#,
    )
    .bind(user_id)
    .fetch_all(pool)
    .await?;

    let role_ids: Vec<i64> = roles.iter().map(|r| r.id).collect();
    let rows: Vec<(i64, i64, String, String, String, Option<i64>)> = sqlx::query_as(
        r#"
        SELECT rp.role_id, p.id, p.name, p.action, p.path, p.permission_group_id
        FROM permissions p
        JOIN role_permissions rp ON rp.permission_id = p.id
        WHERE rp.role_id = ANY($1)
        ORDER BY p.id
        "#,
    )
    .bind(&role_ids)
    .fetch_all(pool)
    .await?;

    let mut by_role: HashMap<i64, Vec<PermissionItem>> = HashMap::new();
    for (role_id, id, name, action, path, permission_group_id) in rows {
        by_role.entry(role_id).or_default().push(PermissionItem {
            id,
            name,
            action,
            path,
            permission_group_id,
        });
    }

    let roles = roles
        .into_iter()
        .map(|r| RoleWithPermissions {
            permissions: by_role.remove(&r.id).unwrap_or_default(),
            id: r.id,
            name: r.name,
        })
        .collect();

    Ok(UserProfile { user, roles })
}

pub async fn update(pool: &Pool<Postgres>, id: i64, dto: &UpdateUserDto) -> AppResult<User> {
    let hashed = match &dto.password {
        Some(p) => Some(hash_password(p)?),
        None => None,
    };

    let mut tx = pool.begin().await?;
    let user: Option<User> = sqlx::query_as(
        r#"
        UPDATE users SET
            username = COALESCE($2, username),
            email = COALESCE($3, email),
            status = COALESCE($4, status),
            avatar = COALESCE($5, avatar),
            gender = COALESCE($6, gender),
            is_admin = COALESCE($7, is_admin),
            department_id = COALESCE($8, department_id),
            password = COALESCE($9, password),
            updated_at = now()
        WHERE id = $1
        RETURNING *
        "#,
    )
    .bind(id)
    .bind(&dto.username)
    .bind(&dto.email)
    .bind(&dto.status)
    .bind(&dto.avatar)
    .bind(&dto.gender)
    .bind(dto.is_admin)
    .bind(dto.department_id)
    .bind(&hashed)
    .fetch_optional(&mut *tx)
    .await?;
    let user = user.ok_or_else(|| AppError::not_found("用户"))?;

    // 角色全量替换，缺省视为清空
    sqlx::query("DELETE FROM user_roles WHERE user_id = $1")
        .bind(id)
        .execute(&mut *tx)
        .await?;
    let roles = dto.roles.clone().unwrap_or_default();
    link_roles(&mut tx, id, &roles).await?;
    tx.commit().await?;

    Ok(user)
}

pub async fn remove(pool: &Pool<Postgres>, id: i64) -> AppResult<User> {
    sqlx::query_as("DELETE FROM users WHERE id = $1 RETURNING *")
        .bind(id)
        .fetch_optional(pool)
        .await?
        .ok_or_else(|| AppError::not_found("用户"))
}

pub async fn remove_by_ids(pool: &Pool<Postgres>, ids: &[i64]) -> AppResult<u64> {
    let result = sqlx::query("DELETE FROM users WHERE id = ANY($1)")
        .bind(ids)
        .execute(pool)
        .await?;
    Ok(result.rows_affected())
}

async fn ensure_roles_exist(pool: &Pool<Postgres>, role_ids: &[i64]) -> AppResult<()> {
    let found: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM roles WHERE id = ANY($1)")
        .bind(role_ids)
        .fetch_one(pool)
        .await?;
    if found as usize != role_ids.len() {
        return Err(AppError::validation("roles", "Some roles do not exist"));
    }
    Ok(())
}

async fn link_roles(
    tx: &mut sqlx::Transaction<'_, Postgres>,
    user_id: i64,
    role_ids: &[i64],
) -> AppResult<()> {
    if role_ids.is_empty() {
        return Ok(());
    }
    sqlx::query("INSERT INTO user_roles (user_id, role_id) SELECT $1, unnest($2::bigint[])")
        .bind(user_id)
        .bind(role_ids)
        .execute(&mut **tx)
        .await?;
    Ok(())
}

async fn load_role_links(
    pool: &Pool<Postgres>,
    user_ids: &[i64],
) -> AppResult<Vec<(i64, RoleItem)>> {
    if user_ids.is_empty() {
        return Ok(Vec::new());
    }
    let rows: Vec<(i64, i64, String, chrono::DateTime<chrono::Utc>, chrono::DateTime<chrono::Utc>)> =
        sqlx::query_as(
            r#"
            SELECT ur.user_id, r.id, r.name, r.created_at, r.updated_at
            FROM roles r
            JOIN user_roles ur ON ur.role_id = r.id
            WHERE ur.user_id = ANY($1)
            ORDER BY r.id
            "#,
        )
        .bind(user_ids)
        .fetch_all(pool)
        .await?;
    Ok(rows
        .into_iter()
        .map(|(user_id, id, name, created_at, updated_at)| {
            (user_id, RoleItem { id, name, created_at, updated_at })
        })
        .collect())
}

/// 把角色行归并到各自的用户上
fn attach_roles(users: Vec<User>, links: Vec<(i64, RoleItem)>) -> Vec<UserWithRoles> {
    let mut by_user: HashMap<i64, Vec<RoleItem>> = HashMap::new();
    for (user_id, role) in links {
        by_user.entry(user_id).or_default().push(role);
    }
    users
        .into_iter()
        .map(|user| UserWithRoles {
            roles: by_user.remove(&user.id).unwrap_or_default(),
            user,
        })
        .collect()
}

/// antd sorter 参数（`{"field":"ascend"|"descend"}`）转白名单排序
fn parse_sorter(raw: Option<&str>) -> Option<(&'static str, &'static str)> {
    let value: serde_json::Value = serde_json::from_str(raw?).ok()?;
    let obj = value.as_object()?;
    let (field, order) = obj.iter().next()?;
    let column = sort_column(field)?;
    Some((column, convert_sort_order(order.as_str().unwrap_or("ascend"))))
}

fn sort_column(field: &str) -> Option<&'static str> {
    match field {
        "id" => Some("id"),
        "email" => Some("email"),
        "username" => Some("username"),
        "status" => Some("status"),
        "gender" => Some("gender"),
        "isAdmin" => Some("is_admin"),
        "departmentId" => Some("department_id"),
        "createdAt" => Some("created_at"),
        "updatedAt" => Some("updated_at"),
        _ => None,
    }
}

fn convert_sort_order(order: &str) -> &'static str {
    if order == "descend" {
        "DESC"
    } else {
        "ASC"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn user(id: i64) -> User {
        User {
            id,
            email: format!("u{}@example.com", id),
            password: "hash".to_string(),
            hashed_rt: None,
            status: "1".to_string(),
            username: Some(format!("u{}", id)),
            avatar: DEFAULT_AVATAR.to_string(),
            gender: Some("1".to_string()),
            is_admin: false,
            department_id: Some(123),
            phone_number: None,
            first_name: None,
            last_name: None,
            wechat_id: None,
            mini_wechat_id: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    fn role(id: i64, name: &str) -> RoleItem {
        RoleItem {
            id,
            name: name.to_string(),
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn test_attach_roles_groups_by_user() {
        let users = vec![user(1), user(2), user(3)];
        let links = vec![
            (1, role(10, "admin")),
            (1, role(11, "editor")),
            (3, role(10, "admin")),
        ];
        let result = attach_roles(users, links);
        assert_eq!(result[0].roles.len(), 2);
        assert!(result[1].roles.is_empty());
        assert_eq!(result[2].roles[0].name, "admin");
    }

    #[test]
    fn test_parse_sorter() {
        assert_eq!(
            parse_sorter(Some(r#"{"createdAt":"descend"}"#)),
            Some(("created_at", "DESC"))
        );
        assert_eq!(
            parse_sorter(Some(r#"{"username":"ascend"}"#)),
            Some(("username", "ASC"))
        );
        // 非法 JSON 与未知字段都退回默认
        assert_eq!(parse_sorter(Some("not json")), None);
        assert_eq!(parse_sorter(Some(r#"{"password":"ascend"}"#)), None);
        assert_eq!(parse_sorter(None), None);
    }

    #[test]
    fn test_convert_sort_order_defaults_to_asc() {
        assert_eq!(convert_sort_order("descend"), "DESC");
        assert_eq!(convert_sort_order("ascend"), "ASC");
        assert_eq!(convert_sort_order("anything"), "ASC");
    }
}
