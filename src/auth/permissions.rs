use std::collections::HashSet;

use sqlx::{Pool, Postgres};

use crate::auth::extractor::AuthUser;
use crate::error::{AppError, AppResult};

/// 路由声明的权限要求，(action, path) 精确匹配
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RequiredPermission {
    pub action: &'static str,
    pub path: &'static str,
}

/// 声明权限要求的简写
pub const fn perm(action: &'static str, path: &'static str) -> RequiredPermission {
    RequiredPermission { action, path }
}

/// 权限判定，纯函数
///
/// 规则：无要求直接放行；管理员直接放行；否则要求的每一项
/// 都必须在持有集合中按 (action, path) 完全相等命中。
pub fn evaluate(
    is_admin: bool,
    required: &[RequiredPermission],
    held: &HashSet<(String, String)>,
) -> bool {
    if required.is_empty() {
        return true;
    }
    if is_admin {
        return true;
    }
    required
        .iter()
        .all(|p| held.contains(&(p.action.to_string(), p.path.to_string())))
}

/// 加载用户经由角色持有的全部权限
pub async fn load_user_permissions(
    pool: &Pool<Postgres>,
    user_id: i64,
) -> AppResult<HashSet<(String, String)>> {
    let rows: Vec<(String, String)> = sqlx::query_as(
        r#"
        SELECT p.action, p.path
        FROM permissions p
        JOIN role_permissions rp ON rp.permission_id = p.id
        JOIN user_roles ur ON ur.role_id = rp.role_id
        WHERE ur.user_id = $1
        "#,
    )
    .bind(user_id)
    .fetch_all(pool)
    .await?;
    Ok(rows.into_iter().collect())
}

/// 路由权限检查入口
pub async fn check(
    pool: &Pool<Postgres>,
    user: &AuthUser,
    required: &[RequiredPermission],
) -> AppResult<()> {
    if required.is_empty() || user.is_admin {
        return Ok(());
    }
    let held = load_user_permissions(pool, user.id).await?;
    if evaluate(user.is_admin, required, &held) {
        Ok(())
    } else {
        Err(AppError::permission("Insufficient permissions"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn held(pairs: &[(&str, &str)]) -> HashSet<(String, String)> {
        pairs
            .iter()
            .map(|(a, p)| (a.to_string(), p.to_string()))
            .collect()
    }

    #[test]
    fn test_no_required_allows_anyone() {
        assert!(evaluate(false, &[], &held(&[])));
    }

    #[test]
    fn test_admin_bypasses_check() {
        let required = [perm("GET", "/users"), perm("DELETE", "/users")];
        assert!(evaluate(true, &required, &held(&[])));
    }

    #[test]
    fn test_all_required_must_match() {
        let required = [perm("GET", "/users"), perm("POST", "/users")];
        assert!(evaluate(
            false,
            &required,
            &held(&[("GET", "/users"), ("POST", "/users"), ("GET", "/roles")])
        ));
        // 缺一个即拒绝
        assert!(!evaluate(
            false,
            &required,
            &held(&[("GET", "/users")])
        ));
    }

    #[test]
    fn test_no_matching_record_denied() {
        let required = [perm("GET", "/users")];
        assert!(!evaluate(false, &required, &held(&[])));
    }

    #[test]
    fn test_match_is_exact_on_both_fields() {
        let required = [perm("GET", "/users")];
        assert!(!evaluate(false, &required, &held(&[("get", "/users")])));
        assert!(!evaluate(false, &required, &held(&[("GET", "/users/")])));
        assert!(!evaluate(false, &required, &held(&[("POST", "/users")])));
    }
}
