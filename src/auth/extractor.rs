use actix_web::dev::Payload;
use actix_web::http::header::AUTHORIZATION;
use actix_web::{web, FromRequest, HttpMessage, HttpRequest};
use futures_util::future::LocalBoxFuture;

use crate::error::AppError;
use crate::state::AppState;

/// 已认证用户，处理函数以提取器方式获得
///
/// 提取流程：Bearer 令牌 -> 校验 access 签名 -> 按 userId 加载用户。
/// 任一步失败返回 401。
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct AuthUser {
    pub id: i64,
    pub email: String,
    pub username: Option<String>,
    pub is_admin: bool,
}

/// 放入请求扩展的当前用户信息，供日志中间件读取
#[derive(Debug, Clone)]
pub struct CurrentUser {
    pub id: i64,
    pub username: String,
}

impl FromRequest for AuthUser {
    type Error = AppError;
    type Future = LocalBoxFuture<'static, Result<Self, Self::Error>>;

    fn from_request(req: &HttpRequest, _payload: &mut Payload) -> Self::Future {
        let req = req.clone();
        Box::pin(async move {
            let state = req
                .app_data::<web::Data<AppState>>()
                .cloned()
                .ok_or_else(|| AppError::Internal(anyhow::anyhow!("AppState 未注册")))?;
            let token = bearer_token(&req).ok_or_else(|| AppError::auth("缺少访问令牌"))?;
            let claims = state.tokens.verify_access(&token)?;
            let user: AuthUser = sqlx::query_as(
                "SELECT id, email, username, is_admin FROM users WHERE id = $1",
            )
            .bind(claims.user_id)
            .fetch_optional(&state.pool)
            .await?
            .ok_or_else(|| AppError::auth("用户不存在"))?;

            req.extensions_mut().insert(CurrentUser {
                id: user.id,
                username: user
                    .username
                    .clone()
                    .unwrap_or_else(|| "anonymous".to_string()),
            });
            Ok(user)
        })
    }
}

/// 从 Authorization 头取出 Bearer 令牌
pub fn bearer_token(req: &HttpRequest) -> Option<String> {
    let header = req.headers().get(AUTHORIZATION)?.to_str().ok()?;
    header
        .strip_prefix("Bearer ")
        .map(|t| t.trim().to_string())
        .filter(|t| !t.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use actix_web::test::TestRequest;

    #[test]
    fn test_bearer_token_parsed() {
        let req = TestRequest::default()
            .insert_header((AUTHORIZATION, "Bearer abc.def.ghi"))
            .to_http_request();
        assert_eq!(bearer_token(&req).as_deref(), Some("abc.def.ghi"));
    }

    #[test]
    fn test_missing_or_malformed_header_rejected() {
        let req = TestRequest::default().to_http_request();
        assert_eq!(bearer_token(&req), None);

        let req = TestRequest::default()
            .insert_header((AUTHORIZATION, "Basic dXNlcjpwYXNz"))
            .to_http_request();
        assert_eq!(bearer_token(&req), None);

        let req = TestRequest::default()
            .insert_header((AUTHORIZATION, "Bearer "))
            .to_http_request();
        assert_eq!(bearer_token(&req), None);
    }
}
