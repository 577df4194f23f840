use actix_web::{web, HttpRequest, HttpResponse};

use crate::api_success;
use crate::auth::extractor::AuthUser;
use crate::auth::permissions::{check, perm};
use crate::error::AppResult;
use crate::state::AppState;

use super::models::{ClearQuery, LogQuery};
use super::service;

pub fn register(cfg: &mut web::ServiceConfig, path: &str) {
    cfg.service(
        web::scope(path)
            .route("/export", web::get().to(export_handle))
            .route("/clear", web::delete().to(clear_handle))
            .route("", web::get().to(find_all_handle))
            .route("/{id}", web::get().to(find_one_handle)),
    );
}

/// 按条件查询日志
#[utoipa::path(
    get,
    path = "/api/system-log",
    tag = "系统日志",
    responses((status = 200, description = "分页日志", body = super::models::SystemLogPage)),
    security(("bearer_auth" = []))
)]
pub async fn find_all_handle(
    req: HttpRequest,
    state: web::Data<AppState>,
    user: AuthUser,
    query: web::Query<LogQuery>,
) -> AppResult<HttpResponse> {
    check(&state.pool, &user, &[perm("GET", "/system-log")]).await?;
    let page = service::find_all(&state.pool, &query).await?;
    api_success!(req, page)
}

pub async fn find_one_handle(
    req: HttpRequest,
    state: web::Data<AppState>,
    user: AuthUser,
    id: web::Path<i64>,
) -> AppResult<HttpResponse> {
    check(&state.pool, &user, &[perm("GET", "/system-log/:id")]).await?;
    let log = service::find_one(&state.pool, id.into_inner()).await?;
    api_success!(req, log)
}

pub async fn export_handle(
    req: HttpRequest,
    state: web::Data<AppState>,
    user: AuthUser,
    query: web::Query<LogQuery>,
) -> AppResult<HttpResponse> {
    check(&state.pool, &user, &[perm("GET", "/system-log/export")]).await?;
    let logs = service::export(&state.pool, &query).await?;
    api_success!(req, logs)
}

/// 清理历史日志，days 为保留天数
pub async fn clear_handle(
    req: HttpRequest,
    state: web::Data<AppState>,
    user: AuthUser,
    query: web::Query<ClearQuery>,
) -> AppResult<HttpResponse> {
    check(&state.pool, &user, &[perm("DELETE", "/system-log/clear")]).await?;
    let result = service::clear(&state.pool, query.days).await?;
    api_success!(req, result)
}
