use actix_web::{web, HttpRequest, HttpResponse};
use serde_json::json;
use validator::Validate;

use crate::api_success;
use crate::auth::extractor::AuthUser;
use crate::auth::permissions::{check, perm};
use crate::comm::dto::IdsDto;
use crate::error::AppResult;
use crate::state::AppState;

use super::models::{CreateRoleDto, UpdateRoleDto};
use super::service;

pub fn register(cfg: &mut web::ServiceConfig, path: &str) {
    cfg.service(
        web::scope(path)
            .route("", web::get().to(find_all_handle))
            .route("", web::post().to(create_handle))
            .route("", web::delete().to(remove_bulk_handle))
            .route("/{id}", web::get().to(find_one_handle))
            .route("/{id}", web::patch().to(update_handle))
            .route("/{id}", web::delete().to(remove_handle)),
    );
}

/// 角色列表，带权限与用户引用
#[utoipa::path(
    get,
    path = "/api/roles",
    responses((status = 200, description = "全部角色")),
    security(("bearer_auth" = [])),
    tag = "roles"
)]
pub async fn find_all_handle(
    req: HttpRequest,
    state: web::Data<AppState>,
    user: AuthUser,
) -> AppResult<HttpResponse> {
    check(&state.pool, &user, &[perm("GET", "/roles")]).await?;
    let roles = service::find_all(&state.pool).await?;
    api_success!(req, roles)
}

pub async fn find_one_handle(
    req: HttpRequest,
    state: web::Data<AppState>,
    user: AuthUser,
    id: web::Path<i64>,
) -> AppResult<HttpResponse> {
    check(&state.pool, &user, &[perm("GET", "/roles")]).await?;
    let detail = service::find_one(&state.pool, id.into_inner()).await?;
    api_success!(req, detail)
}

/// 创建角色并绑定权限
#[utoipa::path(
    post,
    path = "/api/roles",
    request_body = CreateRoleDto,
    responses(
        (status = 200, description = "创建成功"),
        (status = 400, description = "引用了不存在的权限")
    ),
    security(("bearer_auth" = [])),
    tag = "roles"
)]
pub async fn create_handle(
    req: HttpRequest,
    state: web::Data<AppState>,
    user: AuthUser,
    body: web::Json<CreateRoleDto>,
) -> AppResult<HttpResponse> {
    check(&state.pool, &user, &[perm("POST", "/roles")]).await?;
    let dto = body.into_inner();
    dto.validate()?;
    let created = service::create(&state.pool, &dto).await?;
    api_success!(req, created)
}

pub async fn update_handle(
    req: HttpRequest,
    state: web::Data<AppState>,
    user: AuthUser,
    id: web::Path<i64>,
    body: web::Json<UpdateRoleDto>,
) -> AppResult<HttpResponse> {
    check(&state.pool, &user, &[perm("Patch", "/roles")]).await?;
    let dto = body.into_inner();
    dto.validate()?;
    let updated = service::update(&state.pool, id.into_inner(), &dto).await?;
    api_success!(req, updated)
}

pub async fn remove_handle(
    req: HttpRequest,
    state: web::Data<AppState>,
    user: AuthUser,
    id: web::Path<i64>,
) -> AppResult<HttpResponse> {
    check(&state.pool, &user, &[perm("DELETE", "/roles")]).await?;
    let removed = service::remove(&state.pool, id.into_inner()).await?;
    api_success!(req, removed)
}

pub async fn remove_bulk_handle(
    req: HttpRequest,
    state: web::Data<AppState>,
    user: AuthUser,
    body: web::Json<IdsDto>,
) -> AppResult<HttpResponse> {
    check(&state.pool, &user, &[perm("DELETE", "/roles")]).await?;
    let count = service::remove_by_ids(&state.pool, &body.ids).await?;
    api_success!(req, json!({ "count": count }))
}
