use actix_web::{web, HttpRequest, HttpResponse};
use serde_json::json;
use validator::Validate;

use crate::api_success;
use crate::auth::extractor::AuthUser;
use crate::auth::permissions::{check, perm};
use crate::comm::dto::IdsDto;
use crate::error::AppResult;
use crate::state::AppState;

use super::models::{CreateUserDto, UpdateUserDto, UserPageQuery};
use super::service;

pub fn register(cfg: &mut web::ServiceConfig, path: &str) {
    cfg.service(
        web::scope(path)
            .route("", web::get().to(find_all_handle))
            .route("", web::post().to(create_handle))
            .route("", web::delete().to(remove_bulk_handle))
            .route("/page", web::get().to(find_all_paged_handle))
            .route("/current", web::get().to(current_handle))
            .route("/{id}", web::get().to(find_one_handle))
            .route("/{id}", web::patch().to(update_handle))
            .route("/{id}", web::delete().to(remove_handle)),
    );
}

pub async fn find_all_handle(
    req: HttpRequest,
    state: web::Data<AppState>,
    user: AuthUser,
) -> AppResult<HttpResponse> {
    check(&state.pool, &user, &[perm("GET", "/users")]).await?;
    let users = service::find_all(&state.pool).await?;
    api_success!(req, users)
}

/// 用户分页列表，支持筛选与 antd sorter 排序
#[utoipa::path(
    get,
    path = "/api/users/page",
    responses((status = 200, description = "分页数据，含角色")),
    security(("bearer_auth" = [])),
    tag = "users"
)]
pub async fn find_all_paged_handle(
    req: HttpRequest,
    state: web::Data<AppState>,
    user: AuthUser,
    query: web::Query<UserPageQuery>,
) -> AppResult<HttpResponse> {
    check(&state.pool, &user, &[perm("GET", "/users")]).await?;
    let page = service::find_all_paged(&state.pool, &query).await?;
    api_success!(req, page)
}

/// 当前登录用户，带角色与权限
#[utoipa::path(
    get,
    path = "/api/users/current",
    responses((status = 200, description = "当前用户画像")),
    security(("bearer_auth" = [])),
    tag = "users"
)]
pub async fn current_handle(
    req: HttpRequest,
    state: web::Data<AppState>,
    user: AuthUser,
) -> AppResult<HttpResponse> {
    let profile = service::find_current(&state.pool, user.id).await?;
    api_success!(req, profile)
}

pub async fn find_one_handle(
    req: HttpRequest,
    state: web::Data<AppState>,
    user: AuthUser,
    id: web::Path<i64>,
) -> AppResult<HttpResponse> {
    check(&state.pool, &user, &[perm("GET", "/users")]).await?;
    let found = service::find_one(&state.pool, id.into_inner()).await?;
    api_success!(req, found)
}

/// 创建用户并绑定角色
#[utoipa::path(
    post,
    path = "/api/users",
    request_body = CreateUserDto,
    responses(
        (status = 200, description = "创建成功"),
        (status = 400, description = "引用了不存在的角色")
    ),
    security(("bearer_auth" = [])),
    tag = "users"
)]
pub async fn create_handle(
    req: HttpRequest,
    state: web::Data<AppState>,
    user: AuthUser,
    body: web::Json<CreateUserDto>,
) -> AppResult<HttpResponse> {
    check(&state.pool, &user, &[perm("POST", "/users")]).await?;
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
    body: web::Json<UpdateUserDto>,
) -> AppResult<HttpResponse> {
    check(&state.pool, &user, &[perm("Patch", "/users")]).await?;
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
    check(&state.pool, &user, &[perm("DELETE", "/users")]).await?;
    let removed = service::remove(&state.pool, id.into_inner()).await?;
    api_success!(req, removed)
}

pub async fn remove_bulk_handle(
    req: HttpRequest,
    state: web::Data<AppState>,
    user: AuthUser,
    body: web::Json<IdsDto>,
) -> AppResult<HttpResponse> {
    check(&state.pool, &user, &[perm("DELETE", "/users")]).await?;
    let count = service::remove_by_ids(&state.pool, &body.ids).await?;
    api_success!(req, json!({ "count": count }))
}
