use actix_web::{web, HttpRequest, HttpResponse};
use serde_json::json;
use validator::Validate;

use crate::api_success;
use crate::auth::extractor::AuthUser;
use crate::auth::permissions::{check, perm};
use crate::comm::dto::IdsDto;
use crate::error::AppResult;
use crate::state::AppState;

use super::models::{CreateMenuDto, MenuPageQuery, UpdateMenuDto};
use super::service;

pub fn register(cfg: &mut web::ServiceConfig, path: &str) {
    cfg.service(
        web::scope(path)
            .route("", web::get().to(find_all_paged_handle))
            .route("", web::post().to(create_handle))
            .route("", web::delete().to(remove_bulk_handle))
            .route("/user", web::get().to(user_menus_handle))
            .route("/{id}", web::get().to(find_one_handle))
            .route("/{id}", web::patch().to(update_handle))
            .route("/{id}", web::delete().to(remove_handle)),
    );
}

/// 菜单分页，带 name 时按名称平铺过滤
#[utoipa::path(
    get,
    path = "/api/menus",
    responses((status = 200, description = "菜单分页，无过滤时返回顶层树")),
    security(("bearer_auth" = [])),
    tag = "菜单管理"
)]
pub async fn find_all_paged_handle(
    req: HttpRequest,
    state: web::Data<AppState>,
    user: AuthUser,
    query: web::Query<MenuPageQuery>,
) -> AppResult<HttpResponse> {
    check(&state.pool, &user, &[perm("GET", "/menus")]).await?;
    let page = service::find_all_paged(&state.pool, &query).await?;
    api_success!(req, page)
}

/// 当前用户可见的菜单树
#[utoipa::path(
    get,
    path = "/api/menus/user",
    responses((status = 200, description = "按持有权限过滤后的菜单树")),
    security(("bearer_auth" = [])),
    tag = "菜单管理"
)]
pub async fn user_menus_handle(
    req: HttpRequest,
    state: web::Data<AppState>,
    user: AuthUser,
) -> AppResult<HttpResponse> {
    let menus = service::find_menu_by_user(&state.pool, user.id).await?;
    api_success!(req, menus)
}

pub async fn find_one_handle(
    req: HttpRequest,
    state: web::Data<AppState>,
    user: AuthUser,
    id: web::Path<i64>,
) -> AppResult<HttpResponse> {
    check(&state.pool, &user, &[perm("GET", "/menus")]).await?;
    let menu = service::find_one(&state.pool, id.into_inner()).await?;
    api_success!(req, menu)
}

pub async fn create_handle(
    req: HttpRequest,
    state: web::Data<AppState>,
    user: AuthUser,
    body: web::Json<CreateMenuDto>,
) -> AppResult<HttpResponse> {
    check(&state.pool, &user, &[perm("POST", "/menus")]).await?;
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
    body: web::Json<UpdateMenuDto>,
) -> AppResult<HttpResponse> {
    check(&state.pool, &user, &[perm("PATCH", "/menus")]).await?;
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
    check(&state.pool, &user, &[perm("DELETE", "/menus")]).await?;
    let removed = service::remove(&state.pool, id.into_inner()).await?;
    api_success!(req, removed)
}

pub async fn remove_bulk_handle(
    req: HttpRequest,
    state: web::Data<AppState>,
    user: AuthUser,
    body: web::Json<IdsDto>,
) -> AppResult<HttpResponse> {
    check(&state.pool, &user, &[perm("DELETE", "/menus")]).await?;
    let count = service::remove_by_ids(&state.pool, &body.ids).await?;
    api_success!(req, json!({ "count": count }))
}
