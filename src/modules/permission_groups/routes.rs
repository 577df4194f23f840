use actix_web::{web, HttpRequest, HttpResponse};
use validator::Validate;

use crate::api_success;
use crate::auth::extractor::AuthUser;
use crate::error::AppResult;
use crate::state::AppState;

use super::models::{CreatePermissionGroupDto, UpdatePermissionGroupDto};
use super::service;

pub fn register(cfg: &mut web::ServiceConfig, path: &str) {
    cfg.service(
        web::scope(path)
            .route("", web::get().to(find_all_handle))
            .route("", web::post().to(create_handle))
            .route("/{id}", web::get().to(find_one_handle))
            .route("/{id}", web::patch().to(update_handle))
            .route("/{id}", web::delete().to(remove_handle)),
    );
}

/// 顶层权限组树
#[utoipa::path(
    get,
    path = "/api/permissiongroups",
    responses((status = 200, description = "顶层分组，含权限与两层子组")),
    security(("bearer_auth" = [])),
    tag = "permissiongroups"
)]
pub async fn find_all_handle(
    req: HttpRequest,
    state: web::Data<AppState>,
    _user: AuthUser,
) -> AppResult<HttpResponse> {
    let groups = service::find_all(&state.pool).await?;
    api_success!(req, groups)
}

pub async fn find_one_handle(
    req: HttpRequest,
    state: web::Data<AppState>,
    _user: AuthUser,
    id: web::Path<i64>,
) -> AppResult<HttpResponse> {
    let group = service::find_one(&state.pool, id.into_inner()).await?;
    api_success!(req, group)
}

pub async fn create_handle(
    req: HttpRequest,
    state: web::Data<AppState>,
    _user: AuthUser,
    body: web::Json<CreatePermissionGroupDto>,
) -> AppResult<HttpResponse> {
    let dto = body.into_inner();
    dto.validate()?;
    let created = service::create(&state.pool, &dto).await?;
    api_success!(req, created)
}

pub async fn update_handle(
    req: HttpRequest,
    state: web::Data<AppState>,
    _user: AuthUser,
    id: web::Path<i64>,
    body: web::Json<UpdatePermissionGroupDto>,
) -> AppResult<HttpResponse> {
    let dto = body.into_inner();
    dto.validate()?;
    let updated = service::update(&state.pool, id.into_inner(), &dto).await?;
    api_success!(req, updated)
}

pub async fn remove_handle(
    req: HttpRequest,
    state: web::Data<AppState>,
    _user: AuthUser,
    id: web::Path<i64>,
) -> AppResult<HttpResponse> {
    let removed = service::remove(&state.pool, id.into_inner()).await?;
    api_success!(req, removed)
}
