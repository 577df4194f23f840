use actix_web::{web, HttpRequest, HttpResponse};
use serde_json::json;
use validator::Validate;

use crate::api_success;
use crate::auth::extractor::AuthUser;
use crate::auth::permissions::{check, perm};
use crate::comm::dto::IdsDto;
use crate::error::AppResult;
use crate::state::AppState;

use super::models::{CreatePermissionDto, UpdatePermissionDto};
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

pub async fn find_all_handle(
    req: HttpRequest,
    state: web::Data<AppState>,
    user: AuthUser,
) -> AppResult<HttpResponse> {
    check(&state.pool, &user, &[perm("GET", "/permissions")]).await?;
    let permissions = service::find_all(&state.pool).await?;
    api_success!(req, permissions)
}

pub async fn find_one_handle(
    req: HttpRequest,
    state: web::Data<AppState>,
    user: AuthUser,
    id: web::Path<i64>,
) -> AppResult<HttpResponse> {
    check(&state.pool, &user, &[perm("GET", "/permissions")]).await?;
    let found = service::find_one(&state.pool, id.into_inner()).await?;
    api_success!(req, found)
}

pub async fn create_handle(
    req: HttpRequest,
    state: web::Data<AppState>,
    user: AuthUser,
    body: web::Json<CreatePermissionDto>,
) -> AppResult<HttpResponse> {
    check(&state.pool, &user, &[perm("POST", "/permissions")]).await?;
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
    body: web::Json<UpdatePermissionDto>,
) -> AppResult<HttpResponse> {
    check(&state.pool, &user, &[perm("Patch", "/permissions")]).await?;
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
    check(&state.pool, &user, &[perm("DELETE", "/permissions")]).await?;
    let removed = service::remove(&state.pool, id.into_inner()).await?;
    api_success!(req, removed)
}

pub async fn remove_bulk_handle(
    req: HttpRequest,
    state: web::Data<AppState>,
    user: AuthUser,
    body: web::Json<IdsDto>,
) -> AppResult<HttpResponse> {
    check(&state.pool, &user, &[perm("DELETE", "/permissions")]).await?;
    let count = service::remove_by_ids(&state.pool, &body.ids).await?;
    api_success!(req, json!({ "count": count }))
}
