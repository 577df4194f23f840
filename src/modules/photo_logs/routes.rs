use actix_multipart::Multipart;
use actix_web::{web, HttpRequest, HttpResponse};
use serde_json::json;
use validator::Validate;

use crate::api_success;
use crate::auth::extractor::AuthUser;
use crate::auth::permissions::{check, perm};
use crate::comm::upload::read_image_field;
use crate::error::AppResult;
use crate::state::AppState;
use crate::storage::ObjectStorage;

use super::models::{CreatePhotoLogDto, PhotoLogPageQuery, UpdatePhotoLogDto};
use super::service;

pub fn register(cfg: &mut web::ServiceConfig, path: &str) {
    cfg.service(
        web::scope(path)
            .route("/upload", web::post().to(upload_handle))
            .route("", web::post().to(create_handle))
            .route("", web::get().to(find_all_handle))
            .route("/{id}", web::get().to(find_one_handle))
            .route("/{id}", web::patch().to(update_handle))
            .route("/{id}", web::delete().to(remove_handle)),
    );
}

/// 上传日志配图，规则与图片上传一致
pub async fn upload_handle(
    state: web::Data<AppState>,
    user: AuthUser,
    payload: Multipart,
) -> AppResult<HttpResponse> {
    check(&state.pool, &user, &[perm("POST", "/photo-logs/upload")]).await?;
    let file = read_image_field(payload).await?;
    let key = ObjectStorage::object_key(&file.filename);
    state.storage.upload(&key, file.bytes, &file.content_type).await?;
    let url = state.storage.presigned_get_url(&key);
    Ok(HttpResponse::Ok().json(json!({
        "success": true,
        "data": { "url": url, "path": key }
    })))
}

pub async fn create_handle(
    req: HttpRequest,
    state: web::Data<AppState>,
    user: AuthUser,
    dto: web::Json<CreatePhotoLogDto>,
) -> AppResult<HttpResponse> {
    check(&state.pool, &user, &[perm("POST", "/photo-logs")]).await?;
    dto.validate()?;
    let log = service::create(&state, &dto, user.id).await?;
    api_success!(req, log)
}

/// 图文日志分页列表
#[utoipa::path(
    get,
    path = "/api/photo-logs",
    tag = "照片日志管理",
    responses((status = 200, description = "分页数据", body = super::models::PhotoLogPage)),
    security(("bearer_auth" = []))
)]
pub async fn find_all_handle(
    req: HttpRequest,
    state: web::Data<AppState>,
    user: AuthUser,
    query: web::Query<PhotoLogPageQuery>,
) -> AppResult<HttpResponse> {
    check(&state.pool, &user, &[perm("GET", "/photo-logs")]).await?;
    let page = service::find_all(&state, &query).await?;
    api_success!(req, page)
}

pub async fn find_one_handle(
    req: HttpRequest,
    state: web::Data<AppState>,
    user: AuthUser,
    id: web::Path<i64>,
) -> AppResult<HttpResponse> {
    check(&state.pool, &user, &[perm("GET", "/photo-logs/:id")]).await?;
    let log = service::find_one(&state, id.into_inner(), &user).await?;
    api_success!(req, log)
}

pub async fn update_handle(
    req: HttpRequest,
    state: web::Data<AppState>,
    user: AuthUser,
    id: web::Path<i64>,
    dto: web::Json<UpdatePhotoLogDto>,
) -> AppResult<HttpResponse> {
    check(&state.pool, &user, &[perm("PATCH", "/photo-logs/:id")]).await?;
    dto.validate()?;
    let log = service::update(&state, id.into_inner(), &dto, &user).await?;
    api_success!(req, log)
}

pub async fn remove_handle(
    req: HttpRequest,
    state: web::Data<AppState>,
    user: AuthUser,
    id: web::Path<i64>,
) -> AppResult<HttpResponse> {
    check(&state.pool, &user, &[perm("DELETE", "/photo-logs/:id")]).await?;
    let log = service::remove(&state, id.into_inner(), &user).await?;
    api_success!(req, log)
}
