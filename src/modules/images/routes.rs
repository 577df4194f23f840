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

use super::models::{CreateImageDto, ImagePageQuery, UpdateImageDto};
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

/// 上传图片文件
///
/// 成功后返回对象路径和 24 小时预签名下载链接。
#[utoipa::path(
    post,
    path = "/api/images/upload",
    tag = "图片管理",
    request_body(content_type = "multipart/form-data"),
    responses(
        (status = 200, description = "上传成功"),
        (status = 400, description = "文件缺失、类型不支持或超过大小限制")
    ),
    security(("bearer_auth" = []))
)]
pub async fn upload_handle(
    state: web::Data<AppState>,
    user: AuthUser,
    payload: Multipart,
) -> AppResult<HttpResponse> {
    check(&state.pool, &user, &[perm("POST", "/images/upload")]).await?;
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
    dto: web::Json<CreateImageDto>,
) -> AppResult<HttpResponse> {
    check(&state.pool, &user, &[perm("POST", "/images")]).await?;
    dto.validate()?;
    let image = service::create(&state, &dto, user.id).await?;
    api_success!(req, image)
}

/// 图片分页列表
#[utoipa::path(
    get,
    path = "/api/images",
    tag = "图片管理",
    responses((status = 200, description = "分页数据", body = super::models::ImagePage)),
    security(("bearer_auth" = []))
)]
pub async fn find_all_handle(
    req: HttpRequest,
    state: web::Data<AppState>,
    user: AuthUser,
    query: web::Query<ImagePageQuery>,
) -> AppResult<HttpResponse> {
    check(&state.pool, &user, &[perm("GET", "/images")]).await?;
    let page = service::find_all(&state, &query).await?;
    api_success!(req, page)
}

pub async fn find_one_handle(
    req: HttpRequest,
    state: web::Data<AppState>,
    user: AuthUser,
    id: web::Path<i64>,
) -> AppResult<HttpResponse> {
    check(&state.pool, &user, &[perm("GET", "/images/:id")]).await?;
    let image = service::find_one(&state, id.into_inner(), &user).await?;
    api_success!(req, image)
}

pub async fn update_handle(
    req: HttpRequest,
    state: web::Data<AppState>,
    user: AuthUser,
    id: web::Path<i64>,
    dto: web::Json<UpdateImageDto>,
) -> AppResult<HttpResponse> {
    check(&state.pool, &user, &[perm("PATCH", "/images/:id")]).await?;
    dto.validate()?;
    let image = service::update(&state, id.into_inner(), &dto, &user).await?;
    api_success!(req, image)
}

pub async fn remove_handle(
    req: HttpRequest,
    state: web::Data<AppState>,
    user: AuthUser,
    id: web::Path<i64>,
) -> AppResult<HttpResponse> {
    check(&state.pool, &user, &[perm("DELETE", "/images/:id")]).await?;
    let image = service::remove(&state, id.into_inner(), &user).await?;
    api_success!(req, image)
}
