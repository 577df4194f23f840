use actix_web::{web, HttpRequest, HttpResponse};
use validator::Validate;

use crate::api_success;
use crate::error::AppResult;
use crate::state::AppState;

use super::models::{CreateArticleDto, UpdateArticleDto};
use super::service;

pub fn register(cfg: &mut web::ServiceConfig, path: &str) {
    cfg.service(
        web::scope(path)
            .route("", web::get().to(find_published_handle))
            .route("", web::post().to(create_handle))
            .route("/drafts", web::get().to(find_drafts_handle))
            .route("/{id}", web::get().to(find_one_handle))
            .route("/{id}", web::patch().to(update_handle))
            .route("/{id}", web::delete().to(remove_handle)),
    );
}

/// 已发布文章列表
#[utoipa::path(
    get,
    path = "/articles",
    responses((status = 200, description = "全部已发布文章")),
    tag = "articles"
)]
pub async fn find_published_handle(
    req: HttpRequest,
    state: web::Data<AppState>,
) -> AppResult<HttpResponse> {
    let articles = service::find_published(&state.pool).await?;
    api_success!(req, articles)
}

pub async fn find_drafts_handle(
    req: HttpRequest,
    state: web::Data<AppState>,
) -> AppResult<HttpResponse> {
    let drafts = service::find_drafts(&state.pool).await?;
    api_success!(req, drafts)
}

pub async fn find_one_handle(
    req: HttpRequest,
    state: web::Data<AppState>,
    id: web::Path<i64>,
) -> AppResult<HttpResponse> {
    let article = service::find_one(&state.pool, id.into_inner()).await?;
    api_success!(req, article)
}

pub async fn create_handle(
    req: HttpRequest,
    state: web::Data<AppState>,
    body: web::Json<CreateArticleDto>,
) -> AppResult<HttpResponse> {
    let dto = body.into_inner();
    dto.validate()?;
    let created = service::create(&state.pool, &dto).await?;
    api_success!(req, created)
}

pub async fn update_handle(
    req: HttpRequest,
    state: web::Data<AppState>,
    id: web::Path<i64>,
    body: web::Json<UpdateArticleDto>,
) -> AppResult<HttpResponse> {
    let dto = body.into_inner();
    dto.validate()?;
    let updated = service::update(&state.pool, id.into_inner(), &dto).await?;
    api_success!(req, updated)
}

pub async fn remove_handle(
    req: HttpRequest,
    state: web::Data<AppState>,
    id: web::Path<i64>,
) -> AppResult<HttpResponse> {
    let removed = service::remove(&state.pool, id.into_inner()).await?;
    api_success!(req, removed)
}
