use actix_web::{web, HttpResponse};
use serde::Deserialize;
use serde_json::json;
use utoipa::ToSchema;

use crate::error::AppResult;
use crate::state::AppState;

use super::service;

pub fn register(cfg: &mut web::ServiceConfig, path: &str) {
    cfg.service(
        web::scope(path)
            .route("", web::get().to(captcha_handle))
            .route("/validate", web::get().to(captcha_validate_handle)),
    );
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct CaptchaValidateQuery {
    pub token: Option<String>,
    pub input: Option<String>,
}

/// 获取图形验证码
#[utoipa::path(
    get,
    path = "/api/captcha",
    responses((status = 200, description = "base64 图片与校验 token")),
    tag = "captcha"
)]
pub async fn captcha_handle(state: web::Data<AppState>) -> AppResult<HttpResponse> {
    let captcha = service::generate(&state.redis).await?;
    Ok(HttpResponse::Ok().json(json!({
        "image": captcha.image,
        "token": captcha.token,
    })))
}

/// 校验图形验证码
#[utoipa::path(
    get,
    path = "/api/captcha/validate",
    params(
        ("token" = String, Query, description = "获取验证码时返回的 token"),
        ("input" = String, Query, description = "用户输入")
    ),
    responses((status = 200, description = "校验结果")),
    tag = "captcha"
)]
pub async fn captcha_validate_handle(
    state: web::Data<AppState>,
    query: web::Query<CaptchaValidateQuery>,
) -> AppResult<HttpResponse> {
    let params = query.into_inner();
    let is_valid = match (&params.token, &params.input) {
        (Some(token), Some(input)) => service::validate(&state.redis, token, input).await?,
        _ => false,
    };
    Ok(HttpResponse::Ok().json(json!({ "isValid": is_valid })))
}
