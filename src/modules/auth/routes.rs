use actix_web::{web, HttpRequest, HttpResponse};
use serde_json::json;
use validator::Validate;

use crate::api_success;
use crate::auth::extractor::AuthUser;
use crate::auth::jwt::TokenPair;
use crate::error::{AppError, AppResult};
use crate::state::AppState;

use super::models::{
    LoginDto, MiniProgramLoginDto, QrcodeQuery, RefreshTokenDto, RegisterByEmailDto, RegisterDto,
    SendEmailCodeDto, SignUpFormData, ValidateTokenDto,
};
use super::service;

pub fn register(cfg: &mut web::ServiceConfig, path: &str) {
    cfg.service(
        web::scope(path)
            .route("/login", web::post().to(login_handle))
            .route("/logout", web::post().to(logout_handle))
            .route("/register", web::post().to(register_handle))
            .route("/refresh", web::post().to(refresh_handle))
            .route("/registerByEmail", web::post().to(register_by_email_handle))
            .route("/validateCaptcha", web::post().to(validate_captcha_handle))
            .route("/validateEmail", web::post().to(validate_email_handle))
            .route("/validateSMS", web::post().to(validate_sms_handle))
            .route("/miniprogram-login", web::post().to(miniprogram_login_handle))
            .route(
                "/exchange-code-for-user",
                web::post().to(exchange_code_handle),
            )
            .route(
                "/wechat-miniprogram-qrcode",
                web::get().to(miniprogram_qrcode_handle),
            ),
    );
}

/// 密码登录
#[utoipa::path(
    post,
    path = "/api/auth/login",
    request_body = LoginDto,
    responses(
        (status = 200, description = "登录成功，返回令牌对", body = TokenPair),
        (status = 401, description = "密码错误"),
        (status = 404, description = "邮箱未注册")
    ),
    tag = "auth"
)]
pub async fn login_handle(
    req: HttpRequest,
    state: web::Data<AppState>,
    body: web::Json<LoginDto>,
) -> AppResult<HttpResponse> {
    let dto = body.into_inner();
    dto.validate()?;
    let tokens = service::login(&state, &dto.email, &dto.password).await?;
    api_success!(req, tokens)
}

/// 注销当前用户的刷新令牌
#[utoipa::path(
    post,
    path = "/api/auth/logout",
    responses((status = 200, description = "注销成功")),
    security(("bearer_auth" = [])),
    tag = "auth"
)]
pub async fn logout_handle(
    req: HttpRequest,
    state: web::Data<AppState>,
    user: AuthUser,
) -> AppResult<HttpResponse> {
    let ok = service::logout(&state, user.id).await?;
    api_success!(req, ok)
}

/// 注册新用户，返回令牌对
#[utoipa::path(
    post,
    path = "/api/auth/register",
    request_body = RegisterDto,
    responses(
        (status = 200, description = "注册成功，返回令牌对", body = TokenPair),
        (status = 409, description = "邮箱或手机号已占用")
    ),
    tag = "auth"
)]
pub async fn register_handle(
    req: HttpRequest,
    state: web::Data<AppState>,
    body: web::Json<RegisterDto>,
) -> AppResult<HttpResponse> {
    let dto = body.into_inner();
    dto.validate()?;
    let tokens = service::register(&state, &dto).await?;
    api_success!(req, tokens)
}

/// 刷新令牌轮换
#[utoipa::path(
    post,
    path = "/api/auth/refresh",
    request_body = RefreshTokenDto,
    responses(
        (status = 200, description = "轮换成功，返回新令牌对", body = TokenPair),
        (status = 401, description = "刷新令牌无效或已被轮换")
    ),
    tag = "auth"
)]
pub async fn refresh_handle(
    req: HttpRequest,
    state: web::Data<AppState>,
    body: web::Json<RefreshTokenDto>,
) -> AppResult<HttpResponse> {
    let dto = body.into_inner();
    dto.validate()?;
    let tokens = service::refresh(&state, &dto.refresh_token).await?;
    api_success!(req, tokens)
}

pub async fn register_by_email_handle(
    req: HttpRequest,
    state: web::Data<AppState>,
    body: web::Json<RegisterByEmailDto>,
) -> AppResult<HttpResponse> {
    let dto = body.into_inner();
    dto.validate()?;
    let tokens = service::register_by_email(&state, &dto).await?;
    api_success!(req, tokens)
}

pub async fn validate_captcha_handle(
    req: HttpRequest,
    state: web::Data<AppState>,
    body: web::Json<SignUpFormData>,
) -> AppResult<HttpResponse> {
    let form = body.into_inner();
    form.validate()?;
    if form.password != form.confirm_password {
        return Err(AppError::validation("confirmPassword", "两次输入的密码不一致"));
    }
    let is_valid = service::validate_captcha(&state, &form).await?;
    api_success!(req, json!({ "isValid": is_valid }))
}

/// 发送邮箱验证码，返回后续校验用的 token
pub async fn validate_email_handle(
    req: HttpRequest,
    state: web::Data<AppState>,
    body: web::Json<SendEmailCodeDto>,
) -> AppResult<HttpResponse> {
    let dto = body.into_inner();
    dto.validate()?;
    let token = service::send_email_code(&state, &dto.email).await?;
    api_success!(req, json!({ "token": token }))
}

pub async fn validate_sms_handle(
    req: HttpRequest,
    state: web::Data<AppState>,
    body: web::Json<ValidateTokenDto>,
) -> AppResult<HttpResponse> {
    let dto = body.into_inner();
    dto.validate()?;
    let is_valid = service::validate_sms_code(&state, &dto.token, &dto.code).await?;
    api_success!(req, json!({ "isValid": is_valid }))
}

pub async fn miniprogram_login_handle(
    req: HttpRequest,
    state: web::Data<AppState>,
    body: web::Json<MiniProgramLoginDto>,
) -> AppResult<HttpResponse> {
    let dto = body.into_inner();
    dto.validate()?;
    let tokens = service::miniprogram_login(&state, &dto.code).await?;
    api_success!(req, tokens)
}

/// code 换 openid/session，返回原始会话数据
pub async fn exchange_code_handle(
    req: HttpRequest,
    state: web::Data<AppState>,
    body: web::Json<MiniProgramLoginDto>,
) -> AppResult<HttpResponse> {
    let dto = body.into_inner();
    dto.validate()?;
    let session = state.wechat.code_to_session(&dto.code).await?;
    api_success!(req, session)
}

/// 生成小程序码，直接返回图片字节
pub async fn miniprogram_qrcode_handle(
    state: web::Data<AppState>,
    query: web::Query<QrcodeQuery>,
) -> AppResult<HttpResponse> {
    let params = query.into_inner();
    let png = state
        .wechat
        .get_unlimited_qrcode(&params.scene, params.page.as_deref())
        .await?;
    Ok(HttpResponse::Ok().content_type("image/png").body(png))
}

#[cfg(test)]
mod tests {
    use actix_web::http::StatusCode;
    use actix_web::{test, web, App};

    // 路由挂载与请求体校验可以离开数据库验证：
    // 缺字段的请求在进入 service 之前就应被拒绝
    #[actix_web::test]
    async fn test_login_rejects_malformed_body() {
        let app = test::init_service(App::new().route(
            "/api/auth/login",
            web::post().to(
                |body: web::Json<super::LoginDto>| async move {
                    use validator::Validate;
                    match body.validate() {
                        Ok(()) => actix_web::HttpResponse::Ok().finish(),
                        Err(_) => actix_web::HttpResponse::BadRequest().finish(),
                    }
                },
            ),
        ))
        .await;

        let req = test::TestRequest::post()
            .uri("/api/auth/login")
            .set_json(serde_json::json!({ "email": "not-an-email", "password": "secret1" }))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);

        let req = test::TestRequest::post()
            .uri("/api/auth/login")
            .set_json(serde_json::json!({ "email": "a@b.com", "password": "secret1" }))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::OK);
    }
}
