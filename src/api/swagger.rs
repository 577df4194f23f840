use utoipa::openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme};
use utoipa::{Modify, OpenApi};

/// OpenAPI 文档聚合
///
/// 只收录常用接口，完整路由以源码为准。
#[derive(OpenApi)]
#[openapi(
    paths(
        crate::modules::auth::routes::login_handle,
        crate::modules::auth::routes::logout_handle,
        crate::modules::auth::routes::register_handle,
        crate::modules::auth::routes::refresh_handle,
        crate::modules::captcha::routes::captcha_handle,
        crate::modules::captcha::routes::captcha_validate_handle,
        crate::modules::users::routes::find_all_paged_handle,
        crate::modules::users::routes::current_handle,
        crate::modules::users::routes::create_handle,
        crate::modules::roles::routes::find_all_handle,
        crate::modules::roles::routes::create_handle,
        crate::modules::permission_groups::routes::find_all_handle,
        crate::modules::menus::routes::find_all_paged_handle,
        crate::modules::menus::routes::user_menus_handle,
        crate::modules::articles::routes::find_published_handle,
        crate::modules::images::routes::upload_handle,
        crate::modules::images::routes::find_all_handle,
        crate::modules::photo_logs::routes::find_all_handle,
        crate::modules::system_log::routes::find_all_handle,
        crate::api::metrics::metrics_handle,
    ),
    components(
        schemas(
            crate::auth::jwt::TokenPair,
            crate::modules::auth::models::LoginDto,
            crate::modules::auth::models::RegisterDto,
            crate::modules::auth::models::RefreshTokenDto,
            crate::modules::users::models::User,
            crate::modules::users::models::CreateUserDto,
            crate::modules::roles::models::Role,
            crate::modules::roles::models::CreateRoleDto,
            crate::modules::permissions::models::Permission,
            crate::modules::permission_groups::models::PermissionGroup,
            crate::modules::articles::models::Article,
            crate::modules::images::models::ImagePage,
            crate::modules::images::models::Image,
            crate::modules::photo_logs::models::PhotoLogPage,
            crate::modules::photo_logs::models::PhotoLog,
            crate::modules::system_log::models::SystemLogPage,
            crate::modules::system_log::models::SystemLog,
        )
    ),
    modifiers(&SecurityAddon),
    tags(
        (name = "auth", description = "登录注册与令牌"),
        (name = "captcha", description = "图形验证码"),
        (name = "users", description = "用户管理"),
        (name = "roles", description = "角色管理"),
        (name = "permissiongroups", description = "权限分组"),
        (name = "菜单管理", description = "菜单树维护与用户菜单"),
        (name = "articles", description = "文章"),
        (name = "图片管理", description = "图片上传与检索"),
        (name = "照片日志管理", description = "图文日志"),
        (name = "系统日志", description = "请求审计日志"),
        (name = "metrics", description = "Prometheus 指标")
    )
)]
pub struct ApiDoc;

/// 注册 bearer_auth 安全方案，受保护接口在注解里引用
struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            components.add_security_scheme(
                "bearer_auth",
                SecurityScheme::Http(
                    HttpBuilder::new()
                        .scheme(HttpAuthScheme::Bearer)
                        .bearer_format("JWT")
                        .build(),
                ),
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_openapi_document_builds() {
        let doc = ApiDoc::openapi();
        let json = doc.to_json().unwrap();
        assert!(json.contains("/api/auth/login"));
        assert!(json.contains("/api/system-log"));
        assert!(json.contains("bearer_auth"));
    }
}
