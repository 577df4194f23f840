pub mod api;
pub mod auth;
#[path = "bootstrap/app_bootstrap.rs"]
pub mod app_bootstrap;
#[path = "bootstrap/command_registry.rs"]
pub mod command_registry;
#[path = "bootstrap/route_registry.rs"]
pub mod route_registry;
pub mod cache;
pub mod comm;
pub mod db;
pub mod email;
pub mod error;
pub mod geo;
pub mod middleware;
pub mod modules;
pub mod monitoring;
pub mod queue;
pub mod sms;
pub mod state;
pub mod storage;
pub mod wechat;

/// 注册全部业务路由
pub fn init_routes() {
    crate::register_routes![
        ("auth", "登录注册与令牌", "auth", modules::auth::configure),
        ("captcha", "图形验证码", "captcha", modules::captcha::configure),
        ("users", "用户管理", "users", modules::users::configure),
        ("roles", "角色管理", "roles", modules::roles::configure),
        (
            "permissions",
            "权限管理",
            "permissions",
            modules::permissions::configure
        ),
        (
            "permission-groups",
            "权限分组",
            "permissions",
            modules::permission_groups::configure
        ),
        ("menus", "菜单树", "menus", modules::menus::configure),
        ("articles", "文章", "articles", modules::articles::configure),
        ("images", "图片管理", "media", modules::images::configure),
        (
            "photo-logs",
            "图文日志",
            "media",
            modules::photo_logs::configure
        ),
        (
            "system-log",
            "请求审计日志",
            "system",
            modules::system_log::configure
        ),
        ("metrics", "Prometheus 指标", "system", api::metrics::configure),
    ];
}

// Re-export bootstrap modules
pub use app_bootstrap::*;
pub use command_registry::*;
pub use route_registry::*;
