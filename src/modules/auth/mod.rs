/// 认证模块
/// 密码登录、令牌刷新、注册（含邮箱/短信验证码）、小程序登录
pub mod models;
pub mod routes;
pub mod service;

use actix_web::web;

pub fn configure(cfg: &mut web::ServiceConfig) {
    routes::register(cfg, "/api/auth");
}
