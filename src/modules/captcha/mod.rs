/// 图形验证码模块
///
/// 出于兼容性，本模块的两个端点返回原始 JSON（不套统一应答信封）。
pub mod routes;
pub mod service;

use actix_web::web;

pub fn configure(cfg: &mut web::ServiceConfig) {
    routes::register(cfg, "/api/captcha");
}
