use actix_web::web;

pub mod models;
pub mod routes;
pub mod service;

/// 文章接口挂在根路径，不带 /api 前缀
pub fn configure(cfg: &mut web::ServiceConfig) {
    routes::register(cfg, "/articles");
}
