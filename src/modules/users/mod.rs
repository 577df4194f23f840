/// 用户模块
pub mod models;
pub mod routes;
pub mod service;

use actix_web::web;

pub fn configure(cfg: &mut web::ServiceConfig) {
    routes::register(cfg, "/api/users");
}
