//! 图文日志（现场照片加文字说明）

pub mod models;
pub mod routes;
pub mod service;

use actix_web::web;

pub fn configure(cfg: &mut web::ServiceConfig) {
    routes::register(cfg, "/api/photo-logs");
}
