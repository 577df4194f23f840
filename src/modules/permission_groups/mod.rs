use actix_web::web;

pub mod models;
pub mod routes;
pub mod service;

pub fn configure(cfg: &mut web::ServiceConfig) {
    routes::register(cfg, "/api/permissiongroups");
}
