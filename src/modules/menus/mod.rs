use actix_web::web;

pub mod models;
pub mod routes;
pub mod service;

/// 菜单即权限组，前端导航从同一棵树上长出来
pub fn configure(cfg: &mut web::ServiceConfig) {
    routes::register(cfg, "/api/menus");
}
