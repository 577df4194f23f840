//! 系统访问日志
//!
//! 中间件产生记录，后台任务落库并补全 IP 地理信息，
//! 这里是查询、导出与清理接口。

pub mod models;
pub mod routes;
pub mod service;
pub mod worker;

use actix_web::web;

pub fn configure(cfg: &mut web::ServiceConfig) {
    routes::register(cfg, "/api/system-log");
}
