/// 业务模块
/// 每个模块按 models / service / routes 组织，路由通过
/// `routes::register(cfg, path)` 挂载到指定前缀
pub mod articles;
pub mod auth;
pub mod captcha;
pub mod images;
pub mod menus;
pub mod permission_groups;
pub mod permissions;
pub mod photo_logs;
pub mod roles;
pub mod system_log;
pub mod users;
