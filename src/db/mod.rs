/// 数据库连接管理模块
/// Database connection management

pub mod connection;

pub use connection::{check_health, get_pool};
