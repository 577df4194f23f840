//! HTTP 中间件

pub mod system_log;

pub use system_log::{SystemLogMiddleware, SystemLogRecord};
