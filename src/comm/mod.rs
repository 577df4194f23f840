/// 通用基础模块
/// Common utility module

pub mod config;
pub mod dto;
pub mod duration;
pub mod pagination;
pub mod port;
pub mod random;
pub mod upload;
