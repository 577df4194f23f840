//! 对外的文档与指标端点

pub mod metrics;
pub mod swagger;
