use actix_web::{HttpRequest, HttpResponse, ResponseError};
use serde::Serialize;
use serde_json::json;
use thiserror::Error;

/// 统一的应用错误类型
#[derive(Error, Debug)]
pub enum AppError {
    #[error("配置错误: {0}")]
    Config(#[from] crate::comm::config::ConfigError),

    #[error("认证错误: {message}")]
    Auth { message: String },

    #[error("权限错误: {message}")]
    Permission { message: String },

    #[error("验证错误: {field}: {message}")]
    Validation { field: String, message: String },

    #[error("资源未找到: {resource}")]
    NotFound { resource: String },

    #[error("资源冲突: {message}")]
    Conflict { message: String },

    #[error("数据库错误: {message}")]
    Database { message: String },

    #[error("缓存错误: {message}")]
    Cache { message: String },

    #[error("队列错误: {message}")]
    Queue { message: String },

    #[error("外部服务错误: {service}: {message}")]
    ExternalService { service: String, message: String },

    #[error("内部错误: {0}")]
    Internal(#[from] anyhow::Error),
}

impl AppError {
    /// 创建认证错误
    pub fn auth<T: Into<String>>(message: T) -> Self {
        Self::Auth {
            message: message.into(),
        }
    }

    /// 创建权限错误
    pub fn permission<T: Into<String>>(message: T) -> Self {
        Self::Permission {
            message: message.into(),
        }
    }

    /// 创建验证错误
    pub fn validation<T: Into<String>, U: Into<String>>(field: T, message: U) -> Self {
        Self::Validation {
            field: field.into(),
            message: message.into(),
        }
    }

    /// 创建资源未找到错误
    pub fn not_found<T: Into<String>>(resource: T) -> Self {
        Self::NotFound {
            resource: resource.into(),
        }
    }

    /// 创建资源冲突错误
    pub fn conflict<T: Into<String>>(message: T) -> Self {
        Self::Conflict {
            message: message.into(),
        }
    }

    /// 创建数据库错误
    pub fn database<T: Into<String>>(message: T) -> Self {
        Self::Database {
            message: message.into(),
        }
    }

    /// 创建缓存错误
    pub fn cache<T: Into<String>>(message: T) -> Self {
        Self::Cache {
            message: message.into(),
        }
    }

    /// 创建队列错误
    pub fn queue<T: Into<String>>(message: T) -> Self {
        Self::Queue {
            message: message.into(),
        }
    }

    /// 创建外部服务错误
    pub fn external_service<T: Into<String>, U: Into<String>>(service: T, message: U) -> Self {
        Self::ExternalService {
            service: service.into(),
            message: message.into(),
        }
    }

    /// 获取HTTP状态码
    pub fn status_code(&self) -> actix_web::http::StatusCode {
        use actix_web::http::StatusCode;

        match self {
            AppError::Config(_) => StatusCode::INTERNAL_SERVER_ERROR,
            AppError::Auth { .. } => StatusCode::UNAUTHORIZED,
            AppError::Permission { .. } => StatusCode::FORBIDDEN,
            AppError::Validation { .. } => StatusCode::BAD_REQUEST,
            AppError::NotFound { .. } => StatusCode::NOT_FOUND,
            AppError::Conflict { .. } => StatusCode::CONFLICT,
            AppError::Database { .. } => StatusCode::INTERNAL_SERVER_ERROR,
            AppError::Cache { .. } => StatusCode::INTERNAL_SERVER_ERROR,
            AppError::Queue { .. } => StatusCode::INTERNAL_SERVER_ERROR,
            AppError::ExternalService { .. } => StatusCode::BAD_GATEWAY,
            AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

/// 数据库唯一约束冲突映射为 409，其余按内部错误处理
impl From<sqlx::Error> for AppError {
    fn from(e: sqlx::Error) -> Self {
        match &e {
            sqlx::Error::RowNotFound => AppError::not_found("记录"),
            sqlx::Error::Database(db) if db.is_unique_violation() => {
                AppError::conflict(db.message().to_string())
            }
            _ => AppError::database(e.to_string()),
        }
    }
}

impl From<redis::RedisError> for AppError {
    fn from(e: redis::RedisError) -> Self {
        AppError::cache(e.to_string())
    }
}

impl From<lapin::Error> for AppError {
    fn from(e: lapin::Error) -> Self {
        AppError::queue(e.to_string())
    }
}

impl From<validator::ValidationErrors> for AppError {
    fn from(e: validator::ValidationErrors) -> Self {
        let field = e
            .field_errors()
            .keys()
            .next()
            .map(|k| k.to_string())
            .unwrap_or_else(|| "body".to_string());
        AppError::validation(field, e.to_string())
    }
}

impl ResponseError for AppError {
    fn error_response(&self) -> HttpResponse {
        let status = self.status_code();
        let message = self.to_string();

        // 记录错误日志
        match self {
            AppError::Internal(_)
            | AppError::Database { .. }
            | AppError::Cache { .. }
            | AppError::Queue { .. } => {
                tracing::error!("Internal error: {}", message);
            }
            AppError::ExternalService { .. } => {
                tracing::warn!("External service error: {}", message);
            }
            _ => {
                tracing::info!("Client error: {}", message);
            }
        }

        HttpResponse::build(status).json(json!({
            "statusCode": status.as_u16(),
            "timestamp": chrono::Utc::now().to_rfc3339(),
            "path": serde_json::Value::Null,
            "message": message,
            "data": serde_json::Value::Null,
            "success": false,
            "showType": 2
        }))
    }
}

/// 应用结果类型
pub type AppResult<T> = Result<T, AppError>;

/// 统一的成功响应结构
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiResponse<T> {
    pub status_code: u16,
    pub timestamp: String,
    pub path: String,
    pub message: String,
    pub data: T,
    pub success: bool,
    pub show_type: i32,
}

impl<T: Serialize> ApiResponse<T> {
    pub fn ok(path: &str, data: T) -> Self {
        Self {
            status_code: 200,
            timestamp: chrono::Utc::now().to_rfc3339(),
            path: path.to_string(),
            message: "Operation successful".to_string(),
            data,
            success: true,
            show_type: 0,
        }
    }

    /// 按请求路径包装成功响应
    pub fn respond(req: &HttpRequest, data: T) -> HttpResponse {
        HttpResponse::Ok().json(Self::ok(req.path(), data))
    }
}

/// 便捷宏：创建API成功响应
#[macro_export]
macro_rules! api_success {
    ($req:expr, $data:expr) => {
        Ok($crate::error::ApiResponse::respond(&$req, $data))
    };
}

#[cfg(test)]
mod tests {
    use super::*;
    use actix_web::body::to_bytes;
    use actix_web::http::StatusCode;

    #[test]
    fn test_status_code_mapping() {
        assert_eq!(
            AppError::auth("no token").status_code(),
            StatusCode::UNAUTHORIZED
        );
        assert_eq!(
            AppError::permission("missing permission").status_code(),
            StatusCode::FORBIDDEN
        );
        assert_eq!(
            AppError::not_found("user").status_code(),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            AppError::conflict("duplicate email").status_code(),
            StatusCode::CONFLICT
        );
        assert_eq!(
            AppError::external_service("ip-api", "timeout").status_code(),
            StatusCode::BAD_GATEWAY
        );
    }

    #[actix_web::test]
    async fn test_error_envelope_shape() {
        let resp = AppError::permission("权限不足").error_response();
        assert_eq!(resp.status(), StatusCode::FORBIDDEN);

        let body = to_bytes(resp.into_body()).await.unwrap();
        let value: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(value["success"], false);
        assert_eq!(value["showType"], 2);
        assert_eq!(value["statusCode"], 403);
        assert!(value["data"].is_null());
    }

    #[test]
    fn test_success_envelope() {
        let resp = ApiResponse::ok("/api/users", serde_json::json!({"id": 1}));
        assert!(resp.success);
        assert_eq!(resp.show_type, 0);
        assert_eq!(resp.message, "Operation successful");
        assert_eq!(resp.path, "/api/users");
    }
}
