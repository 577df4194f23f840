use actix_web::{
    dev::{forward_ready, Service, ServiceRequest, ServiceResponse, Transform},
    http::header,
    Error, HttpMessage,
};
use futures_util::future::LocalBoxFuture;
use std::rc::Rc;
use std::time::Instant;
use tokio::sync::mpsc;
use tracing::warn;

use crate::auth::CurrentUser;

/// 一次请求的访问日志，经通道交给后台任务落库
#[derive(Debug, Clone)]
pub struct SystemLogRecord {
    pub user_id: Option<i64>,
    pub username: String,
    pub request_url: String,
    pub method: String,
    pub status: i32,
    pub ip: String,
    pub user_agent: Option<String>,
    pub duration_ms: i64,
    pub error_msg: Option<String>,
    pub params: serde_json::Value,
}

/// 本机回环地址在地理解析前替换为公共地址
const LOCAL_FALLBACK_IP: &str = "114.114.114.114";

/// 访问日志中间件
///
/// 只持有发送端，落库与地理信息补全都在后台任务完成，
/// 请求路径上不做任何 IO。
pub struct SystemLogMiddleware {
    sender: mpsc::Sender<SystemLogRecord>,
}

impl SystemLogMiddleware {
    pub fn new(sender: mpsc::Sender<SystemLogRecord>) -> Self {
        Self { sender }
    }
}

impl<S, B> Transform<S, ServiceRequest> for SystemLogMiddleware
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<B>;
    type Error = Error;
    type Transform = SystemLogMiddlewareService<S>;
    type InitError = ();
    type Future = std::future::Ready<Result<Self::Transform, Self::InitError>>;

    fn new_transform(&self, service: S) -> Self::Future {
        std::future::ready(Ok(SystemLogMiddlewareService {
            service: Rc::new(service),
            sender: self.sender.clone(),
        }))
    }
}

pub struct SystemLogMiddlewareService<S> {
    service: Rc<S>,
    sender: mpsc::Sender<SystemLogRecord>,
}

impl<S, B> Service<ServiceRequest> for SystemLogMiddlewareService<S>
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<B>;
    type Error = Error;
    type Future = LocalBoxFuture<'static, Result<Self::Response, Self::Error>>;

    forward_ready!(service);

    fn call(&self, req: ServiceRequest) -> Self::Future {
        let service = self.service.clone();
        let sender = self.sender.clone();

        Box::pin(async move {
            let content_type = header_value(req.headers(), header::CONTENT_TYPE);
            if should_skip(req.path(), content_type.as_deref()) {
                return service.call(req).await;
            }

            let started = Instant::now();
            let method = req.method().to_string();
            let request_url = req.path().to_string();
            let ip = client_ip(&req);
            let user_agent = header_value(req.headers(), header::USER_AGENT);
            let language = header_value(req.headers(), header::ACCEPT_LANGUAGE);
            let headers_json = filtered_headers(req.headers());
            let query = query_map(req.query_string());
            let http_req = req.request().clone();

            let result = service.call(req).await;

            let (status, error_msg) = match &result {
                Ok(res) => {
                    let status = res.status().as_u16() as i32;
                    let msg = res
                        .response()
                        .error()
                        .filter(|_| res.status().is_client_error() || res.status().is_server_error())
                        .map(|e| e.to_string());
                    (status, msg)
                }
                Err(err) => (
                    err.as_response_error().status_code().as_u16() as i32,
                    Some(err.to_string()),
                ),
            };

            let current = http_req.extensions().get::<CurrentUser>().cloned();
            let record = SystemLogRecord {
                user_id: current.as_ref().map(|c| c.id),
                username: current
                    .map(|c| c.username)
                    .unwrap_or_else(|| "anonymous".to_string()),
                request_url,
                method,
                status,
                ip,
                user_agent,
                duration_ms: started.elapsed().as_millis() as i64,
                error_msg,
                params: serde_json::json!({
                    "headers": headers_json,
                    "query": query,
                    "language": language,
                }),
            };

            if sender.try_send(record).is_err() {
                warn!("访问日志通道已满，丢弃一条记录");
            }
            result
        })
    }
}

/// 日志自身的查询接口与文件上传不记录
pub fn should_skip(path: &str, content_type: Option<&str>) -> bool {
    if path.starts_with("/api/system-log") {
        return true;
    }
    if let Some(ct) = content_type {
        if ct.starts_with("multipart/form-data") {
            return true;
        }
    }
    false
}

/// 客户端 IP，优先级：cf-connecting-ip > x-forwarded-for 首项 > 对端地址
pub fn client_ip(req: &ServiceRequest) -> String {
    let raw = header_value(req.headers(), header::HeaderName::from_static("cf-connecting-ip"))
        .or_else(|| {
            header_value(req.headers(), header::HeaderName::from_static("x-forwarded-for"))
                .and_then(|v| v.split(',').next().map(|s| s.trim().to_string()))
                .filter(|s| !s.is_empty())
        })
        .or_else(|| req.peer_addr().map(|a| a.ip().to_string()))
        .unwrap_or_else(|| "127.0.0.1".to_string());
    normalize_ip(&raw)
}

pub fn normalize_ip(ip: &str) -> String {
    match ip {
        "::1" | "::ffff:127.0.0.1" | "127.0.0.1" => LOCAL_FALLBACK_IP.to_string(),
        other => other.to_string(),
    }
}

fn header_value(headers: &header::HeaderMap, name: header::HeaderName) -> Option<String> {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(|v| v.to_string())
}

/// 请求头转 JSON，凭证相关的头不落库
pub fn filtered_headers(headers: &header::HeaderMap) -> serde_json::Map<String, serde_json::Value> {
    let mut map = serde_json::Map::new();
    for (name, value) in headers.iter() {
        let key = name.as_str().to_lowercase();
        if key == "authorization" || key == "cookie" {
            continue;
        }
        if let Ok(v) = value.to_str() {
            map.insert(key, serde_json::Value::String(v.to_string()));
        }
    }
    map
}

/// 查询串解析为对象，同名键保留最后一个
pub fn query_map(query: &str) -> serde_json::Map<String, serde_json::Value> {
    let mut map = serde_json::Map::new();
    for pair in query.split('&').filter(|p| !p.is_empty()) {
        let (key, value) = pair.split_once('=').unwrap_or((pair, ""));
        let key = urlencoding::decode(key).map(|s| s.into_owned()).unwrap_or_else(|_| key.to_string());
        let value = urlencoding::decode(value)
            .map(|s| s.into_owned())
            .unwrap_or_else(|_| value.to_string());
        map.insert(key, serde_json::Value::String(value));
    }
    map
}

#[cfg(test)]
mod tests {
    use super::*;
    use actix_web::http::header::AUTHORIZATION;
    use actix_web::test::{self, TestRequest};
    use actix_web::{web, App, HttpResponse};

    #[test]
    fn test_should_skip_rules() {
        assert!(should_skip("/api/system-log", None));
        assert!(should_skip("/api/system-log/export", None));
        assert!(should_skip(
            "/api/images/upload",
            Some("multipart/form-data; boundary=x")
        ));
        assert!(!should_skip("/api/users", Some("application/json")));
        assert!(!should_skip("/api/auth/login", None));
    }

    #[test]
    fn test_client_ip_precedence() {
        let req = TestRequest::default()
            .insert_header(("cf-connecting-ip", "203.0.113.9"))
            .insert_header(("x-forwarded-for", "1.2.3.4, 5.6.7.8"))
            .to_srv_request();
        assert_eq!(client_ip(&req), "203.0.113.9");

        let req = TestRequest::default()
            .insert_header(("x-forwarded-for", "1.2.3.4, 5.6.7.8"))
            .to_srv_request();
        assert_eq!(client_ip(&req), "1.2.3.4");

        // 无任何来源时回落到本机地址并被替换
        let req = TestRequest::default().to_srv_request();
        assert_eq!(client_ip(&req), LOCAL_FALLBACK_IP);
    }

    #[test]
    fn test_localhost_rewritten() {
        assert_eq!(normalize_ip("::1"), LOCAL_FALLBACK_IP);
        assert_eq!(normalize_ip("::ffff:127.0.0.1"), LOCAL_FALLBACK_IP);
        assert_eq!(normalize_ip("8.8.8.8"), "8.8.8.8");
    }

    #[test]
    fn test_credential_headers_dropped() {
        let req = TestRequest::default()
            .insert_header((AUTHORIZATION, "Bearer secret"))
            .insert_header(("cookie", "sid=1"))
            .insert_header(("user-agent", "curl/8"))
            .to_srv_request();
        let map = filtered_headers(req.headers());
        assert!(!map.contains_key("authorization"));
        assert!(!map.contains_key("cookie"));
        assert_eq!(map["user-agent"], "curl/8");
    }

    #[test]
    fn test_query_map_decodes() {
        let map = query_map("name=%E5%BC%A0%E4%B8%89&page=2&flag");
        assert_eq!(map["name"], "张三");
        assert_eq!(map["page"], "2");
        assert_eq!(map["flag"], "");
        assert!(query_map("").is_empty());
    }

    #[actix_web::test]
    async fn test_middleware_emits_record() {
        let (tx, mut rx) = mpsc::channel(8);
        let app = test::init_service(
            App::new()
                .wrap(SystemLogMiddleware::new(tx))
                .route("/api/users", web::get().to(HttpResponse::Ok))
                .route("/api/system-log", web::get().to(HttpResponse::Ok)),
        )
        .await;

        let req = TestRequest::get()
            .uri("/api/users?page=1")
            .insert_header(("user-agent", "test-agent"))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert!(resp.status().is_success());

        let record = rx.recv().await.unwrap();
        assert_eq!(record.request_url, "/api/users");
        assert_eq!(record.method, "GET");
        assert_eq!(record.status, 200);
        assert_eq!(record.username, "anonymous");
        assert_eq!(record.params["query"]["page"], "1");
        assert!(record.duration_ms >= 0);

        // 日志接口自身不产生记录
        let req = TestRequest::get().uri("/api/system-log").to_request();
        test::call_service(&app, req).await;
        assert!(rx.try_recv().is_err());
    }
}
