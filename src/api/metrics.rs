use actix_web::{web, HttpResponse};

use crate::error::{AppError, AppResult};
use crate::monitoring;

pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.route("/api/metrics", web::get().to(metrics_handle));
}

/// Prometheus 拉取端点，文本格式输出全部指标
#[utoipa::path(
    get,
    path = "/api/metrics",
    tag = "metrics",
    responses(
        (status = 200, description = "Prometheus 文本格式指标", content_type = "text/plain"),
        (status = 500, description = "指标采集器未初始化")
    )
)]
pub async fn metrics_handle() -> AppResult<HttpResponse> {
    let body = monitoring::render()
        .ok_or_else(|| AppError::Internal(anyhow::anyhow!("metrics recorder not initialized")))?;
    Ok(HttpResponse::Ok()
        .content_type("text/plain; version=0.0.4; charset=utf-8")
        .body(body))
}

#[cfg(test)]
mod tests {
    use super::*;
    use actix_web::{test, web, App};

    #[actix_web::test]
    async fn test_metrics_endpoint_renders() {
        monitoring::init();
        monitoring::email_received("verification");

        let app =
            test::init_service(App::new().route("/api/metrics", web::get().to(metrics_handle)))
                .await;
        let req = test::TestRequest::get().uri("/api/metrics").to_request();
        let resp = test::call_service(&app, req).await;
        assert!(resp.status().is_success());

        let body = test::read_body(resp).await;
        let text = String::from_utf8(body.to_vec()).unwrap();
        assert!(text.contains("email_received_total"));
    }
}
