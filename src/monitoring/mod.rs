//! Prometheus 指标
//!
//! 进程内安装 recorder，指标文本由 `/api/metrics` 路由渲染输出。

use std::sync::{Once, OnceLock};
use std::time::Duration;

use metrics::{describe_counter, describe_histogram};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use tracing::{info, warn};

static INIT: Once = Once::new();
static HANDLE: OnceLock<PrometheusHandle> = OnceLock::new();

/// 安装全局 recorder 并注册指标描述，可重复调用
pub fn init() {
    INIT.call_once(|| {
        match PrometheusBuilder::new().install_recorder() {
            Ok(handle) => {
                if HANDLE.set(handle).is_err() {
                    warn!("Prometheus handle already set");
                }
                info!("Prometheus recorder installed");
            }
            Err(e) => {
                warn!(error = %e, "failed to install Prometheus recorder");
                return;
            }
        }

        describe_counter!(
            "email_received_total",
            "Total number of email messages received from the queue"
        );
        describe_counter!(
            "email_success_total",
            "Total number of emails sent successfully"
        );
        describe_counter!("email_failure_total", "Total number of failed email sends");
        describe_histogram!(
            "email_processing_duration_seconds",
            "Time spent sending a single email"
        );
    });
}

/// 渲染 Prometheus 文本格式
pub fn render() -> Option<String> {
    HANDLE.get().map(|h| h.render())
}

pub fn email_received(kind: &'static str) {
    ::metrics::counter!("email_received_total", "type" => kind).increment(1);
}

pub fn email_success(kind: &'static str) {
    ::metrics::counter!("email_success_total", "type" => kind).increment(1);
}

pub fn email_failure(kind: &'static str) {
    ::metrics::counter!("email_failure_total", "type" => kind).increment(1);
}

pub fn email_processing_duration(kind: &'static str, elapsed: Duration) {
    ::metrics::histogram!("email_processing_duration_seconds", "type" => kind)
        .record(elapsed.as_secs_f64());
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_init_is_idempotent_and_renders() {
        init();
        init();

        email_received("verification");
        email_success("verification");
        email_failure("notification");
        email_processing_duration("verification", Duration::from_millis(120));

        let text = render().unwrap_or_default();
        assert!(text.contains("email_received_total"));
        assert!(text.contains("email_processing_duration_seconds"));
    }
}
