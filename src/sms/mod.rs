//! 短信验证码发送
//!
//! 验证码的生成与校验在 auth 模块完成，这里只负责对接短信服务商。
//! 未配置 `sms.provider_url` 时视为关闭，发送直接按成功处理。

use serde::Serialize;

use crate::comm::config::ConfigManager;
use crate::error::{AppError, AppResult};

#[derive(Clone)]
pub struct SmsClient {
    http: reqwest::Client,
    provider_url: Option<String>,
    sign_name: String,
}

#[derive(Debug, Serialize)]
struct SmsPayload<'a> {
    phone: &'a str,
    code: &'a str,
    sign_name: &'a str,
}

impl SmsClient {
    pub fn from_config(mgr: &ConfigManager) -> Self {
        let provider_url = mgr.get::<String>("sms.provider_url").ok().filter(|u| !u.is_empty());
        let sign_name: String = mgr.get_or("sms.sign_name", "有趣实验室".to_string());
        Self {
            http: reqwest::Client::new(),
            provider_url,
            sign_name,
        }
    }

    pub fn is_configured(&self) -> bool {
        self.provider_url.is_some()
    }

    /// 发送验证码短信
    pub async fn send_verification_code(&self, phone: &str, code: &str) -> AppResult<()> {
        let Some(url) = &self.provider_url else {
            tracing::info!(phone = %phone, "短信服务未配置，跳过实际发送");
            return Ok(());
        };

        let payload = SmsPayload {
            phone,
            code,
            sign_name: &self.sign_name,
        };
        let resp = self
            .http
            .post(url)
            .json(&payload)
            .send()
            .await
            .map_err(|e| AppError::external_service("sms", format!("请求失败: {}", e)))?;
        if !resp.status().is_success() {
            return Err(AppError::external_service(
                "sms",
                format!("服务商返回状态 {}", resp.status()),
            ));
        }
        tracing::info!(phone = %phone, "短信验证码已发送");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::comm::config::{ConfigManager, ConfigSource};

    fn manager(content: &str) -> ConfigManager {
        ConfigManager::with_sources(vec![ConfigSource::String {
            content: content.to_string(),
            format: config::FileFormat::Toml,
        }])
        .unwrap()
    }

    #[tokio::test]
    async fn test_unconfigured_client_reports_success() {
        let client = SmsClient::from_config(&manager(""));
        assert!(!client.is_configured());
        assert!(client.send_verification_code("13800138000", "123456").await.is_ok());
    }

    #[test]
    fn test_configured_when_url_present() {
        let client = SmsClient::from_config(&manager(
            "[sms]\nprovider_url = \"http://localhost:9000/send\"\n",
        ));
        assert!(client.is_configured());
    }

    #[test]
    fn test_empty_url_counts_as_unconfigured() {
        let client = SmsClient::from_config(&manager("[sms]\nprovider_url = \"\"\n"));
        assert!(!client.is_configured());
    }
}
