use lettre::message::header::ContentType;
use lettre::message::{Mailbox, MultiPart};
use lettre::transport::smtp::authentication::Credentials;
use lettre::{AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};
use serde::{Deserialize, Serialize};

use crate::comm::config::ConfigManager;
use crate::error::{AppError, AppResult};

/// 邮件内容，亦为队列消息的 data 字段
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EmailMessage {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub from: Option<String>,
    pub to: String,
    pub subject: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub html: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message_id: Option<String>,
}

/// 构建邮箱验证码邮件
pub fn verification_email(to: &str, code: &str, expires_minutes: u32) -> EmailMessage {
    let html = format!(
        r#"<div style="font-family: Arial, sans-serif; color: #333;">
  <h2 style="color: #4F8A10;">验证您的邮箱</h2>
  <p>您好，</p>
  <p>您正在访问<strong>有趣实验室项目后台管理系统</strong>。</p>
  <p>为了完成注册，请使用以下验证码：</p>
  <p style="font-size: 20px; color: #0000FF; font-weight: bold;">{code}</p>
  <p>请注意，该验证码将在 <strong>{expires_minutes}</strong> 分钟后失效。如果您没有请求此验证码，请忽略此邮件。</p>
  <p style="margin-top: 20px;">此致<br>有趣实验室团队</p>
</div>"#
    );
    let text = format!(
        "您正在访问有趣实验室项目后台管理系统。为了完成注册，请使用以下验证码：{code}。\
         该验证码将在{expires_minutes}分钟后失效。如果您没有请求此验证码，请忽略此邮件。"
    );
    EmailMessage {
        from: None,
        to: to.to_string(),
        subject: "邮箱验证 - 有趣实验室项目后台管理系统".to_string(),
        text: Some(text),
        html: Some(html),
        message_id: None,
    }
}

/// SMTP 邮件发送器
#[derive(Clone)]
pub struct Mailer {
    transport: AsyncSmtpTransport<Tokio1Executor>,
    default_from: String,
}

impl Mailer {
    /// 从配置构建，读取 `smtp.{host,port,user,pass,from,ssl}`
    pub fn from_config(mgr: &ConfigManager) -> AppResult<Self> {
        let host: String = mgr.get_or("smtp.host", "smtp.gmail.com".to_string());
        let user: String = mgr.get_safe("smtp.user")?;
        let pass: String = mgr.get_safe("smtp.pass")?;
        let from: String = mgr.get_or("smtp.from", user.clone());
        let ssl: bool = mgr.get_or("smtp.ssl", false);
        let port: i64 = mgr.get_or("smtp.port", if ssl { 465 } else { 587 });

        let builder = if ssl {
            AsyncSmtpTransport::<Tokio1Executor>::relay(&host)
        } else {
            AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&host)
        }
        .map_err(|e| AppError::external_service("smtp", e.to_string()))?;

        let transport = builder
            .port(port as u16)
            .credentials(Credentials::new(user, pass))
            .build();
        Ok(Self {
            transport,
            default_from: from,
        })
    }

    /// 发送一封邮件，发件人缺省时使用配置的默认地址
    pub async fn send(&self, msg: &EmailMessage) -> AppResult<()> {
        let from = msg.from.as_deref().unwrap_or(&self.default_from);
        let message = build_message(from, msg)?;
        self.transport
            .send(message)
            .await
            .map(|_| ())
            .map_err(|e| AppError::external_service("smtp", e.to_string()))
    }
}

fn build_message(from: &str, msg: &EmailMessage) -> AppResult<Message> {
    let from_mbox: Mailbox = from
        .parse()
        .map_err(|_| AppError::validation("from", format!("无效的发件人地址: {}", from)))?;
    let to_mbox: Mailbox = msg
        .to
        .parse()
        .map_err(|_| AppError::validation("to", format!("无效的收件人地址: {}", msg.to)))?;

    let builder = Message::builder()
        .from(from_mbox)
        .to(to_mbox)
        .subject(&msg.subject);

    let message = match (&msg.text, &msg.html) {
        (Some(text), Some(html)) => builder.multipart(MultiPart::alternative_plain_html(
            text.clone(),
            html.clone(),
        )),
        (None, Some(html)) => builder
            .header(ContentType::TEXT_HTML)
            .body(html.clone()),
        (Some(text), None) => builder
            .header(ContentType::TEXT_PLAIN)
            .body(text.clone()),
        (None, None) => builder
            .header(ContentType::TEXT_PLAIN)
            .body(String::new()),
    }
    .map_err(|e| AppError::validation("body", e.to_string()))?;
    Ok(message)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_verification_email_contains_code() {
        let msg = verification_email("user@example.com", "a1b2c3", 15);
        assert_eq!(msg.to, "user@example.com");
        assert!(msg.subject.contains("邮箱验证"));
        assert!(msg.html.as_deref().unwrap().contains("a1b2c3"));
        assert!(msg.text.as_deref().unwrap().contains("15"));
    }

    #[test]
    fn test_build_message_rejects_bad_address() {
        let msg = EmailMessage {
            from: None,
            to: "not-an-address".to_string(),
            subject: "s".to_string(),
            text: Some("t".to_string()),
            html: None,
            message_id: None,
        };
        assert!(build_message("noreply@example.com", &msg).is_err());
    }

    #[test]
    fn test_build_message_multipart() {
        let msg = EmailMessage {
            from: None,
            to: "user@example.com".to_string(),
            subject: "hello".to_string(),
            text: Some("plain".to_string()),
            html: Some("<b>rich</b>".to_string()),
            message_id: None,
        };
        let message = build_message("noreply@example.com", &msg).unwrap();
        let raw = String::from_utf8(message.formatted()).unwrap();
        assert!(raw.contains("multipart/alternative"));
    }

    #[test]
    fn test_message_serde_camel_case() {
        let msg = EmailMessage {
            from: None,
            to: "user@example.com".to_string(),
            subject: "s".to_string(),
            text: None,
            html: None,
            message_id: Some("abc".to_string()),
        };
        let value = serde_json::to_value(&msg).unwrap();
        assert_eq!(value["messageId"], "abc");
        assert!(value.get("from").is_none());
    }
}
