//! 微信小程序接口
//!
//! 覆盖 code 换 session、服务端 access_token 与小程序码生成。
//! 微信侧错误以 HTTP 200 携带 errcode 返回，需要逐个判断。

use serde::{Deserialize, Serialize};

use crate::comm::config::ConfigManager;
use crate::error::{AppError, AppResult};

const DEFAULT_BASE_URL: &str = "https://api.weixin.qq.com";

#[derive(Clone)]
pub struct WechatClient {
    http: reqwest::Client,
    base_url: String,
    app_id: String,
    app_secret: String,
}

/// jscode2session 的原始应答
#[derive(Debug, Deserialize)]
pub struct CodeSessionResponse {
    pub openid: Option<String>,
    pub session_key: Option<String>,
    pub unionid: Option<String>,
    pub errcode: Option<i64>,
    pub errmsg: Option<String>,
}

/// 校验通过后的会话信息
#[derive(Debug, Clone, Serialize)]
pub struct WechatSession {
    pub openid: String,
    pub session_key: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub unionid: Option<String>,
}

#[derive(Debug, Deserialize)]
struct AccessTokenResponse {
    access_token: Option<String>,
    errcode: Option<i64>,
    errmsg: Option<String>,
}

#[derive(Debug, Serialize)]
struct QrCodeRequest<'a> {
    scene: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    page: Option<&'a str>,
    width: u32,
}

impl WechatClient {
    pub fn from_config(mgr: &ConfigManager) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: DEFAULT_BASE_URL.to_string(),
            app_id: mgr.get_or("wechat.app_id", String::new()),
            app_secret: mgr.get_or("wechat.app_secret", String::new()),
        }
    }

    #[cfg(test)]
    fn with_base_url(app_id: &str, app_secret: &str, base_url: &str) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: base_url.to_string(),
            app_id: app_id.to_string(),
            app_secret: app_secret.to_string(),
        }
    }

    pub fn is_configured(&self) -> bool {
        !self.app_id.is_empty() && !self.app_secret.is_empty()
    }

    fn ensure_configured(&self) -> AppResult<()> {
        if self.is_configured() {
            Ok(())
        } else {
            Err(AppError::external_service("wechat", "小程序凭证未配置"))
        }
    }

    /// 以登录 code 换取 openid 与 session_key
    pub async fn code_to_session(&self, js_code: &str) -> AppResult<WechatSession> {
        self.ensure_configured()?;
        let url = format!(
            "{}/sns/jscode2session?appid={}&secret={}&js_code={}&grant_type=authorization_code",
            self.base_url,
            self.app_id,
            self.app_secret,
            urlencoding::encode(js_code)
        );
        let resp: CodeSessionResponse = self
            .http
            .get(&url)
            .send()
            .await
            .map_err(|e| AppError::external_service("wechat", format!("请求失败: {}", e)))?
            .json()
            .await
            .map_err(|e| AppError::external_service("wechat", format!("应答解析失败: {}", e)))?;
        session_from_response(resp)
    }

    /// 获取服务端调用凭证
    pub async fn get_access_token(&self) -> AppResult<String> {
        self.ensure_configured()?;
        let url = format!(
            "{}/cgi-bin/token?grant_type=client_credential&appid={}&secret={}",
            self.base_url, self.app_id, self.app_secret
        );
        let resp: AccessTokenResponse = self
            .http
            .get(&url)
            .send()
            .await
            .map_err(|e| AppError::external_service("wechat", format!("请求失败: {}", e)))?
            .json()
            .await
            .map_err(|e| AppError::external_service("wechat", format!("应答解析失败: {}", e)))?;
        if let Some(code) = resp.errcode.filter(|c| *c != 0) {
            return Err(AppError::external_service(
                "wechat",
                format!(
                    "获取 access_token 失败 ({}): {}",
                    code,
                    resp.errmsg.unwrap_or_default()
                ),
            ));
        }
        resp.access_token
            .ok_or_else(|| AppError::external_service("wechat", "应答缺少 access_token"))
    }

    /// 生成不限量小程序码，返回图片字节
    pub async fn get_unlimited_qrcode(&self, scene: &str, page: Option<&str>) -> AppResult<Vec<u8>> {
        let token = self.get_access_token().await?;
        let url = format!("{}/wxa/getwxacodeunlimit?access_token={}", self.base_url, token);
        let body = QrCodeRequest {
            scene,
            page,
            width: 430,
        };
        let bytes = self
            .http
            .post(&url)
            .json(&body)
            .send()
            .await
            .map_err(|e| AppError::external_service("wechat", format!("请求失败: {}", e)))?
            .bytes()
            .await
            .map_err(|e| AppError::external_service("wechat", format!("读取应答失败: {}", e)))?;
        // 失败时微信返回 JSON 而不是图片
        if let Some((code, msg)) = parse_wechat_error(&bytes) {
            return Err(AppError::external_service(
                "wechat",
                format!("生成小程序码失败 ({}): {}", code, msg),
            ));
        }
        Ok(bytes.to_vec())
    }
}

fn session_from_response(resp: CodeSessionResponse) -> AppResult<WechatSession> {
    if let Some(code) = resp.errcode.filter(|c| *c != 0) {
        return Err(AppError::external_service(
            "wechat",
            format!("登录失败 ({}): {}", code, resp.errmsg.unwrap_or_default()),
        ));
    }
    match (resp.openid, resp.session_key) {
        (Some(openid), Some(session_key)) => Ok(WechatSession {
            openid,
            session_key,
            unionid: resp.unionid,
        }),
        _ => Err(AppError::external_service("wechat", "应答缺少 openid")),
    }
}

/// 判断应答字节是否为微信错误 JSON
fn parse_wechat_error(bytes: &[u8]) -> Option<(i64, String)> {
    #[derive(Deserialize)]
    struct ErrBody {
        errcode: i64,
        #[serde(default)]
        errmsg: String,
    }
    if !bytes.starts_with(b"{") {
        return None;
    }
    let body: ErrBody = serde_json::from_slice(bytes).ok()?;
    if body.errcode == 0 {
        return None;
    }
    Some((body.errcode, body.errmsg))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_session_parsed_from_success_payload() {
        let resp: CodeSessionResponse = serde_json::from_str(
            r#"{"openid": "oX1", "session_key": "sk==", "unionid": "u1"}"#,
        )
        .unwrap();
        let session = session_from_response(resp).unwrap();
        assert_eq!(session.openid, "oX1");
        assert_eq!(session.unionid.as_deref(), Some("u1"));
    }

    #[test]
    fn test_session_rejects_errcode_payload() {
        let resp: CodeSessionResponse =
            serde_json::from_str(r#"{"errcode": 40029, "errmsg": "invalid code"}"#).unwrap();
        let err = session_from_response(resp).unwrap_err();
        assert!(err.to_string().contains("40029"));
    }

    #[test]
    fn test_qrcode_error_detection() {
        let json = br#"{"errcode": 41030, "errmsg": "invalid page"}"#;
        assert_eq!(
            parse_wechat_error(json),
            Some((41030, "invalid page".to_string()))
        );
        let png_magic = [0x89u8, 0x50, 0x4e, 0x47, 0x0d, 0x0a, 0x1a, 0x0a];
        assert_eq!(parse_wechat_error(&png_magic), None);
    }

    #[test]
    fn test_unconfigured_client_rejected() {
        let client = WechatClient::with_base_url("", "", "http://localhost");
        assert!(client.ensure_configured().is_err());
    }
}
