use lazy_static::lazy_static;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use validator::Validate;

lazy_static! {
    /// 大陆手机号
    static ref PHONE_RE: regex::Regex = regex::Regex::new(r"^1[3-9]\d{9}$").unwrap();
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct LoginDto {
    #[validate(email(message = "请输入有效的邮箱地址"))]
    pub email: String,
    #[validate(length(min = 6, message = "密码至少 6 位"))]
    pub password: String,
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct RegisterDto {
    #[validate(length(min = 1, message = "用户名不能为空"))]
    pub username: String,
    #[validate(email(message = "请输入有效的邮箱地址"))]
    pub email: String,
    #[validate(length(min = 6, message = "密码至少 6 位"))]
    pub password: String,
    pub country: Option<String>,
    #[validate(regex(path = *PHONE_RE, message = "Please enter a valid phone number"))]
    pub phone_number: String,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct RegisterByEmailDto {
    /// 邮箱验证 token（即验证码的 Redis key）
    #[validate(length(min = 1))]
    pub token: String,
    /// 邮箱验证码
    #[validate(length(min = 1))]
    pub code: String,
    #[validate(email(message = "请输入有效的邮箱地址"))]
    pub email: String,
    #[validate(length(min = 6, message = "密码至少 6 位"))]
    pub password: String,
    #[validate(length(min = 1))]
    pub first_name: String,
    #[validate(length(min = 1))]
    pub last_name: String,
    #[validate(length(min = 1))]
    pub country: String,
    #[validate(regex(path = *PHONE_RE, message = "Please enter a valid phone number"))]
    pub phone_number: String,
}

/// 注册表单预校验请求，校验通过后整体暂存 Redis
#[derive(Debug, Clone, Serialize, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct SignUpFormData {
    #[validate(length(min = 1))]
    pub first_name: String,
    #[validate(length(min = 1))]
    pub last_name: String,
    #[validate(email(message = "请输入有效的邮箱地址"))]
    pub email: String,
    #[validate(length(min = 6, message = "密码至少 6 位"))]
    pub password: String,
    #[validate(length(min = 1))]
    pub confirm_password: String,
    #[validate(length(min = 1))]
    pub country: String,
    #[validate(regex(path = *PHONE_RE, message = "Please enter a valid phone number"))]
    pub phone_number: String,
    #[validate(length(min = 1))]
    pub captcha: String,
    #[validate(length(min = 1))]
    pub captcha_token: String,
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct RefreshTokenDto {
    #[validate(length(min = 1, message = "刷新令牌不能为空"))]
    pub refresh_token: String,
}

/// 验证码校验请求（短信）
#[derive(Debug, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ValidateTokenDto {
    #[validate(length(min = 1))]
    pub token: String,
    #[validate(length(min = 1))]
    pub code: String,
    #[validate(length(min = 1))]
    pub phone: String,
}

/// 发送邮箱验证码请求
#[derive(Debug, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct SendEmailCodeDto {
    #[validate(email(message = "请输入有效的邮箱地址"))]
    pub email: String,
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct MiniProgramLoginDto {
    /// wx.login 获取的临时凭证
    #[validate(length(min = 1, message = "code 不能为空"))]
    pub code: String,
}

#[derive(Debug, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct QrcodeQuery {
    pub scene: String,
    pub page: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_phone_pattern() {
        assert!(PHONE_RE.is_match("13812345678"));
        assert!(PHONE_RE.is_match("19900001111"));
        assert!(!PHONE_RE.is_match("12812345678"));
        assert!(!PHONE_RE.is_match("1381234567"));
        assert!(!PHONE_RE.is_match("138123456789"));
    }

    #[test]
    fn test_login_dto_validation() {
        let ok = LoginDto {
            email: "a@b.com".to_string(),
            password: "secret1".to_string(),
        };
        assert!(ok.validate().is_ok());

        let bad_email = LoginDto {
            email: "not-an-email".to_string(),
            password: "secret1".to_string(),
        };
        assert!(bad_email.validate().is_err());

        let short_password = LoginDto {
            email: "a@b.com".to_string(),
            password: "12345".to_string(),
        };
        assert!(short_password.validate().is_err());
    }

    #[test]
    fn test_register_dto_rejects_bad_phone() {
        let dto = RegisterDto {
            username: "张三".to_string(),
            email: "zhang@example.com".to_string(),
            password: "secret1".to_string(),
            country: None,
            phone_number: "911".to_string(),
            first_name: None,
            last_name: None,
        };
        assert!(dto.validate().is_err());
    }

    #[test]
    fn test_signup_form_roundtrips_camel_case() {
        let json = serde_json::json!({
            "firstName": "San",
            "lastName": "Zhang",
            "email": "zhang@example.com",
            "password": "secret1",
            "confirmPassword": "secret1",
            "country": "CN",
            "phoneNumber": "13812345678",
            "captcha": "ab3d",
            "captchaToken": "captcha_1700000000000_deadbeefdeadbeef"
        });
        let form: SignUpFormData = serde_json::from_value(json.clone()).unwrap();
        assert!(form.validate().is_ok());
        let back = serde_json::to_value(&form).unwrap();
        assert_eq!(back["phoneNumber"], json["phoneNumber"]);
        assert_eq!(back["captchaToken"], json["captchaToken"]);
    }
}
