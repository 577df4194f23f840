use sqlx::{Pool, Postgres};
use tracing::{info, warn};

use crate::auth::jwt::TokenPair;
use crate::auth::password::{hash_password, hash_refresh_token, verify_password, verify_refresh_token};
use crate::cache::keys;
use crate::comm::random;
use crate::email::verification_email;
use crate::error::{AppError, AppResult};
use crate::queue::EmailKind;
use crate::state::AppState;

use super::models::{RegisterByEmailDto, RegisterDto, SignUpFormData};

/// 邮箱/短信验证码有效期（分钟）
const CODE_EXPIRES_MINUTES: u32 = 15;
/// 注册表单暂存时长（秒）
const SIGNUP_FORM_TTL_SECS: u64 = 60 * 60;

pub async fn login(state: &AppState, email: &str, password: &str) -> AppResult<TokenPair> {
    let email = email.to_lowercase();
    let row: Option<(i64, String)> =
        sqlx::query_as("SELECT id, password FROM users WHERE email = $1")
            .bind(&email)
            .fetch_optional(&state.pool)
            .await?;
    let (user_id, hashed) =
        row.ok_or_else(|| AppError::not_found(format!("用户(email: {})", email)))?;

    if !verify_password(password, &hashed)? {
        return Err(AppError::auth("Invalid password"));
    }

    issue_for(state, user_id).await
}

/// 清除刷新令牌哈希，幂等
pub async fn logout(state: &AppState, user_id: i64) -> AppResult<bool> {
    sqlx::query("UPDATE users SET hashed_rt = NULL, updated_at = now() WHERE id = $1 AND hashed_rt IS NOT NULL")
        .bind(user_id)
        .execute(&state.pool)
        .await?;
    Ok(true)
}

pub async fn refresh(state: &AppState, token: &str) -> AppResult<TokenPair> {
    let claims = state.tokens.verify_refresh(token)?;
    let row: Option<(Option<String>,)> =
        sqlx::query_as("SELECT hashed_rt FROM users WHERE id = $1")
            .bind(claims.user_id)
            .fetch_optional(&state.pool)
            .await?;
    let stored = row.ok_or_else(|| AppError::auth("刷新令牌已失效"))?.0;

    if !refresh_hash_matches(token, stored.as_deref())? {
        return Err(AppError::auth("刷新令牌已失效"));
    }

    issue_for(state, claims.user_id).await
}

pub async fn register(state: &AppState, dto: &RegisterDto) -> AppResult<TokenPair> {
    let email = dto.email.to_lowercase();
    ensure_email_unused(&state.pool, &email).await?;
    ensure_phone_unused(&state.pool, &dto.phone_number).await?;

    let user_id = create_user(
        &state.pool,
        NewUser {
            email: &email,
            password: &dto.password,
            username: &dto.username,
            phone_number: Some(&dto.phone_number),
            first_name: dto.first_name.as_deref(),
            last_name: dto.last_name.as_deref(),
            mini_wechat_id: None,
        },
    )
    .await?;

    issue_for(state, user_id).await
}

/// 邮箱验证码注册：先比对验证码，再走注册流程
pub async fn register_by_email(state: &AppState, dto: &RegisterByEmailDto) -> AppResult<TokenPair> {
    if !state.redis.compare_token(&dto.token, &dto.code).await? {
        return Err(AppError::auth("邮箱验证码错误或已过期"));
    }

    let email = dto.email.to_lowercase();
    ensure_email_unused(&state.pool, &email).await?;
    ensure_phone_unused(&state.pool, &dto.phone_number).await?;

    let user_id = create_user(
        &state.pool,
        NewUser {
            email: &email,
            password: &dto.password,
            username: &email,
            phone_number: Some(&dto.phone_number),
            first_name: Some(&dto.first_name),
            last_name: Some(&dto.last_name),
            mini_wechat_id: None,
        },
    )
    .await?;

    issue_for(state, user_id).await
}

/// 注册表单预校验：验证图形验证码，通过后暂存表单并下发短信验证码
pub async fn validate_captcha(state: &AppState, form: &SignUpFormData) -> AppResult<bool> {
    let is_valid =
        crate::modules::captcha::service::validate(&state.redis, &form.captcha_token, &form.captcha)
            .await?;
    if !is_valid {
        return Ok(false);
    }

    let key = format!("userRegistration:{}", form.phone_number);
    state
        .redis
        .set_ex(&key, &serde_json::to_string(form).map_err(|e| AppError::Internal(e.into()))?, SIGNUP_FORM_TTL_SECS)
        .await?;

    // 短信下发失败不阻塞表单校验结果
    if let Err(e) = send_sms_code(state, &form.phone_number).await {
        warn!("短信验证码下发失败: {}", e);
    }

    Ok(true)
}

/// 下发邮箱验证码（经邮件队列），返回验证 token
pub async fn send_email_code(state: &AppState, email: &str) -> AppResult<String> {
    let code = random::hex(3);
    let token = keys::email_verification(email, &random::hex(8));
    let ttl = u64::from(CODE_EXPIRES_MINUTES) * 60;

    state.redis.set_ex(&token, &code, ttl).await?;
    // 重发窗口内复用同一验证码
    state.redis.set_ex(&keys::email_refresh(email), &code, ttl).await?;

    let message = verification_email(email, &code, CODE_EXPIRES_MINUTES);
    let message_id = state.email.publish(EmailKind::Verification, message).await?;
    info!("邮箱验证码已入队: email={} message_id={}", email, message_id);

    Ok(token)
}

/// 下发短信验证码，返回验证 token（即 Redis key）
pub async fn send_sms_code(state: &AppState, phone: &str) -> AppResult<String> {
    let code = random::hex(3);
    state.sms.send_verification_code(phone, &code).await?;

    let key = keys::sms_verification(phone, &random::hex(8));
    state
        .redis
        .set_ex(&key, &code, u64::from(CODE_EXPIRES_MINUTES) * 60)
        .await?;
    Ok(key)
}

pub async fn validate_sms_code(state: &AppState, token: &str, code: &str) -> AppResult<bool> {
    state.redis.compare_token(token, code).await
}

/// 小程序登录：openid 换取用户，不存在则按 openid 建档
pub async fn miniprogram_login(state: &AppState, js_code: &str) -> AppResult<TokenPair> {
    let session = state.wechat.code_to_session(js_code).await?;

    let existing: Option<(i64,)> =
        sqlx::query_as("SELECT id FROM users WHERE mini_wechat_id = $1")
            .bind(&session.openid)
            .fetch_optional(&state.pool)
            .await?;

    let user_id = match existing {
        Some((id,)) => id,
        None => {
            let email = miniprogram_email(&session.openid);
            create_user(
                &state.pool,
                NewUser {
                    email: &email,
                    password: &random::hex(16),
                    username: &miniprogram_username(&session.openid),
                    phone_number: None,
                    first_name: None,
                    last_name: None,
                    mini_wechat_id: Some(&session.openid),
                },
            )
            .await?
        }
    };

    issue_for(state, user_id).await
}

struct NewUser<'a> {
    email: &'a str,
    password: &'a str,
    username: &'a str,
    phone_number: Option<&'a str>,
    first_name: Option<&'a str>,
    last_name: Option<&'a str>,
    mini_wechat_id: Option<&'a str>,
}

/// 建档并关联默认角色，单事务
async fn create_user(pool: &Pool<Postgres>, user: NewUser<'_>) -> AppResult<i64> {
    let default_role: Option<(i64,)> = sqlx::query_as("SELECT id FROM roles WHERE name = 'User'")
        .fetch_optional(pool)
        .await?;
    let (role_id,) = default_role
        .ok_or_else(|| AppError::Internal(anyhow::anyhow!("Default role does not exist")))?;

    let hashed = hash_password(user.password)?;

    let mut tx = pool.begin().await?;
    let (user_id,): (i64,) = sqlx::query_as(
        r#"
        INSERT INTO users
            (email, password, username, status, gender, department_id,
             phone_number, first_name, last_name, mini_wechat_id)
        VALUES ($1, $2, $3, '1', '1', 1, $4, $5, $6, $7)
        RETURNING id
        "#,
    )
    .bind(user.email)
    .bind(&hashed)
    .bind(user.username)
    .bind(user.phone_number)
    .bind(user.first_name)
    .bind(user.last_name)
    .bind(user.mini_wechat_id)
    .fetch_one(&mut *tx)
    .await?;

    sqlx::query("INSERT INTO user_roles (user_id, role_id) VALUES ($1, $2)")
        .bind(user_id)
        .bind(role_id)
        .execute(&mut *tx)
        .await?;
    tx.commit().await?;

    Ok(user_id)
}

async fn ensure_email_unused(pool: &Pool<Postgres>, email: &str) -> AppResult<()> {
    let exists: Option<(i64,)> = sqlx::query_as("SELECT id FROM users WHERE email = $1")
        .bind(email)
        .fetch_optional(pool)
        .await?;
    if exists.is_some() {
        return Err(AppError::conflict("Email already in use"));
    }
    Ok(())
}

async fn ensure_phone_unused(pool: &Pool<Postgres>, phone: &str) -> AppResult<()> {
    if phone.is_empty() {
        return Ok(());
    }
    let exists: Option<(i64,)> = sqlx::query_as("SELECT id FROM users WHERE phone_number = $1")
        .bind(phone)
        .fetch_optional(pool)
        .await?;
    if exists.is_some() {
        return Err(AppError::conflict("Phone number already in use"));
    }
    Ok(())
}

/// 签发令牌对并落库刷新令牌哈希（单槽轮换）
pub async fn issue_for(state: &AppState, user_id: i64) -> AppResult<TokenPair> {
    let pair = state.tokens.issue_pair(user_id)?;
    let hash = hash_refresh_token(&pair.refresh_token)?;
    sqlx::query("UPDATE users SET hashed_rt = $1, updated_at = now() WHERE id = $2")
        .bind(&hash)
        .bind(user_id)
        .execute(&state.pool)
        .await?;
    Ok(pair)
}

/// 刷新令牌与存储哈希比对，存储为空视为已注销
fn refresh_hash_matches(token: &str, stored: Option<&str>) -> AppResult<bool> {
    match stored {
        Some(hash) => verify_refresh_token(token, hash),
        None => Ok(false),
    }
}

fn miniprogram_email(openid: &str) -> String {
    format!("{}@miniprogram.local", openid.to_lowercase())
}

fn miniprogram_username(openid: &str) -> String {
    let prefix: String = openid.chars().take(8).collect();
    format!("wx_{}", prefix)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mismatched_refresh_hash_rejected() {
        let issued = "header.payload.signature-issued";
        let other = "header.payload.signature-other";
        let stored = hash_refresh_token(issued).unwrap();

        assert!(refresh_hash_matches(issued, Some(&stored)).unwrap());
        assert!(!refresh_hash_matches(other, Some(&stored)).unwrap());
    }

    #[test]
    fn test_logged_out_user_has_no_valid_refresh() {
        assert!(!refresh_hash_matches("any.token.value", None).unwrap());
    }

    #[test]
    fn test_miniprogram_identity_shapes() {
        let openid = "oABC1234567890xyz";
        assert_eq!(miniprogram_email(openid), "oabc1234567890xyz@miniprogram.local");
        assert_eq!(miniprogram_username(openid), "wx_oABC1234");
        // 短 openid 不越界
        assert_eq!(miniprogram_username("oA"), "wx_oA");
    }
}
