use sqlx::{Pool, Postgres};

use crate::auth::TokenIssuer;
use crate::cache::RedisCache;
use crate::queue::EmailProducer;
use crate::sms::SmsClient;
use crate::storage::ObjectStorage;
use crate::wechat::WechatClient;

/// 应用共享状态，经 `web::Data` 注入各处理函数
pub struct AppState {
    pub pool: Pool<Postgres>,
    pub redis: RedisCache,
    pub tokens: TokenIssuer,
    pub email: EmailProducer,
    pub storage: ObjectStorage,
    pub wechat: WechatClient,
    pub sms: SmsClient,
}
