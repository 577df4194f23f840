use actix_web::{middleware::Logger, web, App, HttpServer};
use lapin::Connection;
use tokio::time::{sleep, timeout, Duration};
use tracing::{error, info, instrument, warn};
use tracing_bunyan_formatter::{BunyanFormattingLayer, JsonStorageLayer};
use tracing_subscriber::{layer::SubscriberExt, EnvFilter, Registry};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use crate::auth::TokenIssuer;
use crate::cache::RedisCache;
use crate::comm::config::{get_global_config_manager, ConfigManager};
use crate::comm::port::{available_port, is_port_available_sync};
use crate::db;
use crate::email::Mailer;
use crate::error::{AppError, AppResult};
use crate::geo::GeoClient;
use crate::middleware::system_log::SystemLogMiddleware;
use crate::modules::system_log::worker as system_log_worker;
use crate::monitoring;
use crate::queue::{self, EmailConsumer, EmailKind, EmailProducer};
use crate::route_registry::configure_global_routes;
use crate::sms::SmsClient;
use crate::state::AppState;
use crate::storage::ObjectStorage;
use crate::wechat::WechatClient;

/// 应用配置结构体
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub host: String,
    pub port: u16,
    pub workers: Option<usize>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 3000,
            workers: Some(8),
        }
    }
}

/// 应用启动器
pub struct AppBootstrap {
    config: Option<AppConfig>,
}

impl AppBootstrap {
    pub fn new() -> Self {
        Self { config: None }
    }

    pub fn with_config(mut self, config: AppConfig) -> Self {
        self.config = Some(config);
        self
    }

    /// 运行应用服务器
    #[instrument(skip(self))]
    pub async fn run(self) -> AppResult<()> {
        let mgr = get_global_config_manager().map_err(AppError::Internal)?;
        // 未显式给出配置时退回 server.* 配置段
        let config = match self.config.clone() {
            Some(config) => config,
            None => AppConfig {
                host: mgr.get_or("server.host", "0.0.0.0".to_string()),
                port: mgr.get_or("server.port", 3000u16),
                workers: Some(mgr.get_or("server.workers", 8usize)),
            },
        };
        init_tracing(&mgr);
        info!("启动应用服务器，配置: {:?}", config);

        monitoring::init();

        // 基础设施（数据库、Redis、RabbitMQ、对象存储）带重试初始化
        let (state, amqp) = self.init_state_with_retry(&mgr).await?;

        // 邮件消费者，验证类与通知类各占一条通道
        let mailer = Mailer::from_config(&mgr)?;
        for kind in [EmailKind::Verification, EmailKind::Notification] {
            let channel = amqp
                .create_channel()
                .await
                .map_err(|e| AppError::queue(e.to_string()))?;
            let consumer = EmailConsumer::new(channel, state.email.clone(), mailer.clone(), kind);
            tokio::spawn(async move {
                if let Err(e) = consumer.run().await {
                    error!(error = %e, "邮件消费者退出");
                }
            });
        }

        // 访问日志落库与地理信息补全
        let log_tx =
            system_log_worker::spawn(state.pool.clone(), state.redis.clone(), GeoClient::new());

        let server_port = if is_port_available_sync(config.port) {
            config.port
        } else {
            warn!("端口 {} 不可用，正在寻找可用端口...", config.port);
            available_port(config.port)
        };
        info!("服务器将在端口 {} 上启动", server_port);

        let data = web::Data::new(state);
        let mut server = HttpServer::new(move || {
            App::new()
                .wrap(Logger::default())
                .wrap(SystemLogMiddleware::new(log_tx.clone()))
                .app_data(data.clone())
                .service(SwaggerUi::new("/swagger-ui/{_:.*}").url(
                    "/api-doc/openapi.json",
                    crate::api::swagger::ApiDoc::openapi(),
                ))
                .configure(configure_global_routes)
        });
        if let Some(workers) = config.workers {
            server = server.workers(workers);
        }

        server
            .bind(format!("{}:{}", config.host, server_port))
            .map_err(|e| AppError::Internal(anyhow::Error::new(e)))?
            .run()
            .await
            .map_err(|e| AppError::Internal(anyhow::Error::new(e)))?;
        Ok(())
    }

    /// 带重试机制的基础设施初始化
    async fn init_state_with_retry(
        &self,
        mgr: &ConfigManager,
    ) -> AppResult<(AppState, Connection)> {
        const MAX_RETRIES: u32 = 3;
        const TIMEOUT_DURATION: Duration = Duration::from_secs(30);

        for attempt in 1..=MAX_RETRIES {
            info!("基础设施初始化尝试 {}/{}", attempt, MAX_RETRIES);

            match timeout(TIMEOUT_DURATION, init_state(mgr)).await {
                Ok(Ok(ready)) => {
                    info!("基础设施初始化成功");
                    return Ok(ready);
                }
                Ok(Err(e)) => {
                    warn!("基础设施初始化失败 (尝试 {}): {}", attempt, e);
                    if attempt == MAX_RETRIES {
                        return Err(e);
                    }
                }
                Err(_) => {
                    warn!("基础设施初始化超时 (尝试 {})", attempt);
                    if attempt == MAX_RETRIES {
                        return Err(AppError::Internal(anyhow::anyhow!("基础设施初始化超时")));
                    }
                }
            }

            let delay = Duration::from_millis(1000 * 2_u64.pow(attempt - 1));
            info!("等待 {:?} 后重试", delay);
            sleep(delay).await;
        }

        unreachable!()
    }
}

impl Default for AppBootstrap {
    fn default() -> Self {
        Self::new()
    }
}

/// Bunyan JSON 日志，RUST_LOG 控制级别
fn init_tracing(mgr: &ConfigManager) {
    let level = mgr.get_or("logging.level", "info".to_string());
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    let formatting_layer = BunyanFormattingLayer::new("youqu-admin".into(), std::io::stdout);
    let subscriber = Registry::default()
        .with(env_filter)
        .with(JsonStorageLayer)
        .with(formatting_layer);
    tracing::subscriber::set_global_default(subscriber).expect("Failed to set subscriber");
}

/// 建立全部外部连接并迁移数据库
async fn init_state(mgr: &ConfigManager) -> AppResult<(AppState, Connection)> {
    let pool = db::get_pool("default").await?;
    db::check_health(&pool).await?;
    sqlx::migrate!("./migrations")
        .run(&pool)
        .await
        .map_err(|e| AppError::database(format!("数据库迁移失败: {}", e)))?;

    let redis = RedisCache::from_config(mgr).await?;
    let tokens = TokenIssuer::from_config(mgr)?;

    let amqp = queue::connect(mgr).await?;
    let channel = amqp
        .create_channel()
        .await
        .map_err(|e| AppError::queue(e.to_string()))?;
    queue::declare_topology(&channel).await?;
    let email = EmailProducer::new(channel);

    let storage = ObjectStorage::from_config(mgr);
    storage.ensure_bucket().await;

    let state = AppState {
        pool,
        redis,
        tokens,
        email,
        storage,
        wechat: WechatClient::from_config(mgr),
        sms: SmsClient::from_config(mgr),
    };
    Ok((state, amqp))
}
