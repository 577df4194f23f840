use std::time::Duration;

use futures_util::StreamExt;
use lapin::options::{
    BasicAckOptions, BasicConsumeOptions, BasicPublishOptions, BasicQosOptions,
    ExchangeDeclareOptions, QueueBindOptions, QueueDeclareOptions,
};
use lapin::types::{AMQPValue, FieldTable};
use lapin::{BasicProperties, Channel, Connection, ConnectionProperties, ExchangeKind};
use serde::{Deserialize, Serialize};

use crate::comm::config::ConfigManager;
use crate::email::{EmailMessage, Mailer};
use crate::error::{AppError, AppResult};
use crate::monitoring;

pub const EXCHANGE_EMAIL_DIRECT: &str = "email.direct";
pub const EXCHANGE_EMAIL_DLX: &str = "email.dlx";
pub const QUEUE_EMAIL_VERIFICATION: &str = "email.verification";
pub const QUEUE_EMAIL_NOTIFICATION: &str = "email.notification";
pub const QUEUE_EMAIL_FAILED: &str = "email.failed";
pub const ROUTING_EMAIL_DLX: &str = "email.dlx";

/// 队列中消息的存活时间（15分钟）
pub const MESSAGE_TTL_MS: i64 = 15 * 60 * 1000;

/// 邮件类别，同时决定路由键与指标标签
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EmailKind {
    Verification,
    Notification,
}

impl EmailKind {
    pub fn routing_key(&self) -> &'static str {
        match self {
            EmailKind::Verification => QUEUE_EMAIL_VERIFICATION,
            EmailKind::Notification => QUEUE_EMAIL_NOTIFICATION,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            EmailKind::Verification => "verification",
            EmailKind::Notification => "notification",
        }
    }
}

/// 重试策略
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    pub max_retries: u32,
    pub retry_intervals: Vec<Duration>,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            retry_intervals: vec![
                Duration::from_secs(30),
                Duration::from_secs(120),
                Duration::from_secs(300),
            ],
        }
    }
}

/// 失败后的处理决策
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryDecision {
    Retry { delay: Duration },
    DeadLetter,
}

impl RetryPolicy {
    /// 根据已失败次数决定重试或进入死信
    ///
    /// `failed_attempts` 为包含本次在内的累计失败次数。
    pub fn decide(&self, failed_attempts: u32) -> RetryDecision {
        if failed_attempts >= self.max_retries {
            return RetryDecision::DeadLetter;
        }
        let idx = failed_attempts.saturating_sub(1) as usize;
        let delay = self
            .retry_intervals
            .get(idx)
            .or_else(|| self.retry_intervals.last())
            .copied()
            .unwrap_or(Duration::from_secs(30));
        RetryDecision::Retry { delay }
    }
}

/// 队列消息封装
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueueMessage<T> {
    pub data: T,
    #[serde(default)]
    pub attempts: u32,
    pub timestamp: i64,
    pub message_id: String,
}

impl<T> QueueMessage<T> {
    pub fn new(data: T) -> Self {
        Self {
            data,
            attempts: 0,
            timestamp: chrono::Utc::now().timestamp_millis(),
            message_id: uuid::Uuid::new_v4().to_string(),
        }
    }

    /// 进入下一次尝试，累加失败计数
    pub fn next_attempt(mut self) -> Self {
        self.attempts += 1;
        self
    }
}

/// 死信消息，保留原始消息与最后一次错误
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeadLetterMessage<T> {
    pub original_message: QueueMessage<T>,
    pub error: DeadLetterError,
    pub failed_attempts: u32,
    pub last_attempt_at: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeadLetterError {
    pub message: String,
}

impl<T> DeadLetterMessage<T> {
    pub fn new(message: QueueMessage<T>, error: &str) -> Self {
        let failed_attempts = message.attempts;
        Self {
            original_message: message,
            error: DeadLetterError {
                message: error.to_string(),
            },
            failed_attempts,
            last_attempt_at: chrono::Utc::now().timestamp_millis(),
        }
    }
}

/// 建立 RabbitMQ 连接，读取 `amqp.url` 或 `amqp.{host,port,user,pass}`
pub async fn connect(mgr: &ConfigManager) -> AppResult<Connection> {
    let url = match mgr.get::<String>("amqp.url") {
        Ok(url) => url,
        Err(_) => {
            let host: String = mgr.get_or("amqp.host", "127.0.0.1".to_string());
            let port: i64 = mgr.get_or("amqp.port", 5672);
            let user: String = mgr.get_or("amqp.user", "guest".to_string());
            let pass: String = mgr.get_or("amqp.pass", "guest".to_string());
            format!(
                "amqp://{}:{}@{}:{}/%2f",
                urlencoding::encode(&user),
                urlencoding::encode(&pass),
                host,
                port
            )
        }
    };
    Ok(Connection::connect(&url, ConnectionProperties::default()).await?)
}

/// 幂等声明交换机、队列与绑定
///
/// 工作队列均为 durable，携带死信交换机与消息 TTL 参数；
/// 死信队列绑定在 `email.dlx` 上。
pub async fn declare_topology(channel: &Channel) -> AppResult<()> {
    let durable = ExchangeDeclareOptions {
        durable: true,
        ..Default::default()
    };
    channel
        .exchange_declare(
            EXCHANGE_EMAIL_DIRECT,
            ExchangeKind::Direct,
            durable,
            FieldTable::default(),
        )
        .await?;
    channel
        .exchange_declare(
            EXCHANGE_EMAIL_DLX,
            ExchangeKind::Direct,
            durable,
            FieldTable::default(),
        )
        .await?;

    let mut args = FieldTable::default();
    args.insert(
        "x-dead-letter-exchange".into(),
        AMQPValue::LongString(EXCHANGE_EMAIL_DLX.into()),
    );
    args.insert(
        "x-dead-letter-routing-key".into(),
        AMQPValue::LongString(ROUTING_EMAIL_DLX.into()),
    );
    args.insert("x-message-ttl".into(), AMQPValue::LongInt(MESSAGE_TTL_MS as i32));

    for queue in [QUEUE_EMAIL_VERIFICATION, QUEUE_EMAIL_NOTIFICATION] {
        channel
            .queue_declare(
                queue,
                QueueDeclareOptions {
                    durable: true,
                    ..Default::default()
                },
                args.clone(),
            )
            .await?;
        channel
            .queue_bind(
                queue,
                EXCHANGE_EMAIL_DIRECT,
                queue,
                QueueBindOptions::default(),
                FieldTable::default(),
            )
            .await?;
    }

    channel
        .queue_declare(
            QUEUE_EMAIL_FAILED,
            QueueDeclareOptions {
                durable: true,
                ..Default::default()
            },
            FieldTable::default(),
        )
        .await?;
    channel
        .queue_bind(
            QUEUE_EMAIL_FAILED,
            EXCHANGE_EMAIL_DLX,
            ROUTING_EMAIL_DLX,
            QueueBindOptions::default(),
            FieldTable::default(),
        )
        .await?;
    Ok(())
}

/// 邮件消息生产者
#[derive(Clone)]
pub struct EmailProducer {
    channel: Channel,
}

impl EmailProducer {
    pub fn new(channel: Channel) -> Self {
        Self { channel }
    }

    /// 发布一封新邮件到工作队列
    pub async fn publish(&self, kind: EmailKind, message: EmailMessage) -> AppResult<String> {
        let queue_message = QueueMessage::new(message);
        let message_id = queue_message.message_id.clone();
        self.publish_message(kind, &queue_message).await?;
        tracing::info!(
            message_id = %message_id,
            routing_key = kind.routing_key(),
            "email message published"
        );
        Ok(message_id)
    }

    /// 重新投递一条已有消息（重试路径）
    pub async fn publish_message(
        &self,
        kind: EmailKind,
        message: &QueueMessage<EmailMessage>,
    ) -> AppResult<()> {
        let payload = serde_json::to_vec(message)
            .map_err(|e| AppError::queue(format!("序列化队列消息失败: {}", e)))?;
        self.channel
            .basic_publish(
                EXCHANGE_EMAIL_DIRECT,
                kind.routing_key(),
                BasicPublishOptions::default(),
                &payload,
                BasicProperties::default()
                    .with_delivery_mode(2)
                    .with_message_id(message.message_id.clone().into()),
            )
            .await?
            .await?;
        Ok(())
    }

    /// 投递到死信交换机
    pub async fn send_to_dead_letter(
        &self,
        message: QueueMessage<EmailMessage>,
        error: &str,
    ) -> AppResult<()> {
        let message_id = message.message_id.clone();
        let dead_letter = DeadLetterMessage::new(message, error);
        let payload = serde_json::to_vec(&dead_letter)
            .map_err(|e| AppError::queue(format!("序列化死信消息失败: {}", e)))?;
        self.channel
            .basic_publish(
                EXCHANGE_EMAIL_DLX,
                ROUTING_EMAIL_DLX,
                BasicPublishOptions::default(),
                &payload,
                BasicProperties::default()
                    .with_delivery_mode(2)
                    .with_message_id(message_id.clone().into()),
            )
            .await?
            .await?;
        tracing::warn!(message_id = %message_id, "message moved to dead letter exchange");
        Ok(())
    }
}

/// 单个队列的消费循环
pub struct EmailConsumer {
    channel: Channel,
    producer: EmailProducer,
    mailer: Mailer,
    policy: RetryPolicy,
    kind: EmailKind,
}

impl EmailConsumer {
    pub fn new(channel: Channel, producer: EmailProducer, mailer: Mailer, kind: EmailKind) -> Self {
        Self {
            channel,
            producer,
            mailer,
            policy: RetryPolicy::default(),
            kind,
        }
    }

    /// 持续消费，直到通道关闭
    pub async fn run(self) -> AppResult<()> {
        self.channel.basic_qos(1, BasicQosOptions::default()).await?;
        let mut consumer = self
            .channel
            .basic_consume(
                self.kind.routing_key(),
                &format!("youqu-admin-{}", self.kind.label()),
                BasicConsumeOptions::default(),
                FieldTable::default(),
            )
            .await?;
        tracing::info!(queue = self.kind.routing_key(), "email consumer started");

        while let Some(delivery) = consumer.next().await {
            let delivery = delivery?;
            self.handle(&delivery.data).await;
            delivery.ack(BasicAckOptions::default()).await?;
        }
        Ok(())
    }

    async fn handle(&self, payload: &[u8]) {
        let label = self.kind.label();
        let message: QueueMessage<EmailMessage> = match serde_json::from_slice(payload) {
            Ok(m) => m,
            Err(e) => {
                tracing::error!(error = %e, "消息格式错误，丢弃");
                return;
            }
        };

        // 进入时已达重试上限的消息直接进入死信
        if message.attempts >= self.policy.max_retries {
            tracing::warn!(
                message_id = %message.message_id,
                attempts = message.attempts,
                "max retries reached, moving to DLX"
            );
            if let Err(e) = self
                .producer
                .send_to_dead_letter(message, "Max retries reached")
                .await
            {
                tracing::error!(error = %e, "死信投递失败");
            }
            return;
        }

        monitoring::email_received(label);
        let started = std::time::Instant::now();

        match self.mailer.send(&message.data).await {
            Ok(()) => {
                monitoring::email_processing_duration(label, started.elapsed());
                monitoring::email_success(label);
                tracing::info!(
                    message_id = %message.message_id,
                    to = %message.data.to,
                    "email sent"
                );
            }
            Err(e) => {
                monitoring::email_failure(label);
                let failed = message.next_attempt();
                match self.policy.decide(failed.attempts) {
                    RetryDecision::DeadLetter => {
                        tracing::warn!(
                            message_id = %failed.message_id,
                            attempts = failed.attempts,
                            error = %e,
                            "retry ceiling hit, moving to DLX"
                        );
                        if let Err(err) = self
                            .producer
                            .send_to_dead_letter(failed, &e.to_string())
                            .await
                        {
                            tracing::error!(error = %err, "死信投递失败");
                        }
                    }
                    RetryDecision::Retry { delay } => {
                        tracing::warn!(
                            message_id = %failed.message_id,
                            attempts = failed.attempts,
                            delay_secs = delay.as_secs(),
                            error = %e,
                            "email send failed, scheduling retry"
                        );
                        let producer = self.producer.clone();
                        let kind = self.kind;
                        tokio::spawn(async move {
                            tokio::time::sleep(delay).await;
                            if let Err(err) = producer.publish_message(kind, &failed).await {
                                tracing::error!(error = %err, "重试消息投递失败");
                            }
                        });
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retry_then_dead_letter_sequence() {
        let policy = RetryPolicy::default();
        assert_eq!(
            policy.decide(1),
            RetryDecision::Retry {
                delay: Duration::from_secs(30)
            }
        );
        assert_eq!(
            policy.decide(2),
            RetryDecision::Retry {
                delay: Duration::from_secs(120)
            }
        );
        assert_eq!(policy.decide(3), RetryDecision::DeadLetter);
        assert_eq!(policy.decide(4), RetryDecision::DeadLetter);
    }

    #[test]
    fn test_ceiling_bounds_total_attempts() {
        // 从零开始反复失败，验证总尝试次数等于上限且不再重试
        let policy = RetryPolicy::default();
        let mut message = QueueMessage::new(());
        let mut attempts_made = 0u32;
        loop {
            attempts_made += 1;
            message = message.next_attempt();
            match policy.decide(message.attempts) {
                RetryDecision::Retry { .. } => continue,
                RetryDecision::DeadLetter => break,
            }
        }
        assert_eq!(attempts_made, policy.max_retries);
        assert_eq!(policy.decide(message.attempts), RetryDecision::DeadLetter);
    }

    #[test]
    fn test_queue_message_shape() {
        let msg = QueueMessage::new(crate::email::EmailMessage {
            from: None,
            to: "user@example.com".to_string(),
            subject: "s".to_string(),
            text: None,
            html: None,
            message_id: None,
        });
        let value = serde_json::to_value(&msg).unwrap();
        assert_eq!(value["attempts"], 0);
        assert!(value["messageId"].is_string());
        assert!(value["timestamp"].is_i64());
        assert_eq!(value["data"]["to"], "user@example.com");
    }

    #[test]
    fn test_dead_letter_shape() {
        let msg = QueueMessage::new(()).next_attempt().next_attempt();
        let dl = DeadLetterMessage::new(msg, "smtp timeout");
        let value = serde_json::to_value(&dl).unwrap();
        assert_eq!(value["failedAttempts"], 2);
        assert_eq!(value["error"]["message"], "smtp timeout");
        assert!(value["originalMessage"]["messageId"].is_string());
        assert!(value["lastAttemptAt"].is_i64());
    }

    #[test]
    fn test_message_without_attempts_defaults_to_zero() {
        let raw = r#"{"data": null, "timestamp": 1, "messageId": "m1"}"#;
        let msg: QueueMessage<Option<()>> = serde_json::from_str(raw).unwrap();
        assert_eq!(msg.attempts, 0);
    }
}
