//! RabbitMQ 消息队列
//!
//! 邮件发送经由 `email.direct` 交换机异步处理，
//! 失败消息在重试上限后进入 `email.dlx` 死信交换机。

pub mod email;

pub use email::{
    connect, declare_topology, DeadLetterMessage, EmailConsumer, EmailKind, EmailProducer,
    QueueMessage, RetryDecision, RetryPolicy,
};
