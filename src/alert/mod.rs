//! 告警模块
//!
//! 告警发送接口及其实现：控制台、日志、异步通道

use crate::config::{AlertChannel, AlertConfig};
use crate::error::{MedicalError, MedicalResult};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::io::Write;
use std::sync::Arc;
use tokio::sync::mpsc;

/// 告警发送服务
#[async_trait]
pub trait SendAlertService: Send + Sync {
    /// 发送一条告警消息
    async fn send(&self, message: &str) -> MedicalResult<()>;
}

/// 控制台告警：每条消息写一行
pub struct ConsoleAlertService {
    out: Mutex<Box<dyn Write + Send>>,
}

impl ConsoleAlertService {
    pub fn new() -> Self {
        Self::with_writer(Box::new(std::io::stdout()))
    }

    /// 写入指定输出（测试时可传入缓冲区）
    pub fn with_writer(out: Box<dyn Write + Send>) -> Self {
        Self {
            out: Mutex::new(out),
        }
    }
}

impl Default for ConsoleAlertService {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl SendAlertService for ConsoleAlertService {
    async fn send(&self, message: &str) -> MedicalResult<()> {
        tracing::warn!(alert = %message, "发送告警");
        let mut out = self.out.lock();
        writeln!(out, "{message}")
            .and_then(|_| out.flush())
            .map_err(|e| MedicalError::AlertDelivery(e.to_string()))
    }
}

/// 仅写入日志的告警
#[derive(Debug, Default, Clone, Copy)]
pub struct LogAlertService;

#[async_trait]
impl SendAlertService for LogAlertService {
    async fn send(&self, message: &str) -> MedicalResult<()> {
        tracing::warn!(alert = %message, "发送告警");
        Ok(())
    }
}

/// 通过通道投递的告警
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Alert {
    pub message: String,
    pub sent_at: DateTime<Utc>,
}

/// 异步通道告警：把告警交给下游消费者
#[derive(Clone)]
pub struct ChannelAlertService {
    sender: mpsc::Sender<Alert>,
}

impl ChannelAlertService {
    /// 创建发送端和接收端
    pub fn channel(buffer_size: usize) -> (Self, mpsc::Receiver<Alert>) {
        let (sender, receiver) = mpsc::channel(buffer_size);
        (Self { sender }, receiver)
    }
}

#[async_trait]
impl SendAlertService for ChannelAlertService {
    async fn send(&self, message: &str) -> MedicalResult<()> {
        let alert = Alert {
            message: message.to_string(),
            sent_at: Utc::now(),
        };
        self.sender
            .send(alert)
            .await
            .map_err(|_| MedicalError::AlertDelivery("告警通道已关闭".to_string()))
    }
}

/// 根据配置创建告警服务
pub fn alert_service_from_config(config: &AlertConfig) -> Arc<dyn SendAlertService> {
    match config.channel {
        AlertChannel::Console => Arc::new(ConsoleAlertService::new()),
        AlertChannel::Log => Arc::new(LogAlertService),
    }
}
