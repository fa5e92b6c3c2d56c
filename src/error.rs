//! 错误处理
//!
//! 监测服务及其协作者共用的错误类型

use thiserror::Error;

/// 监测服务错误类型
#[derive(Error, Debug)]
pub enum MedicalError {
    /// 患者不存在
    #[error("Patient not found: {id}")]
    PatientNotFound { id: String },

    /// 患者已存在
    #[error("Patient already exists: {id}")]
    DuplicatePatient { id: String },

    /// 体温格式错误
    #[error("Invalid temperature: {0:?}")]
    InvalidTemperature(String),

    /// 存储错误
    #[error("Storage error: {0}")]
    Storage(#[from] sqlx::Error),

    /// 数据库迁移错误
    #[error("Migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    /// 告警发送失败
    #[error("Alert delivery failed: {0}")]
    AlertDelivery(String),

    /// 序列化错误
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl MedicalError {
    /// 构造患者不存在错误
    pub fn not_found(id: impl Into<String>) -> Self {
        Self::PatientNotFound { id: id.into() }
    }

    /// 是否为患者不存在
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::PatientNotFound { .. })
    }
}

/// 监测服务结果类型
pub type MedicalResult<T> = Result<T, MedicalError>;
