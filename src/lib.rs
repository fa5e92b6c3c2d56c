//! Vitals Monitor - 生命体征监测
//!
//! 对照患者基线检查血压和体温，偏离时发出告警

pub mod alert;
pub mod config;
pub mod error;
pub mod health;
pub mod medical;
pub mod storage;
pub mod testing;

pub use error::{MedicalError, MedicalResult};
pub use medical::{MedicalService, MedicalServiceImpl};
