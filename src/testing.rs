//! 测试辅助工具
//!
//! 提供记录型告警服务和常用患者样例

use crate::alert::SendAlertService;
use crate::error::{MedicalError, MedicalResult};
use crate::health::{BloodPressure, HealthInfo, PatientInfo, Temperature};
use async_trait::async_trait;
use chrono::NaiveDate;
use parking_lot::Mutex;

/// 记录所有收到的告警消息
#[derive(Default)]
pub struct RecordingAlertService {
    messages: Mutex<Vec<String>>,
    fail: bool,
}

impl RecordingAlertService {
    pub fn new() -> Self {
        Self::default()
    }

    /// 每次发送都失败（消息不会被记录）
    pub fn failing() -> Self {
        Self {
            messages: Mutex::new(Vec::new()),
            fail: true,
        }
    }

    /// 已收到的消息
    pub fn messages(&self) -> Vec<String> {
        self.messages.lock().clone()
    }

    /// 已收到的消息数
    pub fn count(&self) -> usize {
        self.messages.lock().len()
    }

    /// 最后一条消息
    pub fn last(&self) -> Option<String> {
        self.messages.lock().last().cloned()
    }

    /// 清空消息历史
    pub fn clear(&self) {
        self.messages.lock().clear();
    }
}

#[async_trait]
impl SendAlertService for RecordingAlertService {
    async fn send(&self, message: &str) -> MedicalResult<()> {
        if self.fail {
            return Err(MedicalError::AlertDelivery("模拟发送失败".to_string()));
        }
        self.messages.lock().push(message.to_string());
        Ok(())
    }
}

/// 构建患者样例
pub fn patient_fixture(
    id: &str,
    name: &str,
    surname: &str,
    birthday: (i32, u32, u32),
    normal_temperature: &str,
    blood_pressure: (i32, i32),
) -> PatientInfo {
    let (year, month, day) = birthday;
    PatientInfo::new(
        id,
        name,
        surname,
        NaiveDate::from_ymd_opt(year, month, day).expect("样例日期无效"),
        HealthInfo::new(
            normal_temperature
                .parse::<Temperature>()
                .expect("样例体温无效"),
            BloodPressure::new(blood_pressure.0, blood_pressure.1),
        ),
    )
}

/// 基线 36.65 / 120-80
pub fn ivan_petrov() -> PatientInfo {
    patient_fixture(
        "7509d79b-0c39-4d31-9d97-79d9f58522e2",
        "Иван",
        "Петров",
        (1980, 11, 26),
        "36.65",
        (120, 80),
    )
}

/// 基线 36.6 / 125-78
pub fn semyon_mikhailov() -> PatientInfo {
    patient_fixture(
        "e854a5d2-dd73-421d-bf37-183c7e2eec66",
        "Семен",
        "Михайлов",
        (1982, 1, 16),
        "36.6",
        (125, 78),
    )
}
