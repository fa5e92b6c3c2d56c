//! 医疗监测服务
//!
//! 将观测到的血压、体温与患者基线比较，偏离时发送告警。
//! 服务本身无状态，患者数据和告警投递都通过注入的协作者完成。

use crate::alert::SendAlertService;
use crate::error::MedicalResult;
use crate::health::{BloodPressure, PatientInfo, Temperature};
use crate::storage::PatientInfoRepository;
use async_trait::async_trait;
use std::sync::Arc;

/// 体温允许偏差的默认值（1.5 度）
pub const DEFAULT_TEMPERATURE_DEVIATION: Temperature = Temperature::from_hundredths(150);

/// 监测服务接口
///
/// 两个检查方法都返回是否发出了告警
#[async_trait]
pub trait MedicalService: Send + Sync {
    /// 检查血压，任一分量与基线不同即告警
    async fn check_blood_pressure(
        &self,
        patient_id: &str,
        blood_pressure: BloodPressure,
    ) -> MedicalResult<bool>;

    /// 检查体温，与基线之差的绝对值超过阈值即告警
    async fn check_temperature(
        &self,
        patient_id: &str,
        temperature: Temperature,
    ) -> MedicalResult<bool>;
}

/// 告警消息
pub fn alert_message(patient_id: &str) -> String {
    format!("Warning, patient with id: {patient_id}, need help")
}

pub struct MedicalServiceImpl {
    patient_repository: Arc<dyn PatientInfoRepository>,
    alert_service: Arc<dyn SendAlertService>,
    temperature_deviation: Temperature,
}

impl MedicalServiceImpl {
    pub fn new(
        patient_repository: Arc<dyn PatientInfoRepository>,
        alert_service: Arc<dyn SendAlertService>,
    ) -> Self {
        Self {
            patient_repository,
            alert_service,
            temperature_deviation: DEFAULT_TEMPERATURE_DEVIATION,
        }
    }

    /// 设置体温允许偏差
    pub fn with_temperature_deviation(mut self, deviation: Temperature) -> Self {
        self.temperature_deviation = deviation;
        self
    }

    pub fn temperature_deviation(&self) -> Temperature {
        self.temperature_deviation
    }

    async fn patient_info(&self, patient_id: &str) -> MedicalResult<PatientInfo> {
        self.patient_repository.get_by_id(patient_id).await
    }

    async fn raise_alert(&self, patient: &PatientInfo) -> MedicalResult<()> {
        let message = alert_message(&patient.id);
        self.alert_service.send(&message).await
    }
}

#[async_trait]
impl MedicalService for MedicalServiceImpl {
    async fn check_blood_pressure(
        &self,
        patient_id: &str,
        blood_pressure: BloodPressure,
    ) -> MedicalResult<bool> {
        let patient = self.patient_info(patient_id).await?;
        let baseline = patient.health_info.blood_pressure;

        tracing::debug!(
            patient_id,
            observed_high = blood_pressure.high,
            observed_low = blood_pressure.low,
            baseline_high = baseline.high,
            baseline_low = baseline.low,
            "检查血压"
        );

        if baseline == blood_pressure {
            return Ok(false);
        }

        self.raise_alert(&patient).await?;
        Ok(true)
    }

    async fn check_temperature(
        &self,
        patient_id: &str,
        temperature: Temperature,
    ) -> MedicalResult<bool> {
        let patient = self.patient_info(patient_id).await?;
        let baseline = patient.health_info.normal_temperature;

        tracing::debug!(
            patient_id,
            observed = %temperature,
            baseline = %baseline,
            deviation_micros = temperature.abs_diff(baseline),
            "检查体温"
        );

        if !temperature.deviates_from(baseline, self.temperature_deviation) {
            return Ok(false);
        }

        self.raise_alert(&patient).await?;
        Ok(true)
    }
}
