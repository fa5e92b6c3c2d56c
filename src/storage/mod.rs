//! 存储模块
//!
//! 患者基线数据的存取接口，以及内存和 SQLite 两种实现

pub mod sqlite;

pub use sqlite::SqlitePatientRepository;

use crate::error::{MedicalError, MedicalResult};
use crate::health::PatientInfo;
use async_trait::async_trait;
use parking_lot::RwLock;
use std::collections::HashMap;

/// 患者信息仓库
///
/// 监测服务只调用 `get_by_id`，其余操作供录入和管理使用
#[async_trait]
pub trait PatientInfoRepository: Send + Sync {
    /// 按 ID 获取患者，不存在时返回 `PatientNotFound`
    async fn get_by_id(&self, id: &str) -> MedicalResult<PatientInfo>;

    /// 新增患者，ID 为空时自动生成，返回最终 ID
    async fn add(&self, patient: PatientInfo) -> MedicalResult<String>;

    /// 替换已有患者记录
    async fn update(&self, patient: PatientInfo) -> MedicalResult<()>;

    /// 删除患者并返回被删除的记录
    async fn remove(&self, id: &str) -> MedicalResult<PatientInfo>;

    /// 列出全部患者（按姓、名排序）
    async fn list(&self) -> MedicalResult<Vec<PatientInfo>>;
}

/// 为空 ID 分配新的 UUID
pub(crate) fn assign_id(mut patient: PatientInfo) -> PatientInfo {
    if patient.id.is_empty() {
        patient.id = uuid::Uuid::new_v4().to_string();
    }
    patient
}

/// 内存仓库
#[derive(Default)]
pub struct InMemoryPatientRepository {
    patients: RwLock<HashMap<String, PatientInfo>>,
}

impl InMemoryPatientRepository {
    pub fn new() -> Self {
        Self::default()
    }

    /// 用一组患者初始化
    pub fn with_patients(patients: impl IntoIterator<Item = PatientInfo>) -> Self {
        let map = patients
            .into_iter()
            .map(assign_id)
            .map(|p| (p.id.clone(), p))
            .collect();
        Self {
            patients: RwLock::new(map),
        }
    }

    pub fn len(&self) -> usize {
        self.patients.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.patients.read().is_empty()
    }
}

#[async_trait]
impl PatientInfoRepository for InMemoryPatientRepository {
    async fn get_by_id(&self, id: &str) -> MedicalResult<PatientInfo> {
        self.patients
            .read()
            .get(id)
            .cloned()
            .ok_or_else(|| MedicalError::not_found(id))
    }

    async fn add(&self, patient: PatientInfo) -> MedicalResult<String> {
        let patient = assign_id(patient);
        let mut patients = self.patients.write();
        if patients.contains_key(&patient.id) {
            return Err(MedicalError::DuplicatePatient { id: patient.id });
        }
        let id = patient.id.clone();
        patients.insert(id.clone(), patient);
        Ok(id)
    }

    async fn update(&self, patient: PatientInfo) -> MedicalResult<()> {
        let mut patients = self.patients.write();
        match patients.get_mut(&patient.id) {
            Some(existing) => {
                *existing = patient;
                Ok(())
            }
            None => Err(MedicalError::not_found(patient.id)),
        }
    }

    async fn remove(&self, id: &str) -> MedicalResult<PatientInfo> {
        self.patients
            .write()
            .remove(id)
            .ok_or_else(|| MedicalError::not_found(id))
    }

    async fn list(&self) -> MedicalResult<Vec<PatientInfo>> {
        let mut patients: Vec<_> = self.patients.read().values().cloned().collect();
        patients.sort_by(|a, b| (&a.surname, &a.name).cmp(&(&b.surname, &b.name)));
        Ok(patients)
    }
}
