use super::temperature::Temperature;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Blood pressure reading: systolic (`high`) over diastolic (`low`)
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub struct BloodPressure {
    pub high: i32,
    pub low: i32,
}

impl BloodPressure {
    pub fn new(high: i32, low: i32) -> Self {
        Self { high, low }
    }
}

/// Baseline health readings recorded for a patient
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct HealthInfo {
    pub normal_temperature: Temperature,
    pub blood_pressure: BloodPressure,
}

impl HealthInfo {
    pub fn new(normal_temperature: Temperature, blood_pressure: BloodPressure) -> Self {
        Self {
            normal_temperature,
            blood_pressure,
        }
    }
}

/// Stored patient record
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct PatientInfo {
    pub id: String,
    pub name: String,
    pub surname: String,
    pub birthday: NaiveDate,
    pub health_info: HealthInfo,
}

impl PatientInfo {
    pub fn new(
        id: impl Into<String>,
        name: impl Into<String>,
        surname: impl Into<String>,
        birthday: NaiveDate,
        health_info: HealthInfo,
    ) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            surname: surname.into(),
            birthday,
            health_info,
        }
    }

    /// Same record without an id, for repositories that assign one on insert
    pub fn without_id(
        name: impl Into<String>,
        surname: impl Into<String>,
        birthday: NaiveDate,
        health_info: HealthInfo,
    ) -> Self {
        Self::new(String::new(), name, surname, birthday, health_info)
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = id.into();
        self
    }
}
