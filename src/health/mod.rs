pub mod patient;
pub mod temperature;

pub use patient::{BloodPressure, HealthInfo, PatientInfo};
pub use temperature::Temperature;
