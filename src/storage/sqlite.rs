//! 基于 SQLite 的患者仓库

use super::{assign_id, PatientInfoRepository};
use crate::config::DatabaseConfig;
use crate::error::{MedicalError, MedicalResult};
use crate::health::{BloodPressure, HealthInfo, PatientInfo, Temperature};
use async_trait::async_trait;
use chrono::NaiveDate;
use sqlx::sqlite::{SqlitePoolOptions, SqliteRow};
use sqlx::{Row, SqlitePool};
use std::path::Path;
use std::time::Duration;

/// SQLite 患者仓库
pub struct SqlitePatientRepository {
    pool: SqlitePool,
}

impl SqlitePatientRepository {
    /// 按数据库配置连接
    pub async fn connect(config: &DatabaseConfig) -> MedicalResult<Self> {
        Self::connect_with(
            &config.url,
            config.max_connections,
            Duration::from_secs(config.connect_timeout),
        )
        .await
    }

    /// 使用默认连接池参数连接
    pub async fn new(database_url: &str) -> MedicalResult<Self> {
        Self::connect_with(database_url, 5, Duration::from_secs(5)).await
    }

    async fn connect_with(
        database_url: &str,
        max_connections: u32,
        acquire_timeout: Duration,
    ) -> MedicalResult<Self> {
        tracing::info!("正在初始化存储层...");

        // 确保数据库目录存在
        let path = database_url
            .trim_start_matches("sqlite:")
            .trim_start_matches("//");
        if let Some(parent) = Path::new(path).parent() {
            if !parent.exists() && !parent.as_os_str().is_empty() {
                tracing::debug!("创建数据库目录: {:?}", parent);
                std::fs::create_dir_all(parent).map_err(sqlx::Error::Io)?;
            }
        }

        tracing::info!("正在连接数据库: {}", database_url);

        let options = database_url
            .parse::<sqlx::sqlite::SqliteConnectOptions>()?
            .create_if_missing(true);

        // 内存数据库随连接存在：只用单连接，且连接不能被回收
        let (max_connections, idle_timeout, max_lifetime) = if Self::is_in_memory(database_url) {
            (1, None, None)
        } else {
            (
                max_connections,
                Some(Duration::from_secs(60)),
                Some(Duration::from_secs(1800)),
            )
        };

        let pool = SqlitePoolOptions::new()
            .max_connections(max_connections)
            .min_connections(1)
            .acquire_timeout(acquire_timeout)
            .idle_timeout(idle_timeout)
            .max_lifetime(max_lifetime)
            .connect_with(options)
            .await?;

        tracing::debug!("设置 SQLite 优化参数");
        sqlx::query("PRAGMA journal_mode = WAL")
            .execute(&pool)
            .await?;
        sqlx::query("PRAGMA synchronous = NORMAL")
            .execute(&pool)
            .await?;
        sqlx::query("PRAGMA busy_timeout = 5000")
            .execute(&pool)
            .await?;

        tracing::info!("正在运行数据库迁移...");
        sqlx::migrate!("./migrations").run(&pool).await?;

        tracing::info!("存储层初始化完成");
        Ok(Self { pool })
    }

    fn is_in_memory(database_url: &str) -> bool {
        database_url.contains(":memory:") || database_url.contains("mode=memory")
    }

    /// 获取数据库连接池（用于高级操作）
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    fn row_to_patient(row: &SqliteRow) -> MedicalResult<PatientInfo> {
        let birthday: NaiveDate = row.try_get("birthday")?;
        let temperature: i64 = row.try_get("normal_temperature")?;

        Ok(PatientInfo {
            id: row.try_get("id")?,
            name: row.try_get("name")?,
            surname: row.try_get("surname")?,
            birthday,
            health_info: HealthInfo::new(
                Temperature::from_micros(temperature),
                BloodPressure::new(
                    row.try_get("pressure_high")?,
                    row.try_get("pressure_low")?,
                ),
            ),
        })
    }
}

#[async_trait]
impl PatientInfoRepository for SqlitePatientRepository {
    async fn get_by_id(&self, id: &str) -> MedicalResult<PatientInfo> {
        let query = "SELECT * FROM patients WHERE id = ?1";

        let row = sqlx::query(query)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| MedicalError::not_found(id))?;

        Self::row_to_patient(&row)
    }

    async fn add(&self, patient: PatientInfo) -> MedicalResult<String> {
        let patient = assign_id(patient);
        let query = r#"
            INSERT INTO patients (
                id, name, surname, birthday, normal_temperature, pressure_high, pressure_low
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
            ON CONFLICT(id) DO NOTHING
        "#;

        let result = sqlx::query(query)
            .bind(&patient.id)
            .bind(&patient.name)
            .bind(&patient.surname)
            .bind(patient.birthday)
            .bind(patient.health_info.normal_temperature.micros())
            .bind(patient.health_info.blood_pressure.high)
            .bind(patient.health_info.blood_pressure.low)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(MedicalError::DuplicatePatient { id: patient.id });
        }

        tracing::debug!(patient_id = %patient.id, "患者已写入");
        Ok(patient.id)
    }

    async fn update(&self, patient: PatientInfo) -> MedicalResult<()> {
        let query = r#"
            UPDATE patients SET
                name = ?2,
                surname = ?3,
                birthday = ?4,
                normal_temperature = ?5,
                pressure_high = ?6,
                pressure_low = ?7,
                updated_at = CURRENT_TIMESTAMP
            WHERE id = ?1
        "#;

        let result = sqlx::query(query)
            .bind(&patient.id)
            .bind(&patient.name)
            .bind(&patient.surname)
            .bind(patient.birthday)
            .bind(patient.health_info.normal_temperature.micros())
            .bind(patient.health_info.blood_pressure.high)
            .bind(patient.health_info.blood_pressure.low)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(MedicalError::not_found(patient.id));
        }
        Ok(())
    }

    async fn remove(&self, id: &str) -> MedicalResult<PatientInfo> {
        let mut tx = self.pool.begin().await?;

        let row = sqlx::query("SELECT * FROM patients WHERE id = ?1")
            .bind(id)
            .fetch_optional(&mut *tx)
            .await?
            .ok_or_else(|| MedicalError::not_found(id))?;
        let patient = Self::row_to_patient(&row)?;

        sqlx::query("DELETE FROM patients WHERE id = ?1")
            .bind(id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(patient)
    }

    async fn list(&self) -> MedicalResult<Vec<PatientInfo>> {
        let query = "SELECT * FROM patients ORDER BY surname, name";

        let rows = sqlx::query(query).fetch_all(&self.pool).await?;

        rows.iter().map(Self::row_to_patient).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{ivan_petrov, semyon_mikhailov};
    use tempfile::TempDir;

    async fn setup_test_db() -> (SqlitePatientRepository, TempDir) {
        let temp_dir = TempDir::new().unwrap();
        let db_path = temp_dir.path().join("data").join("patients.db");
        let db_url = format!("sqlite:{}", db_path.display());

        let repo = SqlitePatientRepository::new(&db_url).await.unwrap();
        (repo, temp_dir)
    }

    #[tokio::test]
    async fn test_store_and_get_patient() {
        let (repo, _temp_dir) = setup_test_db().await;

        let patient = ivan_petrov();
        let id = repo.add(patient.clone()).await.unwrap();
        assert_eq!(id, patient.id);

        let stored = repo.get_by_id(&id).await.unwrap();
        assert_eq!(stored, patient);
        assert_eq!(stored.health_info.normal_temperature.to_string(), "36.65");
    }

    #[tokio::test]
    async fn test_in_memory_database_keeps_data() {
        let repo = SqlitePatientRepository::new("sqlite::memory:").await.unwrap();

        let pool_options = repo.pool().options();
        assert_eq!(pool_options.get_max_connections(), 1);
        assert_eq!(pool_options.get_idle_timeout(), None);
        assert_eq!(pool_options.get_max_lifetime(), None);

        repo.add(ivan_petrov()).await.unwrap();
        repo.add(semyon_mikhailov()).await.unwrap();
        assert_eq!(repo.list().await.unwrap().len(), 2);
        assert_eq!(
            repo.get_by_id(&ivan_petrov().id).await.unwrap(),
            ivan_petrov()
        );
    }

    #[tokio::test]
    async fn test_file_database_recycles_connections() {
        let (repo, _temp_dir) = setup_test_db().await;

        let pool_options = repo.pool().options();
        assert_eq!(pool_options.get_idle_timeout(), Some(Duration::from_secs(60)));
        assert_eq!(pool_options.get_max_lifetime(), Some(Duration::from_secs(1800)));
    }

    #[tokio::test]
    async fn test_unknown_patient() {
        let (repo, _temp_dir) = setup_test_db().await;
        assert!(repo.get_by_id("nobody").await.unwrap_err().is_not_found());
        assert!(repo.remove("nobody").await.unwrap_err().is_not_found());
    }

    #[tokio::test]
    async fn test_duplicate_and_generated_ids() {
        let (repo, _temp_dir) = setup_test_db().await;

        repo.add(ivan_petrov()).await.unwrap();
        let err = repo.add(ivan_petrov()).await.unwrap_err();
        assert!(matches!(err, MedicalError::DuplicatePatient { .. }));

        let generated = repo.add(semyon_mikhailov().with_id("")).await.unwrap();
        assert!(uuid::Uuid::parse_str(&generated).is_ok());
        assert_eq!(repo.list().await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_update_and_remove() {
        let (repo, _temp_dir) = setup_test_db().await;

        let mut patient = semyon_mikhailov();
        repo.add(patient.clone()).await.unwrap();

        patient.health_info.normal_temperature = "37.1".parse().unwrap();
        repo.update(patient.clone()).await.unwrap();
        assert_eq!(repo.get_by_id(&patient.id).await.unwrap(), patient);

        let removed = repo.remove(&patient.id).await.unwrap();
        assert_eq!(removed, patient);
        assert!(repo.list().await.unwrap().is_empty());
        assert!(repo.update(patient).await.unwrap_err().is_not_found());
    }
}
