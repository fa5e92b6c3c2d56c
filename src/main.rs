use anyhow::Result;
use clap::Parser;
use std::sync::Arc;
use vitals_monitor::alert::alert_service_from_config;
use vitals_monitor::config::{Cli, Commands, Config};
use vitals_monitor::health::{BloodPressure, HealthInfo, PatientInfo};
use vitals_monitor::storage::{PatientInfoRepository, SqlitePatientRepository};
use vitals_monitor::{MedicalService, MedicalServiceImpl};

#[tokio::main]
async fn main() -> Result<()> {
    // 解析命令行参数
    let cli = Cli::parse();

    // 加载配置
    let config = Config::load_with_cli(&cli)?;

    // 初始化日志系统
    let _log_guard = config.init_logging()?;

    tracing::info!("Vitals Monitor Starting...");

    handle_command(cli.command, &config).await
}

async fn handle_command(command: Commands, config: &Config) -> Result<()> {
    match command {
        Commands::AddPatient {
            name,
            surname,
            birthday,
            temperature,
            high,
            low,
        } => {
            let repository = open_repository(config).await?;
            let patient = PatientInfo::without_id(
                name,
                surname,
                birthday,
                HealthInfo::new(temperature, BloodPressure::new(high, low)),
            );
            let id = repository.add(patient).await?;
            println!("{id}");
        }
        Commands::ShowPatient { id } => {
            let repository = open_repository(config).await?;
            let patient = repository.get_by_id(&id).await?;
            println!("{}", serde_json::to_string_pretty(&patient)?);
        }
        Commands::ListPatients => {
            let repository = open_repository(config).await?;
            let patients = repository.list().await?;
            println!("患者列表:");
            for patient in patients {
                println!(
                    "  {} - {} {} ({}) [{} / {}/{}]",
                    patient.id,
                    patient.name,
                    patient.surname,
                    patient.birthday,
                    patient.health_info.normal_temperature,
                    patient.health_info.blood_pressure.high,
                    patient.health_info.blood_pressure.low
                );
            }
        }
        Commands::RemovePatient { id } => {
            let repository = open_repository(config).await?;
            let patient = repository.remove(&id).await?;
            println!("已删除患者: {} {}", patient.name, patient.surname);
        }
        Commands::CheckPressure { id, high, low } => {
            let repository = open_repository(config).await?;
            let service = medical_service(repository, config);
            let alerted = service
                .check_blood_pressure(&id, BloodPressure::new(high, low))
                .await?;
            tracing::info!(patient_id = %id, alerted, "血压检查完成");
        }
        Commands::CheckTemperature { id, temperature } => {
            let repository = open_repository(config).await?;
            let service = medical_service(repository, config);
            let alerted = service.check_temperature(&id, temperature).await?;
            tracing::info!(patient_id = %id, alerted, "体温检查完成");
        }
        Commands::ResetConfig => {
            // 重置配置
            let default_config = Config::default();
            if let Some(config_path) = Config::get_user_config_path() {
                default_config.save_to_file(&config_path)?;
                println!("配置已重置到: {}", config_path.display());
            } else {
                println!("无法确定配置文件路径");
            }
        }
    }

    Ok(())
}

async fn open_repository(config: &Config) -> Result<Arc<SqlitePatientRepository>> {
    Ok(Arc::new(
        SqlitePatientRepository::connect(&config.database).await?,
    ))
}

fn medical_service(
    repository: Arc<SqlitePatientRepository>,
    config: &Config,
) -> MedicalServiceImpl {
    MedicalServiceImpl::new(repository, alert_service_from_config(&config.alert))
        .with_temperature_deviation(config.monitoring.temperature_deviation)
}
