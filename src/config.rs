//! 配置系统模块
//!
//! 统一处理 TOML 配置文件、环境变量、命令行参数

use crate::health::Temperature;
use crate::medical::DEFAULT_TEMPERATURE_DEVIATION;
use anyhow::{anyhow, Result};
use clap::{Parser, Subcommand};
use config::{Config as ConfigBuilder, Environment, File};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use tracing::Level;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{fmt, prelude::*, EnvFilter, Layer, Registry};

/// 命令行参数
#[derive(Parser, Debug, Clone)]
#[command(name = "vitals-monitor")]
#[command(about = "生命体征监测 - 对照患者基线检查血压和体温")]
#[command(version)]
pub struct Cli {
    /// 配置文件路径
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// 日志级别
    #[arg(short, long, value_enum)]
    pub log_level: Option<LogLevel>,

    /// 数据库 URL
    #[arg(short, long)]
    pub database_url: Option<String>,

    /// 子命令
    #[command(subcommand)]
    pub command: Commands,
}

/// 支持的命令
#[derive(Subcommand, Debug, Clone)]
pub enum Commands {
    /// 录入患者基线
    AddPatient {
        /// 名
        #[arg(long)]
        name: String,
        /// 姓
        #[arg(long)]
        surname: String,
        /// 出生日期（YYYY-MM-DD）
        #[arg(long)]
        birthday: chrono::NaiveDate,
        /// 正常体温
        #[arg(long)]
        temperature: Temperature,
        /// 正常收缩压
        #[arg(long)]
        high: i32,
        /// 正常舒张压
        #[arg(long)]
        low: i32,
    },
    /// 显示患者信息
    ShowPatient {
        /// 患者 ID
        id: String,
    },
    /// 列出患者
    ListPatients,
    /// 删除患者
    RemovePatient {
        /// 患者 ID
        id: String,
    },
    /// 检查血压
    CheckPressure {
        /// 患者 ID
        id: String,
        /// 收缩压
        high: i32,
        /// 舒张压
        low: i32,
    },
    /// 检查体温
    CheckTemperature {
        /// 患者 ID
        id: String,
        /// 体温
        #[arg(allow_hyphen_values = true)]
        temperature: Temperature,
    },
    /// 重置配置
    ResetConfig,
}

/// 日志级别
#[derive(clap::ValueEnum, Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

impl From<LogLevel> for Level {
    fn from(level: LogLevel) -> Self {
        match level {
            LogLevel::Error => Level::ERROR,
            LogLevel::Warn => Level::WARN,
            LogLevel::Info => Level::INFO,
            LogLevel::Debug => Level::DEBUG,
            LogLevel::Trace => Level::TRACE,
        }
    }
}

/// 主配置结构
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct Config {
    /// 数据库配置
    pub database: DatabaseConfig,
    /// 监测规则配置
    pub monitoring: MonitoringConfig,
    /// 告警配置
    pub alert: AlertConfig,
    /// 日志配置
    pub logging: LoggingConfig,
}

/// 数据库配置
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    /// 数据库 URL
    pub url: String,
    /// 最大连接数
    pub max_connections: u32,
    /// 连接超时（秒）
    pub connect_timeout: u64,
}

/// 监测规则配置
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MonitoringConfig {
    /// 体温允许偏差（度），超过即告警
    pub temperature_deviation: Temperature,
}

/// 告警配置
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct AlertConfig {
    /// 告警输出渠道
    pub channel: AlertChannel,
}

/// 告警输出渠道
#[derive(Debug, Clone, Copy, Serialize, Deserialize, Default, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum AlertChannel {
    /// 标准输出
    #[default]
    Console,
    /// 仅写日志
    Log,
}

/// 日志配置
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// 日志级别
    pub level: LogLevel,
    /// 日志格式
    pub format: LogFormat,
    /// 日志输出目录
    pub directory: Option<PathBuf>,
}

/// 日志格式
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// 简洁格式
    Compact,
    /// 详细格式
    Full,
    /// JSON 格式
    Json,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: "sqlite:patients.db".to_string(),
            max_connections: 5,
            connect_timeout: 30,
        }
    }
}

impl Default for MonitoringConfig {
    fn default() -> Self {
        Self {
            temperature_deviation: DEFAULT_TEMPERATURE_DEVIATION,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: LogLevel::Info,
            format: LogFormat::Compact,
            directory: None,
        }
    }
}

impl Config {
    /// 使用指定的 CLI 参数加载配置
    pub fn load_with_cli(cli: &Cli) -> Result<Self> {
        let mut builder = ConfigBuilder::builder();

        // 1. 首先加载默认配置
        builder = builder.add_source(config::Config::try_from(&Config::default())?);

        // 2. 加载系统配置文件
        if let Some(system_config) = Self::get_system_config_path() {
            if system_config.exists() {
                builder = builder.add_source(File::from(system_config));
            }
        }

        // 3. 加载用户配置文件
        if let Some(user_config) = Self::get_user_config_path() {
            if user_config.exists() {
                builder = builder.add_source(File::from(user_config));
            }
        }

        // 4. 加载指定的配置文件
        if let Some(config_path) = &cli.config {
            if config_path.exists() {
                builder = builder.add_source(File::from(config_path.clone()));
            } else {
                return Err(anyhow!("配置文件不存在: {}", config_path.display()));
            }
        }

        // 5. 加载环境变量（前缀 VITALS_MONITOR_）
        builder = builder.add_source(
            Environment::with_prefix("VITALS_MONITOR")
                .prefix_separator("_")
                .separator("__"),
        );

        // 6. 构建配置
        let mut config: Config = builder.build()?.try_deserialize()?;

        // 7. 应用命令行参数覆盖
        if let Some(log_level) = &cli.log_level {
            config.logging.level = log_level.clone();
        }

        if let Some(database_url) = &cli.database_url {
            config.database.url = database_url.clone();
        }

        // 8. 验证配置
        config.validate()?;

        Ok(config)
    }

    /// 获取系统配置文件路径
    pub fn get_system_config_path() -> Option<PathBuf> {
        Some(PathBuf::from("/etc/vitals-monitor/config.toml"))
    }

    /// 获取用户配置文件路径
    pub fn get_user_config_path() -> Option<PathBuf> {
        ProjectDirs::from("", "", "vitals-monitor")
            .map(|dirs| dirs.config_dir().join("config.toml"))
    }

    /// 生成默认配置文件
    pub fn generate_default_config() -> Result<String> {
        let config = Config::default();
        toml::to_string_pretty(&config).map_err(|e| anyhow!("生成默认配置失败: {}", e))
    }

    /// 保存配置到文件
    pub fn save_to_file(&self, path: &PathBuf) -> Result<()> {
        let content = toml::to_string_pretty(self).map_err(|e| anyhow!("序列化配置失败: {}", e))?;

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        std::fs::write(path, content)?;
        Ok(())
    }

    /// 验证配置
    pub fn validate(&self) -> Result<()> {
        if self.database.url.is_empty() {
            return Err(anyhow!("数据库 URL 不能为空"));
        }

        if self.database.max_connections == 0 {
            return Err(anyhow!("最大连接数不能为 0"));
        }

        if self.monitoring.temperature_deviation.micros() < 0 {
            return Err(anyhow!(
                "体温允许偏差不能为负数: {}",
                self.monitoring.temperature_deviation
            ));
        }

        if let Some(log_dir) = &self.logging.directory {
            if !log_dir.exists() {
                std::fs::create_dir_all(log_dir)?;
            }
        }

        Ok(())
    }

    /// 初始化日志系统
    ///
    /// 写文件时返回的 guard 必须一直持有，否则缓冲的日志会丢失
    pub fn init_logging(&self) -> Result<Option<WorkerGuard>> {
        let level_filter = EnvFilter::builder()
            .with_default_directive(Level::from(self.logging.level.clone()).into())
            .from_env_lossy();

        let mut layers: Vec<Box<dyn Layer<Registry> + Send + Sync>> = Vec::new();
        layers.push(self.format_layer(fmt::layer()));

        let guard = match &self.logging.directory {
            Some(log_dir) => {
                std::fs::create_dir_all(log_dir)?;
                let file_appender = tracing_appender::rolling::daily(log_dir, "vitals-monitor.log");
                let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);
                layers.push(self.format_layer(fmt::layer().with_ansi(false).with_writer(non_blocking)));
                Some(guard)
            }
            None => None,
        };

        tracing_subscriber::registry()
            .with(layers)
            .with(level_filter)
            .try_init()
            .map_err(|e| anyhow!("日志系统初始化失败: {}", e))?;

        tracing::info!("日志系统已初始化，级别: {:?}", self.logging.level);
        Ok(guard)
    }

    fn format_layer<W>(
        &self,
        layer: fmt::Layer<Registry, fmt::format::DefaultFields, fmt::format::Format, W>,
    ) -> Box<dyn Layer<Registry> + Send + Sync>
    where
        W: for<'w> fmt::MakeWriter<'w> + Send + Sync + 'static,
    {
        match self.logging.format {
            LogFormat::Compact => layer.compact().boxed(),
            LogFormat::Full => layer.boxed(),
            LogFormat::Json => layer.json().with_target(true).with_level(true).boxed(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.database.url, "sqlite:patients.db");
        assert_eq!(
            config.monitoring.temperature_deviation,
            Temperature::from_hundredths(150)
        );
        assert_eq!(config.alert.channel, AlertChannel::Console);
        assert!(matches!(config.logging.level, LogLevel::Info));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_serialization() {
        let toml_str = Config::generate_default_config().unwrap();
        assert!(toml_str.contains("[database]"));
        assert!(toml_str.contains("[monitoring]"));
        assert!(toml_str.contains("temperature_deviation = \"1.50\""));
        assert!(toml_str.contains("channel = \"console\""));
    }

    #[test]
    fn test_config_file_loading() {
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("config.toml");

        let test_config = r#"
[database]
url = "sqlite:test.db"
max_connections = 2

[monitoring]
temperature_deviation = "0.8"

[alert]
channel = "log"

[logging]
level = "debug"
format = "json"
        "#;

        std::fs::write(&config_path, test_config).unwrap();

        let builder = ConfigBuilder::builder()
            .add_source(File::from(config_path))
            .build()
            .unwrap();

        let config: Config = builder.try_deserialize().unwrap();
        assert_eq!(config.database.url, "sqlite:test.db");
        assert_eq!(config.database.max_connections, 2);
        assert_eq!(config.database.connect_timeout, 30);
        assert_eq!(config.monitoring.temperature_deviation.to_string(), "0.80");
        assert_eq!(config.alert.channel, AlertChannel::Log);
        assert!(matches!(config.logging.level, LogLevel::Debug));
        assert!(matches!(config.logging.format, LogFormat::Json));
    }

    fn write_config(temp_dir: &TempDir, content: &str) -> PathBuf {
        let config_path = temp_dir.path().join("config.toml");
        std::fs::write(&config_path, content).unwrap();
        config_path
    }

    fn cli_with_config(config: Option<PathBuf>) -> Cli {
        Cli {
            config,
            log_level: None,
            database_url: None,
            command: Commands::ListPatients,
        }
    }

    const LAYERED_CONFIG: &str = r#"
[database]
url = "sqlite:from-file.db"

[monitoring]
temperature_deviation = "0.8"

[alert]
channel = "log"

[logging]
level = "warn"
    "#;

    #[test]
    fn test_load_with_cli_reads_config_file() {
        let temp_dir = TempDir::new().unwrap();
        let config_path = write_config(&temp_dir, LAYERED_CONFIG);

        let config = Config::load_with_cli(&cli_with_config(Some(config_path))).unwrap();

        assert_eq!(config.database.url, "sqlite:from-file.db");
        assert_eq!(config.alert.channel, AlertChannel::Log);
        assert!(matches!(config.logging.level, LogLevel::Warn));
        // 文件未设置的字段保留默认值
        assert_eq!(config.database.connect_timeout, 30);
        assert!(matches!(config.logging.format, LogFormat::Compact));
    }

    #[test]
    fn test_load_with_cli_flags_override_file() {
        let temp_dir = TempDir::new().unwrap();
        let config_path = write_config(&temp_dir, LAYERED_CONFIG);

        let cli = Cli::try_parse_from([
            "vitals-monitor",
            "--config",
            config_path.to_str().unwrap(),
            "--log-level",
            "trace",
            "--database-url",
            "sqlite:from-cli.db",
            "check-temperature",
            "p-1",
            "-35.5",
        ])
        .unwrap();

        match &cli.command {
            Commands::CheckTemperature { id, temperature } => {
                assert_eq!(id, "p-1");
                assert_eq!(temperature.to_string(), "-35.50");
            }
            other => panic!("意外的子命令: {other:?}"),
        }

        let config = Config::load_with_cli(&cli).unwrap();
        assert_eq!(config.database.url, "sqlite:from-cli.db");
        assert!(matches!(config.logging.level, LogLevel::Trace));
        assert_eq!(config.alert.channel, AlertChannel::Log);
    }

    #[test]
    fn test_load_with_cli_missing_config_file() {
        let temp_dir = TempDir::new().unwrap();
        let missing = temp_dir.path().join("absent.toml");

        let err = Config::load_with_cli(&cli_with_config(Some(missing.clone()))).unwrap_err();
        assert!(err.to_string().contains(&missing.display().to_string()));
    }

    #[test]
    fn test_load_with_cli_rejects_invalid_file_values() {
        let temp_dir = TempDir::new().unwrap();
        let config_path = write_config(
            &temp_dir,
            r#"
[database]
url = ""
            "#,
        );

        assert!(Config::load_with_cli(&cli_with_config(Some(config_path))).is_err());
    }

    /// 唯一设置 VITALS_MONITOR_* 环境变量的测试，其他测试不断言被覆盖的字段
    #[test]
    fn test_load_with_cli_environment_overrides_file() {
        let temp_dir = TempDir::new().unwrap();
        let config_path = write_config(&temp_dir, LAYERED_CONFIG);

        std::env::set_var("VITALS_MONITOR_MONITORING__TEMPERATURE_DEVIATION", "2.25");
        std::env::set_var("VITALS_MONITOR_DATABASE__MAX_CONNECTIONS", "7");
        let loaded = Config::load_with_cli(&cli_with_config(Some(config_path.clone())));
        std::env::remove_var("VITALS_MONITOR_MONITORING__TEMPERATURE_DEVIATION");
        std::env::remove_var("VITALS_MONITOR_DATABASE__MAX_CONNECTIONS");

        let config = loaded.unwrap();
        assert_eq!(
            config.monitoring.temperature_deviation,
            Temperature::from_hundredths(225)
        );
        assert_eq!(config.database.max_connections, 7);
        // 环境变量之外的字段仍来自文件
        assert_eq!(config.database.url, "sqlite:from-file.db");

        let config = Config::load_with_cli(&cli_with_config(Some(config_path))).unwrap();
        assert_eq!(
            config.monitoring.temperature_deviation,
            Temperature::from_hundredths(80)
        );
    }

    #[test]
    fn test_validation_rejects_bad_values() {
        let mut config = Config::default();
        config.database.url.clear();
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.monitoring.temperature_deviation = Temperature::from_hundredths(-10);
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_save_to_file_round_trip() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("nested").join("config.toml");

        let mut config = Config::default();
        config.alert.channel = AlertChannel::Log;
        config.save_to_file(&path).unwrap();

        let loaded: Config = toml::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(loaded.alert.channel, AlertChannel::Log);
        assert_eq!(loaded.database.url, config.database.url);
    }

    #[test]
    fn test_log_level_conversion() {
        assert_eq!(Level::from(LogLevel::Error), Level::ERROR);
        assert_eq!(Level::from(LogLevel::Warn), Level::WARN);
        assert_eq!(Level::from(LogLevel::Info), Level::INFO);
        assert_eq!(Level::from(LogLevel::Debug), Level::DEBUG);
        assert_eq!(Level::from(LogLevel::Trace), Level::TRACE);
    }
}
