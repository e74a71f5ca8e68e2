//! 服务端配置的加载与默认值。
//!
//! 配置以 JSON 形式保存在 `gcs_settings.json`（路径可由环境变量 `GCS_CONFIG` 覆盖）。
//! 文件不存在时写入默认配置；文件损坏时记录警告、使用默认配置并覆盖原文件。

use common_models::RetryPolicy;
use log::{info, warn, LevelFilter};
use serde::{Deserialize, Serialize};
use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::AppError;

/// 配置文件的默认文件名
pub const CONFIG_FILE_NAME: &str = "gcs_settings.json";
/// 覆盖配置文件路径的环境变量
pub const CONFIG_PATH_ENV: &str = "GCS_CONFIG";

/// HTTP / WebSocket 监听配置
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct ServerConfig {
    /// 绑定的主机地址
    pub host: String,
    /// 监听的端口号
    pub port: u16,
    /// 遥测 WebSocket 的升级路径
    pub telemetry_path: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8080,
            telemetry_path: "/ws/live".to_string(),
        }
    }
}

/// 遥测模拟与发布配置
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct TelemetryConfig {
    /// 发布周期（毫秒）
    pub publish_interval_ms: u64,
    /// 新连接的初始电量百分比
    pub initial_battery_percentage: f64,
    /// 每个发布周期的电量下降值（百分点）
    pub battery_drain_per_tick: f64,
    /// 每个周期检测到孳生地的概率
    pub site_detection_probability: f64,
    /// 地面航迹最多保留的点数
    pub max_track_points: usize,
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            publish_interval_ms: 1000,
            initial_battery_percentage: 99.0,
            battery_drain_per_tick: 0.01,
            site_detection_probability: 0.02,
            max_track_points: 600,
        }
    }
}

impl TelemetryConfig {
    /// 发布周期。配置为 0 时退回默认的 1 秒。
    pub fn publish_interval(&self) -> Duration {
        if self.publish_interval_ms == 0 {
            warn!("[配置模块] publish_interval_ms 为 0，使用默认的 1000 毫秒。");
            return Duration::from_millis(1000);
        }
        Duration::from_millis(self.publish_interval_ms)
    }
}

/// 存储协作方配置
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct StorageConfig {
    /// `host:port` 或带协议的 URL；为空时跳过启动连通性检查
    pub url: Option<String>,
    /// 启动连通性检查的重试策略
    pub retry: RetryPolicy,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self { url: None, retry: RetryPolicy::fixed(5, 2000) }
    }
}

/// 应用的主配置结构体
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub telemetry: TelemetryConfig,
    pub storage: StorageConfig,
    /// 日志级别：`error` / `warn` / `info` / `debug` / `trace` / `off`
    pub log_level: String,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            server: ServerConfig::default(),
            telemetry: TelemetryConfig::default(),
            storage: StorageConfig::default(),
            log_level: "info".to_string(),
        }
    }
}

impl AppConfig {
    /// 监听地址，形如 `127.0.0.1:8080`
    pub fn listen_addr(&self) -> String {
        format!("{}:{}", self.server.host, self.server.port)
    }

    /// 解析日志级别，无法识别时返回 `Info`
    pub fn log_level_filter(&self) -> LevelFilter {
        self.log_level.parse().unwrap_or(LevelFilter::Info)
    }

    /// 检查配置中会导致服务无法启动的取值
    pub fn validate(&self) -> Result<(), AppError> {
        if !self.server.telemetry_path.starts_with('/') {
            return Err(AppError::ConfigError(format!(
                "telemetry_path 必须以 '/' 开头，当前为 '{}'",
                self.server.telemetry_path
            )));
        }
        if !(0.0..=1.0).contains(&self.telemetry.site_detection_probability) {
            return Err(AppError::ConfigError(format!(
                "site_detection_probability 必须位于 [0, 1]，当前为 {}",
                self.telemetry.site_detection_probability
            )));
        }
        if self.telemetry.battery_drain_per_tick < 0.0 {
            return Err(AppError::ConfigError("battery_drain_per_tick 不能为负数".to_string()));
        }
        Ok(())
    }
}

/// 获取配置文件路径：优先使用 `GCS_CONFIG`，否则使用当前目录下的 `gcs_settings.json`
pub fn config_file_path() -> PathBuf {
    if let Ok(path) = env::var(CONFIG_PATH_ENV) {
        if !path.trim().is_empty() {
            return PathBuf::from(path);
        }
    }
    let current_dir = env::current_dir().unwrap_or_else(|_| PathBuf::from("."));
    current_dir.join(CONFIG_FILE_NAME)
}

/// 从默认路径加载或创建配置
pub fn load_or_create_config() -> AppConfig {
    load_or_create_config_at(&config_file_path())
}

/// 从指定路径加载配置；文件缺失或损坏时写入并返回默认配置
pub fn load_or_create_config_at(config_file_path: &Path) -> AppConfig {
    match fs::read_to_string(config_file_path) {
        Ok(content) => match serde_json::from_str::<AppConfig>(&content) {
            Ok(config) => {
                info!("[配置模块] 已成功从配置文件 {:?} 加载应用配置。", config_file_path);
                config
            }
            Err(e) => {
                warn!(
                    "[配置模块] 警告：从 {:?} 反序列化配置失败: {}. 文件可能已损坏。将使用默认配置并尝试覆盖。",
                    config_file_path, e
                );
                let default_config = AppConfig::default();
                save_config(&default_config, config_file_path);
                default_config
            }
        },
        Err(e) => {
            info!(
                "[配置模块] 未在 {:?} 找到配置文件或读取时发生错误 (错误: {}). 将使用默认配置并尝试创建新文件。",
                config_file_path, e
            );
            let default_config = AppConfig::default();
            save_config(&default_config, config_file_path);
            default_config
        }
    }
}

/// 保存配置到文件，失败时只记录警告
fn save_config(config: &AppConfig, path: &Path) {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() && !parent.exists() {
            if let Err(e) = fs::create_dir_all(parent) {
                warn!("[配置模块] 错误：创建配置目录 {:?} 失败: {}", parent, e);
                return;
            }
        }
    }

    match serde_json::to_string_pretty(config) {
        Ok(content) => {
            if let Err(e) = fs::write(path, content) {
                warn!("[配置模块] 错误：将配置写入文件 {:?} 时失败: {}", path, e);
            } else {
                info!("[配置模块] 已成功将当前配置保存到 {:?}.", path);
            }
        }
        Err(e) => {
            warn!("[配置模块] 错误：序列化配置信息以便保存时失败: {}", e);
        }
    }
}
