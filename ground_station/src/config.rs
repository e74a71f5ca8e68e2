// ground_station/src/config.rs

//! 地面站客户端配置。
//!
//! 遥测端点由页面地址推导：`https` 页面使用 `wss`，`http` 页面使用 `ws`，
//! 主机与端口沿用页面地址，路径固定为遥测路径。

use common_models::RetryPolicy;
use serde::{Deserialize, Serialize};
use url::Url;

use crate::error::ClientError;

/// 默认遥测路径
pub const DEFAULT_TELEMETRY_PATH: &str = "/ws/live";

/// 客户端配置
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct ClientConfig {
    /// 仪表盘页面地址，例如 `https://gcs.example.org/dashboard`
    pub page_url: String,
    /// 遥测 WebSocket 路径
    pub telemetry_path: String,
    /// 遥测连接的重连策略，默认不重连
    pub reconnect: RetryPolicy,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            page_url: "http://127.0.0.1:8080/".to_string(),
            telemetry_path: DEFAULT_TELEMETRY_PATH.to_string(),
            reconnect: RetryPolicy::disabled(),
        }
    }
}

impl ClientConfig {
    pub fn for_page(page_url: impl Into<String>) -> Self {
        Self { page_url: page_url.into(), ..Self::default() }
    }

    pub fn with_reconnect(mut self, reconnect: RetryPolicy) -> Self {
        self.reconnect = reconnect;
        self
    }

    /// 推导出的遥测端点
    pub fn telemetry_endpoint(&self) -> Result<Url, ClientError> {
        telemetry_endpoint(&self.page_url, &self.telemetry_path)
    }
}

/// 根据页面地址推导遥测 WebSocket 端点。
pub fn telemetry_endpoint(page_url: &str, telemetry_path: &str) -> Result<Url, ClientError> {
    let mut url = Url::parse(page_url).map_err(|e| ClientError::InvalidPageUrl(format!("{}: {}", page_url, e)))?;
    let ws_scheme = match url.scheme() {
        "https" | "wss" => "wss",
        "http" | "ws" => "ws",
        other => return Err(ClientError::UnsupportedScheme(other.to_string())),
    };
    if url.host_str().is_none() {
        return Err(ClientError::InvalidPageUrl(format!("{}: 缺少主机名", page_url)));
    }
    url.set_scheme(ws_scheme)
        .map_err(|_| ClientError::UnsupportedScheme(url.scheme().to_string()))?;
    url.set_path(telemetry_path);
    url.set_query(None);
    url.set_fragment(None);
    Ok(url)
}
