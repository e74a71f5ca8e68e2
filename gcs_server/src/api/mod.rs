// gcs_server/src/api/mod.rs

//! HTTP API 请求处理模块。
//!
//! 任务与规划的 REST 增删改查不在本服务内实现，这里只提供根路径的 API 描述，
//! 告诉调用方遥测 WebSocket 的位置。

use axum::extract::State;
use axum::Json;
use serde::Serialize;

use crate::ws_server::service::AppState;

/// `GET /` 返回的 API 描述
#[derive(Serialize, Debug, Clone, PartialEq)]
pub struct ApiDescriptor {
    pub name: String,
    pub version: String,
    pub endpoints: ApiEndpoints,
}

#[derive(Serialize, Debug, Clone, PartialEq)]
pub struct ApiEndpoints {
    /// 形如 `{"WS /ws/live": "Live telemetry WebSocket"}`
    pub websocket: std::collections::BTreeMap<String, String>,
}

/// 根据遥测路径生成 API 描述
pub fn api_descriptor(telemetry_path: &str) -> ApiDescriptor {
    let mut websocket = std::collections::BTreeMap::new();
    websocket.insert(format!("WS {}", telemetry_path), "Live telemetry WebSocket".to_string());
    ApiDescriptor {
        name: "GCS Backend API".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        endpoints: ApiEndpoints { websocket },
    }
}

/// `GET /`
pub async fn root_handler(State(state): State<AppState>) -> Json<ApiDescriptor> {
    Json(api_descriptor(&state.telemetry_path))
}
