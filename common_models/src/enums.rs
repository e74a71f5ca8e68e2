//! 通用枚举模块。
//!
//! 本模块定义了地面站各组件（遥测服务端 `gcs_server`、地面站客户端 `ground_station`）
//! 之间共享的枚举类型。线上（JSON）表示与前端约定的字符串保持一致。

use serde::{Deserialize, Serialize};
use std::fmt;

/// 飞行器当前的飞行模式。
///
/// 序列化为前端使用的字符串，例如 `FlightMode::Loiter` 序列化为 `"Loiter"`。
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum FlightMode {
    /// 手动模式。
    Manual,
    /// 自稳（角度）模式。
    Angle,
    /// 定点悬停 / 盘旋模式，模拟器默认使用此模式。
    #[default]
    Loiter,
    /// 位置保持。
    PositionHold,
    /// 返航。
    ReturnToHome,
    /// 自动任务。
    Mission,
    /// 降落。
    Land,
}

impl fmt::Display for FlightMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self)
    }
}

/// 任务记录的状态。
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MissionStatus {
    /// 任务正常完成。
    Completed,
    /// 任务被中断。
    Interrupted,
    /// 任务进行中。线上表示带空格: `"In Progress"`。
    #[serde(rename = "In Progress")]
    InProgress,
}

/// 检测到的蚊虫孳生地类型。
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SiteType {
    /// 封闭容器（如轮胎、花盆内积水）。
    Enclosed,
    /// 开放水体（如污水沟）。
    Open,
}
