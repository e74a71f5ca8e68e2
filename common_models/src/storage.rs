// common_models/src/storage.rs

//! 任务与规划存储协作方的边界定义。
//!
//! 关系型存储本身不在本仓库范围内；这里只定义地面站代码消费的接口
//! (`MissionStore` / `PlanStore`)，以及一个进程内实现 `InMemoryStore`，
//! 供客户端任务结束流程和测试使用。校验规则与飞行日志 REST 接口一致。

use std::future::Future;
use std::sync::Mutex;

use chrono::Utc;
use thiserror::Error;

use crate::mission_models::{MissionPlan, MissionRecord, MissionStats, NewMission, PlanHeader};

/// 存储协作方返回的错误。
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StorageError {
    /// 请求数据不完整或不合法，对应 HTTP 400。
    #[error("数据校验失败: {0}")]
    Invalid(String),

    /// 指定 id 的记录不存在，对应 HTTP 404。
    #[error("记录不存在: id={0}")]
    NotFound(i64),

    /// 存储后端不可用。
    #[error("存储不可用: {0}")]
    Unavailable(String),
}

/// 任务记录存储。
pub trait MissionStore {
    /// 保存一条新任务，返回带 id 的已保存记录。
    fn create_mission(
        &self,
        mission: NewMission,
    ) -> impl Future<Output = Result<MissionRecord, StorageError>> + Send;

    /// 按 id 倒序列出全部任务。
    fn list_missions(&self) -> impl Future<Output = Result<Vec<MissionRecord>, StorageError>> + Send;

    /// 总飞行次数与总飞行时长（小时）。
    fn get_stats(&self) -> impl Future<Output = Result<MissionStats, StorageError>> + Send;
}

/// 任务规划存储。
pub trait PlanStore {
    fn create_plan(
        &self,
        plan: MissionPlan,
    ) -> impl Future<Output = Result<MissionPlan, StorageError>> + Send;

    /// 按 id 倒序列出规划的 id 与名称。
    fn list_plan_headers(&self) -> impl Future<Output = Result<Vec<PlanHeader>, StorageError>> + Send;

    fn get_plan(&self, id: i64) -> impl Future<Output = Result<MissionPlan, StorageError>> + Send;
}

/// 校验新任务记录的必填字段。
pub fn validate_new_mission(mission: &NewMission) -> Result<(), StorageError> {
    if mission.name.trim().is_empty() || mission.date.trim().is_empty() || mission.location.trim().is_empty() {
        return Err(StorageError::Invalid("Missing required mission fields".to_string()));
    }
    Ok(())
}

/// 校验任务规划：名称必填，且至少包含一个航点。
pub fn validate_plan(plan: &MissionPlan) -> Result<(), StorageError> {
    if plan.name.trim().is_empty() || plan.waypoints.is_empty() {
        return Err(StorageError::Invalid(
            "Invalid plan data. Name and waypoints are required.".to_string(),
        ));
    }
    Ok(())
}

/// 根据任务列表计算飞行统计。
pub fn compute_stats(missions: &[MissionRecord]) -> MissionStats {
    let total_seconds: u64 = missions.iter().map(MissionRecord::duration_seconds).sum();
    MissionStats {
        total_flights: missions.len() as u64,
        total_flight_time_hours: total_seconds as f64 / 3600.0,
    }
}

#[derive(Debug, Default)]
struct InMemoryTables {
    missions: Vec<MissionRecord>,
    plans: Vec<MissionPlan>,
    next_mission_id: i64,
    next_plan_id: i64,
}

/// 进程内存储实现。id 从 1 开始自增。
#[derive(Debug, Default)]
pub struct InMemoryStore {
    tables: Mutex<InMemoryTables>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn with_tables<T>(&self, f: impl FnOnce(&mut InMemoryTables) -> T) -> Result<T, StorageError> {
        let mut guard = self
            .tables
            .lock()
            .map_err(|e| StorageError::Unavailable(format!("存储锁已中毒: {}", e)))?;
        Ok(f(&mut guard))
    }

    fn insert_mission(&self, mission: NewMission) -> Result<MissionRecord, StorageError> {
        validate_new_mission(&mission)?;
        self.with_tables(|tables| {
            tables.next_mission_id += 1;
            let record = MissionRecord {
                id: tables.next_mission_id,
                name: mission.name,
                date: mission.date,
                duration: mission.duration.to_string(),
                status: mission.status,
                location: mission.location,
                gps_track: mission.gps_track,
                detected_sites: mission.detected_sites,
                created_at: Utc::now(),
            };
            tables.missions.push(record.clone());
            record
        })
    }

    fn insert_plan(&self, plan: MissionPlan) -> Result<MissionPlan, StorageError> {
        validate_plan(&plan)?;
        self.with_tables(|tables| {
            tables.next_plan_id += 1;
            let saved = MissionPlan { id: Some(tables.next_plan_id), ..plan };
            tables.plans.push(saved.clone());
            saved
        })
    }
}

impl MissionStore for InMemoryStore {
    fn create_mission(
        &self,
        mission: NewMission,
    ) -> impl Future<Output = Result<MissionRecord, StorageError>> + Send {
        let result = self.insert_mission(mission);
        async move { result }
    }

    fn list_missions(&self) -> impl Future<Output = Result<Vec<MissionRecord>, StorageError>> + Send {
        let result = self.with_tables(|tables| tables.missions.iter().rev().cloned().collect());
        async move { result }
    }

    fn get_stats(&self) -> impl Future<Output = Result<MissionStats, StorageError>> + Send {
        let result = self.with_tables(|tables| compute_stats(&tables.missions));
        async move { result }
    }
}

impl PlanStore for InMemoryStore {
    fn create_plan(
        &self,
        plan: MissionPlan,
    ) -> impl Future<Output = Result<MissionPlan, StorageError>> + Send {
        let result = self.insert_plan(plan);
        async move { result }
    }

    fn list_plan_headers(&self) -> impl Future<Output = Result<Vec<PlanHeader>, StorageError>> + Send {
        let result = self.with_tables(|tables| {
            tables
                .plans
                .iter()
                .rev()
                .filter_map(|plan| plan.id.map(|id| PlanHeader { id, name: plan.name.clone() }))
                .collect()
        });
        async move { result }
    }

    fn get_plan(&self, id: i64) -> impl Future<Output = Result<MissionPlan, StorageError>> + Send {
        let result = self
            .with_tables(|tables| tables.plans.iter().find(|plan| plan.id == Some(id)).cloned())
            .and_then(|found| found.ok_or(StorageError::NotFound(id)));
        async move { result }
    }
}
