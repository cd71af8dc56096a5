// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

use super::asset::AssetRef;
use super::category::RuleCategory;

/// 投递任务实体
///
/// 任务是投递通道上的消息，而不是业务记录：同一个任务可能被投递多次
/// （锁过期后重新投递），消费方必须通过作业/分析状态保证幂等。
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Task {
    /// 任务唯一标识符
    pub id: Uuid,
    /// 任务类型
    pub task_type: TaskType,
    /// 任务状态
    pub status: TaskStatus,
    /// 所属分析
    pub analysis_id: Uuid,
    /// 对应的作业（仅评估任务）
    pub job_id: Option<Uuid>,
    /// 任务负载
    pub payload: serde_json::Value,
    /// 已投递次数
    pub attempt_count: i32,
    /// 最大投递次数
    pub max_attempts: i32,
    /// 最近一次失败信息
    pub last_error: Option<String>,
    /// 计划执行时间
    pub scheduled_at: Option<DateTime<Utc>>,
    /// 锁定令牌（持有任务的工作器 ID）
    pub lock_token: Option<Uuid>,
    /// 锁定过期时间，过期后任务会被重新投递
    pub lock_expires_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
}

/// 任务类型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskType {
    /// 抓取目标页面
    Fetch,
    /// 评估一个规则类别
    Evaluate,
}

impl fmt::Display for TaskType {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            TaskType::Fetch => write!(f, "fetch"),
            TaskType::Evaluate => write!(f, "evaluate"),
        }
    }
}

impl FromStr for TaskType {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "fetch" => Ok(TaskType::Fetch),
            "evaluate" => Ok(TaskType::Evaluate),
            _ => Err(()),
        }
    }
}

/// 任务状态
///
/// Queued → Active → Completed/Failed
/// Active → Queued（失败重试或锁过期重新投递）
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    #[default]
    Queued,
    Active,
    Completed,
    Failed,
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            TaskStatus::Queued => write!(f, "queued"),
            TaskStatus::Active => write!(f, "active"),
            TaskStatus::Completed => write!(f, "completed"),
            TaskStatus::Failed => write!(f, "failed"),
        }
    }
}

impl FromStr for TaskStatus {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "queued" => Ok(TaskStatus::Queued),
            "active" => Ok(TaskStatus::Active),
            "completed" => Ok(TaskStatus::Completed),
            "failed" => Ok(TaskStatus::Failed),
            _ => Err(()),
        }
    }
}

/// 抓取任务负载
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FetchTaskPayload {
    pub analysis_id: Uuid,
    pub target_url: String,
}

/// 评估任务负载
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvaluateTaskPayload {
    pub analysis_id: Uuid,
    pub job_id: Uuid,
    pub category: RuleCategory,
    pub assets: Vec<AssetRef>,
}

impl Task {
    fn with_payload(
        task_type: TaskType,
        analysis_id: Uuid,
        job_id: Option<Uuid>,
        payload: serde_json::Value,
        max_attempts: i32,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            task_type,
            status: TaskStatus::Queued,
            analysis_id,
            job_id,
            payload,
            attempt_count: 0,
            max_attempts,
            last_error: None,
            scheduled_at: None,
            lock_token: None,
            lock_expires_at: None,
            created_at: now,
            updated_at: now,
            started_at: None,
            completed_at: None,
        }
    }

    /// 创建抓取任务
    pub fn fetch(payload: &FetchTaskPayload, max_attempts: i32) -> Result<Self, serde_json::Error> {
        Ok(Self::with_payload(
            TaskType::Fetch,
            payload.analysis_id,
            None,
            serde_json::to_value(payload)?,
            max_attempts,
        ))
    }

    /// 创建评估任务
    pub fn evaluate(
        payload: &EvaluateTaskPayload,
        max_attempts: i32,
    ) -> Result<Self, serde_json::Error> {
        Ok(Self::with_payload(
            TaskType::Evaluate,
            payload.analysis_id,
            Some(payload.job_id),
            serde_json::to_value(payload)?,
            max_attempts,
        ))
    }

    /// 反序列化抓取负载
    pub fn fetch_payload(&self) -> Result<FetchTaskPayload, serde_json::Error> {
        serde_json::from_value(self.payload.clone())
    }

    /// 反序列化评估负载
    pub fn evaluate_payload(&self) -> Result<EvaluateTaskPayload, serde_json::Error> {
        serde_json::from_value(self.payload.clone())
    }

    /// 判断任务是否还能重新投递
    pub fn can_retry(&self) -> bool {
        self.attempt_count < self.max_attempts
    }
}
