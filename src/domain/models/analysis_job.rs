// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

use super::category::RuleCategory;
use super::failure::FailureReason;

/// 分析作业实体
///
/// 一个规则类别在一次分析中的工作单元。每个作业只属于一个分析，
/// 只能由对应的工作器（标记 running/completed/failed）和编排器（超时强制失败）修改。
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalysisJob {
    /// 作业唯一标识符
    pub id: Uuid,
    /// 所属分析
    pub analysis_id: Uuid,
    /// 规则类别
    pub category: RuleCategory,
    /// 作业状态
    pub status: JobStatus,
    /// 失败原因
    pub error: Option<FailureReason>,
    /// 已持久化的问题数量
    pub findings_count: i32,
    /// 创建时间
    pub created_at: DateTime<Utc>,
    /// 更新时间
    pub updated_at: DateTime<Utc>,
    /// 开始执行时间
    pub started_at: Option<DateTime<Utc>>,
    /// 完成时间
    pub completed_at: Option<DateTime<Utc>>,
    /// 截止时间，超过后由清扫器强制失败
    pub deadline_at: DateTime<Utc>,
}

/// 作业状态
///
/// Pending → Running → Completed/Failed
/// Pending → Completed/Failed（工作器直接回报或清扫超时）
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    #[default]
    Pending,
    Running,
    Completed,
    Failed,
}

impl JobStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, JobStatus::Completed | JobStatus::Failed)
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            JobStatus::Pending => write!(f, "pending"),
            JobStatus::Running => write!(f, "running"),
            JobStatus::Completed => write!(f, "completed"),
            JobStatus::Failed => write!(f, "failed"),
        }
    }
}

impl FromStr for JobStatus {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(JobStatus::Pending),
            "running" => Ok(JobStatus::Running),
            "completed" => Ok(JobStatus::Completed),
            "failed" => Ok(JobStatus::Failed),
            _ => Err(()),
        }
    }
}

impl AnalysisJob {
    /// 为某个分析创建一个待处理作业
    ///
    /// `timeout` 决定作业的截止时间
    pub fn new(analysis_id: Uuid, category: RuleCategory, timeout: Duration) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            analysis_id,
            category,
            status: JobStatus::Pending,
            error: None,
            findings_count: 0,
            created_at: now,
            updated_at: now,
            started_at: None,
            completed_at: None,
            deadline_at: now + timeout,
        }
    }

    /// 作业是否已超过截止时间且仍未结束
    pub fn is_overdue(&self, now: DateTime<Utc>) -> bool {
        !self.status.is_terminal() && self.deadline_at <= now
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_job_is_pending_with_deadline() {
        let job = AnalysisJob::new(Uuid::new_v4(), RuleCategory::Seo, Duration::minutes(5));
        assert_eq!(job.status, JobStatus::Pending);
        assert_eq!(job.deadline_at - job.created_at, Duration::minutes(5));
    }

    #[test]
    fn test_overdue_only_when_not_terminal() {
        let mut job = AnalysisJob::new(Uuid::new_v4(), RuleCategory::Media, Duration::minutes(1));
        let later = Utc::now() + Duration::minutes(2);
        assert!(job.is_overdue(later));

        job.status = JobStatus::Completed;
        assert!(!job.is_overdue(later));
    }
}
