// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use super::RepositoryError;
use crate::domain::models::analysis_job::AnalysisJob;
use crate::domain::models::failure::FailureReason;
use crate::domain::models::finding::Finding;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

/// 分析作业仓库特质
///
/// 终态作业不可再修改：所有写操作只对 pending/running 的作业生效
#[async_trait]
pub trait AnalysisJobRepository: Send + Sync {
    /// 根据ID查找作业
    async fn find_by_id(&self, id: Uuid) -> Result<Option<AnalysisJob>, RepositoryError>;

    /// 查找分析下的全部作业
    async fn find_by_analysis(&self, analysis_id: Uuid)
        -> Result<Vec<AnalysisJob>, RepositoryError>;

    /// pending → running
    async fn mark_running(&self, id: Uuid) -> Result<bool, RepositoryError>;

    /// 在同一个事务中将作业标记为完成并写入问题
    ///
    /// 作业已是终态时不写入任何问题并返回 `Ok(false)`
    async fn complete_with_findings(
        &self,
        id: Uuid,
        findings: &[Finding],
    ) -> Result<bool, RepositoryError>;

    /// pending/running → failed
    async fn mark_failed(&self, id: Uuid, reason: &FailureReason)
        -> Result<bool, RepositoryError>;

    /// 将截止时间早于 `now` 的未结束作业强制失败
    ///
    /// # 返回值
    ///
    /// 返回本次调用真正转换为失败的作业
    async fn fail_overdue(
        &self,
        now: DateTime<Utc>,
        reason: &FailureReason,
    ) -> Result<Vec<AnalysisJob>, RepositoryError>;
}
