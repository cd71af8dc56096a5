// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use super::RepositoryError;
use crate::domain::models::analysis::Analysis;
use crate::domain::models::analysis_job::AnalysisJob;
use crate::domain::models::failure::FailureReason;
use crate::domain::services::scoring_service::AnalysisOutcome;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

/// 分析仓库特质
///
/// 所有状态写入都是条件更新（比较并交换），返回值表示本次调用是否真正完成了转换。
/// 这是在至少一次投递语义下实现幂等和“只终结一次”的基础。
#[async_trait]
pub trait AnalysisRepository: Send + Sync {
    /// 创建分析记录
    async fn create(&self, analysis: &Analysis) -> Result<Analysis, RepositoryError>;

    /// 根据ID查找分析
    async fn find_by_id(&self, id: Uuid) -> Result<Option<Analysis>, RepositoryError>;

    /// 在同一个事务中将分析从 pending 转为 processing 并写入作业
    ///
    /// # 返回值
    ///
    /// * `Ok(true)` - 转换成功，作业已创建
    /// * `Ok(false)` - 分析已不在 pending 状态，未做任何修改
    async fn start_processing(
        &self,
        id: Uuid,
        jobs: &[AnalysisJob],
    ) -> Result<bool, RepositoryError>;

    /// 将 pending 状态的分析直接标记为失败
    async fn fail_pending(&self, id: Uuid, reason: &FailureReason)
        -> Result<bool, RepositoryError>;

    /// 将 processing 状态的分析写入终态和得分
    ///
    /// 状态、得分和缺失类别在一条更新语句中写入，读者不会看到中间状态
    async fn finalize(&self, id: Uuid, outcome: &AnalysisOutcome)
        -> Result<bool, RepositoryError>;

    /// 查找创建时间早于 `created_before` 仍处于 pending 的分析
    async fn find_stale_pending(
        &self,
        created_before: DateTime<Utc>,
    ) -> Result<Vec<Uuid>, RepositoryError>;

    /// 查找最后更新时间早于 `updated_before` 仍处于 processing 的分析
    async fn find_stale_processing(
        &self,
        updated_before: DateTime<Utc>,
    ) -> Result<Vec<Uuid>, RepositoryError>;
}
