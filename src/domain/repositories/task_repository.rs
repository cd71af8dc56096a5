// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use super::RepositoryError;
use crate::domain::models::task::{Task, TaskType};
use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use uuid::Uuid;

/// 任务仓库特质
///
/// 投递通道的持久化接口
#[async_trait]
pub trait TaskRepository: Send + Sync {
    /// 创建新任务
    async fn create(&self, task: &Task) -> Result<Task, RepositoryError>;
    /// 根据ID查找任务
    async fn find_by_id(&self, id: Uuid) -> Result<Option<Task>, RepositoryError>;
    /// 获取并锁定下一个指定类型的待处理任务
    async fn acquire_next(
        &self,
        worker_id: Uuid,
        task_type: TaskType,
        lock_duration: Duration,
    ) -> Result<Option<Task>, RepositoryError>;
    /// 标记任务已完成
    async fn mark_completed(&self, id: Uuid) -> Result<(), RepositoryError>;
    /// 记录失败并在 `run_at` 重新入队
    async fn requeue(
        &self,
        id: Uuid,
        error: &str,
        run_at: DateTime<Utc>,
    ) -> Result<(), RepositoryError>;
    /// 标记任务最终失败
    async fn mark_failed(&self, id: Uuid, error: &str) -> Result<(), RepositoryError>;
    /// 释放已过期的锁，使任务重新可被获取
    async fn release_expired_locks(&self, now: DateTime<Utc>) -> Result<u64, RepositoryError>;
}
