// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use crate::domain::models::task::{Task, TaskType};
use crate::domain::repositories::task_repository::TaskRepository;
use crate::domain::repositories::RepositoryError;
use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, warn};
use uuid::Uuid;

/// 队列错误类型
#[derive(Error, Debug)]
pub enum QueueError {
    /// 仓库错误
    #[error("Repository error: {0}")]
    Repository(#[from] RepositoryError),

    /// 投递通道不可用
    #[error("Dispatch transport unavailable: {0}")]
    Unavailable(String),
}

/// 任务队列特质
///
/// 至少一次投递：锁过期的任务会被重新投递，消费方必须幂等
#[async_trait]
pub trait TaskQueue: Send + Sync {
    /// 入队任务
    async fn enqueue(&self, task: Task) -> Result<Task, QueueError>;

    /// 出队指定类型的任务
    async fn dequeue(&self, worker_id: Uuid, task_type: TaskType)
        -> Result<Option<Task>, QueueError>;

    /// 完成任务
    async fn complete(&self, task_id: Uuid) -> Result<(), QueueError>;

    /// 失败任务
    ///
    /// 仍有投递次数时按线性退避重新入队，否则最终失败
    async fn fail(&self, task: &Task, error: &str) -> Result<(), QueueError>;

    /// 释放过期锁，返回重新入队的任务数
    async fn release_expired_locks(&self, now: DateTime<Utc>) -> Result<u64, QueueError>;
}

/// 基于数据库的任务队列实现
pub struct DatabaseTaskQueue<R: TaskRepository> {
    /// 任务仓库
    repository: Arc<R>,
    /// 任务锁定时长
    lock_duration: Duration,
    /// 每次重试增加的退避时间
    retry_backoff: Duration,
}

impl<R: TaskRepository> DatabaseTaskQueue<R> {
    /// 创建新的任务队列实例
    ///
    /// # 参数
    ///
    /// * `repository` - 任务仓库
    /// * `lock_duration` - 出队后任务的锁定时长，超过后任务会被重新投递
    pub fn new(repository: Arc<R>, lock_duration: Duration) -> Self {
        Self {
            repository,
            lock_duration,
            retry_backoff: Duration::seconds(5),
        }
    }

    pub fn with_retry_backoff(mut self, backoff: Duration) -> Self {
        self.retry_backoff = backoff;
        self
    }
}

#[async_trait]
impl<R: TaskRepository> TaskQueue for DatabaseTaskQueue<R> {
    async fn enqueue(&self, task: Task) -> Result<Task, QueueError> {
        let created = self.repository.create(&task).await?;
        debug!(
            task_id = %created.id,
            task_type = %created.task_type,
            analysis_id = %created.analysis_id,
            "Task enqueued"
        );
        Ok(created)
    }

    async fn dequeue(
        &self,
        worker_id: Uuid,
        task_type: TaskType,
    ) -> Result<Option<Task>, QueueError> {
        let task = self
            .repository
            .acquire_next(worker_id, task_type, self.lock_duration)
            .await?;
        Ok(task)
    }

    async fn complete(&self, task_id: Uuid) -> Result<(), QueueError> {
        self.repository.mark_completed(task_id).await?;
        Ok(())
    }

    async fn fail(&self, task: &Task, error: &str) -> Result<(), QueueError> {
        if task.can_retry() {
            let run_at = Utc::now() + self.retry_backoff * task.attempt_count.max(1);
            warn!(
                task_id = %task.id,
                attempt = task.attempt_count,
                "Task failed, requeueing: {}",
                error
            );
            self.repository.requeue(task.id, error, run_at).await?;
        } else {
            warn!(
                task_id = %task.id,
                attempt = task.attempt_count,
                "Task failed permanently: {}",
                error
            );
            self.repository.mark_failed(task.id, error).await?;
        }
        Ok(())
    }

    async fn release_expired_locks(&self, now: DateTime<Utc>) -> Result<u64, QueueError> {
        Ok(self.repository.release_expired_locks(now).await?)
    }
}

#[async_trait]
impl<T: TaskQueue + ?Sized> TaskQueue for Arc<T> {
    async fn enqueue(&self, task: Task) -> Result<Task, QueueError> {
        (**self).enqueue(task).await
    }

    async fn dequeue(
        &self,
        worker_id: Uuid,
        task_type: TaskType,
    ) -> Result<Option<Task>, QueueError> {
        (**self).dequeue(worker_id, task_type).await
    }

    async fn complete(&self, task_id: Uuid) -> Result<(), QueueError> {
        (**self).complete(task_id).await
    }

    async fn fail(&self, task: &Task, error: &str) -> Result<(), QueueError> {
        (**self).fail(task, error).await
    }

    async fn release_expired_locks(&self, now: DateTime<Utc>) -> Result<u64, QueueError> {
        (**self).release_expired_locks(now).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::models::task::{FetchTaskPayload, TaskStatus};
    use crate::infrastructure::repositories::task_repo_impl::TaskRepositoryImpl;
    use crate::infrastructure::repositories::test_support::memory_db;

    async fn queue() -> (DatabaseTaskQueue<TaskRepositoryImpl>, Arc<TaskRepositoryImpl>) {
        let repo = Arc::new(TaskRepositoryImpl::new(memory_db().await));
        let queue = DatabaseTaskQueue::new(repo.clone(), Duration::minutes(2))
            .with_retry_backoff(Duration::zero());
        (queue, repo)
    }

    fn fetch_task(max_attempts: i32) -> Task {
        Task::fetch(
            &FetchTaskPayload {
                analysis_id: Uuid::new_v4(),
                target_url: "https://example.com/".to_string(),
            },
            max_attempts,
        )
        .unwrap()
    }

    #[tokio::test]
    async fn test_fail_requeues_until_attempts_exhausted() {
        let (queue, repo) = queue().await;
        let task = queue.enqueue(fetch_task(2)).await.unwrap();
        let worker = Uuid::new_v4();

        let first = queue.dequeue(worker, TaskType::Fetch).await.unwrap().unwrap();
        queue.fail(&first, "transient").await.unwrap();
        assert_eq!(
            repo.find_by_id(task.id).await.unwrap().unwrap().status,
            TaskStatus::Queued
        );

        let second = queue.dequeue(worker, TaskType::Fetch).await.unwrap().unwrap();
        assert_eq!(second.attempt_count, 2);
        queue.fail(&second, "still broken").await.unwrap();
        assert_eq!(
            repo.find_by_id(task.id).await.unwrap().unwrap().status,
            TaskStatus::Failed
        );
        assert!(queue.dequeue(worker, TaskType::Fetch).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_complete_task() {
        let (queue, repo) = queue().await;
        let task = queue.enqueue(fetch_task(3)).await.unwrap();
        let taken = queue
            .dequeue(Uuid::new_v4(), TaskType::Fetch)
            .await
            .unwrap()
            .unwrap();
        queue.complete(taken.id).await.unwrap();

        let stored = repo.find_by_id(task.id).await.unwrap().unwrap();
        assert_eq!(stored.status, TaskStatus::Completed);
        assert!(stored.completed_at.is_some());
    }
}
