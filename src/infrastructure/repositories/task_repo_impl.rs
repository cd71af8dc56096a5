// Copyright 2025 Kirky.X
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

use crate::domain::models::task::{Task, TaskStatus, TaskType};
use crate::domain::repositories::task_repository::TaskRepository;
use crate::domain::repositories::RepositoryError;
use crate::infrastructure::database::entities::task as task_entity;
use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use sea_orm::{
    sea_query::{Expr, LockBehavior, LockType},
    ActiveModelTrait, ColumnTrait, Condition, DatabaseConnection, EntityTrait, QueryFilter,
    QueryOrder, QuerySelect, Set, TransactionTrait,
};
use std::sync::Arc;
use uuid::Uuid;

use super::{from_db_time, parse_column, to_db_time};

/// 任务仓库实现
///
/// 基于SeaORM实现的任务数据访问层
#[derive(Clone)]
pub struct TaskRepositoryImpl {
    /// 数据库连接
    db: Arc<DatabaseConnection>,
}

impl TaskRepositoryImpl {
    /// 创建新的任务仓库实例
    ///
    /// # 参数
    ///
    /// * `db` - 数据库连接
    pub fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }
}

impl TryFrom<task_entity::Model> for Task {
    type Error = RepositoryError;

    fn try_from(model: task_entity::Model) -> Result<Self, Self::Error> {
        Ok(Self {
            id: model.id,
            task_type: parse_column("task_type", &model.task_type)?,
            status: parse_column("task status", &model.status)?,
            analysis_id: model.analysis_id,
            job_id: model.job_id,
            payload: model.payload,
            attempt_count: model.attempt_count,
            max_attempts: model.max_attempts,
            last_error: model.last_error,
            scheduled_at: model.scheduled_at.map(from_db_time),
            lock_token: model.lock_token,
            lock_expires_at: model.lock_expires_at.map(from_db_time),
            created_at: from_db_time(model.created_at),
            updated_at: from_db_time(model.updated_at),
            started_at: model.started_at.map(from_db_time),
            completed_at: model.completed_at.map(from_db_time),
        })
    }
}

impl From<&Task> for task_entity::ActiveModel {
    fn from(task: &Task) -> Self {
        Self {
            id: Set(task.id),
            task_type: Set(task.task_type.to_string()),
            status: Set(task.status.to_string()),
            analysis_id: Set(task.analysis_id),
            job_id: Set(task.job_id),
            payload: Set(task.payload.clone()),
            attempt_count: Set(task.attempt_count),
            max_attempts: Set(task.max_attempts),
            last_error: Set(task.last_error.clone()),
            scheduled_at: Set(task.scheduled_at.map(to_db_time)),
            lock_token: Set(task.lock_token),
            lock_expires_at: Set(task.lock_expires_at.map(to_db_time)),
            created_at: Set(to_db_time(task.created_at)),
            updated_at: Set(to_db_time(task.updated_at)),
            started_at: Set(task.started_at.map(to_db_time)),
            completed_at: Set(task.completed_at.map(to_db_time)),
        }
    }
}

#[async_trait]
impl TaskRepository for TaskRepositoryImpl {
    async fn create(&self, task: &Task) -> Result<Task, RepositoryError> {
        let model: task_entity::ActiveModel = task.into();
        model.insert(self.db.as_ref()).await?;
        Ok(task.clone())
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<Task>, RepositoryError> {
        task_entity::Entity::find_by_id(id)
            .one(self.db.as_ref())
            .await?
            .map(Task::try_from)
            .transpose()
    }

    async fn acquire_next(
        &self,
        worker_id: Uuid,
        task_type: TaskType,
        lock_duration: Duration,
    ) -> Result<Option<Task>, RepositoryError> {
        let now = Utc::now();
        let txn = self.db.begin().await?;

        let task = task_entity::Entity::find()
            .filter(task_entity::Column::Status.eq(TaskStatus::Queued.to_string()))
            .filter(task_entity::Column::TaskType.eq(task_type.to_string()))
            .filter(
                Condition::any()
                    .add(task_entity::Column::ScheduledAt.is_null())
                    .add(task_entity::Column::ScheduledAt.lte(to_db_time(now))),
            )
            .order_by_asc(task_entity::Column::CreatedAt)
            .lock_with_behavior(LockType::Update, LockBehavior::SkipLocked)
            .one(&txn)
            .await?;

        let Some(task) = task else {
            txn.commit().await?;
            return Ok(None);
        };

        let attempt_count = task.attempt_count + 1;
        let mut active: task_entity::ActiveModel = task.into();
        active.status = Set(TaskStatus::Active.to_string());
        active.lock_token = Set(Some(worker_id));
        active.lock_expires_at = Set(Some(to_db_time(now + lock_duration)));
        active.started_at = Set(Some(to_db_time(now)));
        active.updated_at = Set(to_db_time(now));
        active.attempt_count = Set(attempt_count);

        let updated = active.update(&txn).await?;
        txn.commit().await?;

        Ok(Some(Task::try_from(updated)?))
    }

    async fn mark_completed(&self, id: Uuid) -> Result<(), RepositoryError> {
        let now = to_db_time(Utc::now());
        let result = task_entity::Entity::update_many()
            .col_expr(
                task_entity::Column::Status,
                Expr::value(TaskStatus::Completed.to_string()),
            )
            .col_expr(task_entity::Column::LockToken, Expr::value(Option::<Uuid>::None))
            .col_expr(task_entity::Column::CompletedAt, Expr::value(Some(now)))
            .col_expr(task_entity::Column::UpdatedAt, Expr::value(now))
            .filter(task_entity::Column::Id.eq(id))
            .exec(self.db.as_ref())
            .await?;

        if result.rows_affected == 0 {
            return Err(RepositoryError::NotFound);
        }
        Ok(())
    }

    async fn requeue(
        &self,
        id: Uuid,
        error: &str,
        run_at: DateTime<Utc>,
    ) -> Result<(), RepositoryError> {
        let now = to_db_time(Utc::now());
        let result = task_entity::Entity::update_many()
            .col_expr(
                task_entity::Column::Status,
                Expr::value(TaskStatus::Queued.to_string()),
            )
            .col_expr(task_entity::Column::LastError, Expr::value(Some(error.to_string())))
            .col_expr(task_entity::Column::ScheduledAt, Expr::value(Some(to_db_time(run_at))))
            .col_expr(task_entity::Column::LockToken, Expr::value(Option::<Uuid>::None))
            .col_expr(
                task_entity::Column::LockExpiresAt,
                Expr::value(Option::<DateTime<chrono::FixedOffset>>::None),
            )
            .col_expr(task_entity::Column::UpdatedAt, Expr::value(now))
            .filter(task_entity::Column::Id.eq(id))
            .exec(self.db.as_ref())
            .await?;

        if result.rows_affected == 0 {
            return Err(RepositoryError::NotFound);
        }
        Ok(())
    }

    async fn mark_failed(&self, id: Uuid, error: &str) -> Result<(), RepositoryError> {
        let now = to_db_time(Utc::now());
        let result = task_entity::Entity::update_many()
            .col_expr(
                task_entity::Column::Status,
                Expr::value(TaskStatus::Failed.to_string()),
            )
            .col_expr(task_entity::Column::LastError, Expr::value(Some(error.to_string())))
            .col_expr(task_entity::Column::LockToken, Expr::value(Option::<Uuid>::None))
            .col_expr(task_entity::Column::CompletedAt, Expr::value(Some(now)))
            .col_expr(task_entity::Column::UpdatedAt, Expr::value(now))
            .filter(task_entity::Column::Id.eq(id))
            .exec(self.db.as_ref())
            .await?;

        if result.rows_affected == 0 {
            return Err(RepositoryError::NotFound);
        }
        Ok(())
    }

    async fn release_expired_locks(&self, now: DateTime<Utc>) -> Result<u64, RepositoryError> {
        let now = to_db_time(now);
        let expired = || {
            Condition::all()
                .add(task_entity::Column::Status.eq(TaskStatus::Active.to_string()))
                .add(task_entity::Column::LockExpiresAt.lte(now))
        };

        // 投递次数用尽的任务不再重新投递
        task_entity::Entity::update_many()
            .col_expr(
                task_entity::Column::Status,
                Expr::value(TaskStatus::Failed.to_string()),
            )
            .col_expr(
                task_entity::Column::LastError,
                Expr::value(Some("lock expired after final attempt".to_string())),
            )
            .col_expr(task_entity::Column::LockToken, Expr::value(Option::<Uuid>::None))
            .col_expr(task_entity::Column::CompletedAt, Expr::value(Some(now)))
            .col_expr(task_entity::Column::UpdatedAt, Expr::value(now))
            .filter(expired())
            .filter(
                Expr::col(task_entity::Column::AttemptCount)
                    .gte(Expr::col(task_entity::Column::MaxAttempts)),
            )
            .exec(self.db.as_ref())
            .await?;

        let result = task_entity::Entity::update_many()
            .col_expr(
                task_entity::Column::Status,
                Expr::value(TaskStatus::Queued.to_string()),
            )
            .col_expr(task_entity::Column::LockToken, Expr::value(Option::<Uuid>::None))
            .col_expr(
                task_entity::Column::LockExpiresAt,
                Expr::value(Option::<DateTime<chrono::FixedOffset>>::None),
            )
            .col_expr(task_entity::Column::UpdatedAt, Expr::value(now))
            .filter(expired())
            .exec(self.db.as_ref())
            .await?;

        Ok(result.rows_affected)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::models::task::FetchTaskPayload;
    use crate::infrastructure::repositories::test_support::memory_db;

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
    async fn test_acquire_locks_task() {
        let repo = TaskRepositoryImpl::new(memory_db().await);
        let task = fetch_task(3);
        repo.create(&task).await.unwrap();
        let worker = Uuid::new_v4();

        let acquired = repo
            .acquire_next(worker, TaskType::Fetch, Duration::minutes(2))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(acquired.id, task.id);
        assert_eq!(acquired.status, TaskStatus::Active);
        assert_eq!(acquired.lock_token, Some(worker));
        assert_eq!(acquired.attempt_count, 1);

        // 已被锁定的任务不会被第二次获取
        assert!(repo
            .acquire_next(Uuid::new_v4(), TaskType::Fetch, Duration::minutes(2))
            .await
            .unwrap()
            .is_none());
    }

    #[tokio::test]
    async fn test_acquire_filters_by_type() {
        let repo = TaskRepositoryImpl::new(memory_db().await);
        repo.create(&fetch_task(3)).await.unwrap();

        assert!(repo
            .acquire_next(Uuid::new_v4(), TaskType::Evaluate, Duration::minutes(2))
            .await
            .unwrap()
            .is_none());
    }

    #[tokio::test]
    async fn test_requeue_respects_schedule() {
        let repo = TaskRepositoryImpl::new(memory_db().await);
        let task = fetch_task(3);
        repo.create(&task).await.unwrap();
        repo.acquire_next(Uuid::new_v4(), TaskType::Fetch, Duration::minutes(2))
            .await
            .unwrap();

        repo.requeue(task.id, "boom", Utc::now() + Duration::minutes(10))
            .await
            .unwrap();
        assert!(repo
            .acquire_next(Uuid::new_v4(), TaskType::Fetch, Duration::minutes(2))
            .await
            .unwrap()
            .is_none());

        let stored = repo.find_by_id(task.id).await.unwrap().unwrap();
        assert_eq!(stored.status, TaskStatus::Queued);
        assert_eq!(stored.last_error.as_deref(), Some("boom"));
    }

    #[tokio::test]
    async fn test_release_expired_locks() {
        let repo = TaskRepositoryImpl::new(memory_db().await);
        let retryable = fetch_task(3);
        let exhausted = fetch_task(1);
        repo.create(&retryable).await.unwrap();
        repo.create(&exhausted).await.unwrap();

        for _ in 0..2 {
            repo.acquire_next(Uuid::new_v4(), TaskType::Fetch, Duration::seconds(-1))
                .await
                .unwrap()
                .unwrap();
        }

        let released = repo.release_expired_locks(Utc::now()).await.unwrap();
        assert_eq!(released, 1);
        assert_eq!(
            repo.find_by_id(retryable.id).await.unwrap().unwrap().status,
            TaskStatus::Queued
        );
        assert_eq!(
            repo.find_by_id(exhausted.id).await.unwrap().unwrap().status,
            TaskStatus::Failed
        );
    }

    #[tokio::test]
    async fn test_mark_completed_unknown_task() {
        let repo = TaskRepositoryImpl::new(memory_db().await);
        assert!(matches!(
            repo.mark_completed(Uuid::new_v4()).await,
            Err(RepositoryError::NotFound)
        ));
    }
}
