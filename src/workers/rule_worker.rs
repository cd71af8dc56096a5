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

//! 规则工作器执行框架
//!
//! 框架负责作业生命周期，评估器只负责规则本身：
//! - 评估在阻塞线程池中运行，并受评估超时约束
//! - 评估器崩溃、超时或返回错误都被转换为作业失败
//! - 每次执行恰好向编排器回报一次：完成或失败

use async_trait::async_trait;
use metrics::histogram;
use std::any::Any;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

use crate::application::orchestrator::Orchestrator;
use crate::domain::models::asset::{find_asset, AssetKind, AssetRef, PageMetadata};
use crate::domain::models::failure::{FailureCode, FailureReason};
use crate::domain::models::finding::NewFinding;
use crate::domain::models::task::{EvaluateTaskPayload, Task, TaskType};
use crate::domain::repositories::asset_store::AssetStore;
use crate::queue::task_queue::TaskQueue;
use crate::rules::{PageSnapshot, RuleError, WorkerRegistry};
use crate::utils::errors::WorkerError;
use crate::workers::worker::Worker;

/// 一次作业执行的结果
#[derive(Debug)]
pub enum JobOutcome {
    Completed(Vec<NewFinding>),
    Failed(FailureReason),
    /// 作业已经结束（重复投递），不再回报
    Skipped,
}

/// 规则工作器
pub struct RuleWorker {
    queue: Arc<dyn TaskQueue>,
    orchestrator: Arc<Orchestrator>,
    registry: Arc<WorkerRegistry>,
    store: Arc<dyn AssetStore>,
    evaluation_timeout: Duration,
    poll_interval: Duration,
    worker_id: Uuid,
    name: String,
}

impl RuleWorker {
    pub fn new(
        queue: Arc<dyn TaskQueue>,
        orchestrator: Arc<Orchestrator>,
        registry: Arc<WorkerRegistry>,
        store: Arc<dyn AssetStore>,
        evaluation_timeout: Duration,
        poll_interval: Duration,
    ) -> Self {
        let worker_id = Uuid::new_v4();
        Self {
            queue,
            orchestrator,
            registry,
            store,
            evaluation_timeout,
            poll_interval,
            worker_id,
            name: format!("rules-{}", worker_id),
        }
    }

    #[instrument(skip(self, task), fields(task_id = %task.id, analysis_id = %task.analysis_id))]
    async fn process_task(&self, task: Task) -> Result<(), WorkerError> {
        let payload = match task.evaluate_payload() {
            Ok(payload) => payload,
            Err(e) => {
                warn!("Malformed evaluation payload: {}", e);
                let reported = match task.job_id {
                    Some(job_id) => self
                        .orchestrator
                        .on_job_failed(
                            job_id,
                            FailureReason::new(
                                FailureCode::RuleEvaluationError,
                                format!("malformed task payload: {}", e),
                            ),
                        )
                        .await
                        .map_err(WorkerError::from),
                    None => Ok(()),
                };
                return self.settle(&task, reported).await;
            }
        };

        let reported = match self.execute(&payload).await {
            Ok(JobOutcome::Completed(findings)) => self
                .orchestrator
                .on_job_complete(payload.job_id, findings)
                .await
                .map_err(WorkerError::from),
            Ok(JobOutcome::Failed(reason)) => self
                .orchestrator
                .on_job_failed(payload.job_id, reason)
                .await
                .map_err(WorkerError::from),
            Ok(JobOutcome::Skipped) => Ok(()),
            Err(e) => Err(e),
        };

        self.settle(&task, reported).await
    }

    /// 回报成功时完成任务，否则交给重新投递
    async fn settle(&self, task: &Task, reported: Result<(), WorkerError>) -> Result<(), WorkerError> {
        match reported {
            Ok(()) => self.queue.complete(task.id).await?,
            Err(e) => {
                warn!("Failed to report job outcome: {}", e);
                self.queue.fail(task, &e.to_string()).await?;
            }
        }
        Ok(())
    }

    /// 执行一个作业
    ///
    /// 作业已结束时返回 `Skipped`；其余情况总是给出完成或失败之一
    #[instrument(skip(self, payload), fields(job_id = %payload.job_id, category = %payload.category))]
    pub async fn execute(&self, payload: &EvaluateTaskPayload) -> Result<JobOutcome, WorkerError> {
        match self.orchestrator.find_job(payload.job_id).await? {
            Some(job) if !job.status.is_terminal() => {}
            Some(job) => {
                info!(status = %job.status, "Job already terminal, skipping redelivered task");
                return Ok(JobOutcome::Skipped);
            }
            None => {
                warn!("Job not found, skipping task");
                return Ok(JobOutcome::Skipped);
            }
        }

        self.orchestrator.on_job_started(payload.job_id).await?;
        Ok(self.evaluate(payload).await)
    }

    async fn evaluate(&self, payload: &EvaluateTaskPayload) -> JobOutcome {
        let Some(evaluator) = self.registry.get(payload.category) else {
            return JobOutcome::Failed(FailureReason::new(
                FailureCode::RuleEvaluationError,
                format!("no evaluator registered for {}", payload.category),
            ));
        };

        let snapshot = match load_snapshot(self.store.as_ref(), &payload.assets).await {
            Ok(snapshot) => snapshot,
            Err(e) => {
                return JobOutcome::Failed(FailureReason::new(
                    FailureCode::RuleEvaluationError,
                    e.to_string(),
                ))
            }
        };

        let started = Instant::now();
        // 超时后阻塞线程上的评估不会被中断，只是结果被丢弃
        let handle = tokio::task::spawn_blocking(move || evaluator.evaluate(&snapshot));
        let result = tokio::time::timeout(self.evaluation_timeout, handle).await;
        histogram!("rule_evaluation_seconds", "category" => payload.category.to_string())
            .record(started.elapsed().as_secs_f64());

        match result {
            Err(_) => JobOutcome::Failed(FailureReason::new(
                FailureCode::WorkerTimeout,
                format!("evaluation exceeded {:?}", self.evaluation_timeout),
            )),
            Ok(Err(join_err)) => {
                let message = if join_err.is_panic() {
                    panic_message(join_err.into_panic())
                } else {
                    join_err.to_string()
                };
                JobOutcome::Failed(FailureReason::new(
                    FailureCode::WorkerCrash,
                    format!("evaluator crashed: {}", message),
                ))
            }
            Ok(Ok(Err(rule_err))) => JobOutcome::Failed(FailureReason::new(
                FailureCode::RuleEvaluationError,
                rule_err.to_string(),
            )),
            Ok(Ok(Ok(findings))) => {
                debug!(findings = findings.len(), "Evaluation finished");
                JobOutcome::Completed(findings)
            }
        }
    }
}

fn panic_message(payload: Box<dyn Any + Send>) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        message.to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic".to_string()
    }
}

/// 从资源存储还原页面快照
pub async fn load_snapshot(
    store: &dyn AssetStore,
    assets: &[AssetRef],
) -> Result<PageSnapshot, RuleError> {
    let read = move |kind: AssetKind| async move {
        let asset = find_asset(assets, kind).ok_or(RuleError::MissingAsset(kind))?;
        store
            .get(&asset.locator)
            .await
            .map_err(|e| RuleError::Evaluation(format!("failed to read {}: {}", kind, e)))?
            .ok_or(RuleError::MissingAsset(kind))
    };

    let html = String::from_utf8_lossy(&read(AssetKind::Html).await?).into_owned();
    let metadata: PageMetadata = serde_json::from_slice(&read(AssetKind::Metadata).await?)
        .map_err(|e| RuleError::Evaluation(format!("unreadable metadata: {}", e)))?;
    let screenshots = assets
        .iter()
        .map(|a| a.kind)
        .filter(|k| matches!(k, AssetKind::DesktopScreenshot | AssetKind::MobileScreenshot))
        .collect();

    Ok(PageSnapshot {
        html,
        metadata,
        screenshots,
    })
}

#[async_trait]
impl Worker for RuleWorker {
    async fn process_next(&self) -> Result<bool, WorkerError> {
        match self.queue.dequeue(self.worker_id, TaskType::Evaluate).await? {
            Some(task) => {
                self.process_task(task).await?;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn poll_interval(&self) -> Duration {
        self.poll_interval
    }
}

#[cfg(test)]
#[path = "rule_worker_test.rs"]
mod tests;
