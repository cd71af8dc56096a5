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

use async_trait::async_trait;
use metrics::histogram;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{info, instrument, warn};
use uuid::Uuid;

use crate::application::fetcher::Fetcher;
use crate::application::orchestrator::Orchestrator;
use crate::domain::models::analysis::AnalysisStatus;
use crate::domain::models::task::{Task, TaskType};
use crate::queue::task_queue::TaskQueue;
use crate::utils::errors::WorkerError;
use crate::workers::worker::Worker;

/// 抓取工作器
///
/// 消费抓取任务，成功时回报 `on_fetch_complete`，失败时回报 `on_fetch_failed`。
/// 抓取失败不会重试，只有回报本身失败时任务才会重新投递。
pub struct FetchWorker {
    queue: Arc<dyn TaskQueue>,
    orchestrator: Arc<Orchestrator>,
    fetcher: Arc<Fetcher>,
    poll_interval: Duration,
    worker_id: Uuid,
    name: String,
}

impl FetchWorker {
    pub fn new(
        queue: Arc<dyn TaskQueue>,
        orchestrator: Arc<Orchestrator>,
        fetcher: Arc<Fetcher>,
        poll_interval: Duration,
    ) -> Self {
        let worker_id = Uuid::new_v4();
        Self {
            queue,
            orchestrator,
            fetcher,
            poll_interval,
            worker_id,
            name: format!("fetch-{}", worker_id),
        }
    }

    #[instrument(skip(self, task), fields(task_id = %task.id, analysis_id = %task.analysis_id))]
    async fn process_task(&self, task: Task) -> Result<(), WorkerError> {
        let payload = match task.fetch_payload() {
            Ok(payload) => payload,
            Err(e) => {
                warn!("Malformed fetch payload: {}", e);
                self.queue.fail(&task, &e.to_string()).await?;
                return Ok(());
            }
        };

        // 重复投递的任务不能覆盖已被作业读取的快照
        match self.orchestrator.find_analysis(payload.analysis_id).await? {
            Some(analysis) if analysis.status == AnalysisStatus::Pending => {}
            Some(analysis) => {
                info!(status = %analysis.status, "Analysis already past pending, skipping fetch");
                self.queue.complete(task.id).await?;
                return Ok(());
            }
            None => {
                warn!("Analysis not found, dropping fetch task");
                self.queue.complete(task.id).await?;
                return Ok(());
            }
        }

        let started = Instant::now();
        let fetched = self.fetcher.fetch(payload.analysis_id, &payload.target_url).await;
        histogram!("fetch_duration_seconds").record(started.elapsed().as_secs_f64());

        let reported = match fetched {
            Ok(assets) => {
                self.orchestrator
                    .on_fetch_complete(payload.analysis_id, assets)
                    .await
            }
            Err(e) => {
                warn!("Fetch failed: {}", e);
                self.orchestrator
                    .on_fetch_failed(payload.analysis_id, e.to_reason())
                    .await
                    .map(|_| ())
            }
        };

        match reported {
            Ok(()) => self.queue.complete(task.id).await?,
            Err(e) => {
                // 编排器的回调是幂等的，交给重新投递
                warn!("Failed to report fetch outcome: {}", e);
                self.queue.fail(&task, &e.to_string()).await?;
            }
        }
        Ok(())
    }
}

#[async_trait]
impl Worker for FetchWorker {
    async fn process_next(&self) -> Result<bool, WorkerError> {
        match self.queue.dequeue(self.worker_id, TaskType::Fetch).await? {
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
