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

//! 主编排器
//!
//! 负责一次分析从请求到终态的完整生命周期：创建记录、投递抓取任务、
//! 扇出规则作业、收集每个作业的回报，并在所有作业结束后恰好终结一次。
//!
//! 编排器不持有任何按分析划分的长期任务，每个回调持久化状态后立即返回。
//! 所有状态转换都是带条件的更新，重复投递的回报只会被忽略。

use chrono::{DateTime, Utc};
use metrics::{counter, histogram};
use std::collections::BTreeSet;
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, error, info, instrument, warn};
use uuid::Uuid;

use crate::application::dto::analysis_response::AnalysisResponseDto;
use crate::config::settings::PipelineSettings;
use crate::domain::models::analysis::{Analysis, AnalysisStatus, OwnerContext};
use crate::domain::models::analysis_job::AnalysisJob;
use crate::domain::models::asset::AssetRef;
use crate::domain::models::category::RuleCategory;
use crate::domain::models::failure::{FailureCode, FailureReason};
use crate::domain::models::finding::{Finding, NewFinding};
use crate::domain::models::task::{EvaluateTaskPayload, FetchTaskPayload, Task};
use crate::domain::repositories::analysis_job_repository::AnalysisJobRepository;
use crate::domain::repositories::analysis_repository::AnalysisRepository;
use crate::domain::repositories::finding_repository::FindingRepository;
use crate::domain::repositories::RepositoryError;
use crate::domain::services::scoring_service::{summarize, ScoringPolicy};
use crate::engines::validators::normalize_target;
use crate::queue::task_queue::TaskQueue;
use crate::rules::find_rule;

/// 流水线错误类型
///
/// 只有请求期错误会同步返回给调用方；抓取期和工作器期的失败以数据形式记录
#[derive(Error, Debug)]
pub enum PipelineError {
    /// 目标 URL 无法解析
    #[error("Invalid target: {0}")]
    InvalidTarget(String),

    /// 投递通道不可用，调用方应重试整个请求
    #[error("Upstream unavailable: {0}")]
    UpstreamUnavailable(String),

    #[error("Analysis or job not found: {0}")]
    NotFound(Uuid),

    #[error("Repository error: {0}")]
    Repository(#[from] RepositoryError),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// 编排器运行参数
#[derive(Debug, Clone)]
pub struct OrchestratorConfig {
    /// 作业最长运行时间
    pub job_timeout: chrono::Duration,
    /// 分析停留在 pending 的最长时间
    pub fetch_timeout: chrono::Duration,
    /// processing 状态下重新尝试终结前的等待时间
    pub finalize_grace: chrono::Duration,
    /// 匿名分析保留时间
    pub guest_ttl: chrono::Duration,
    /// 任务最大投递次数
    pub max_task_attempts: i32,
    pub scoring: ScoringPolicy,
}

impl OrchestratorConfig {
    pub fn from_settings(pipeline: &PipelineSettings, scoring: ScoringPolicy) -> Self {
        Self {
            job_timeout: pipeline.job_timeout(),
            fetch_timeout: pipeline.fetch_timeout(),
            finalize_grace: pipeline.finalize_grace(),
            guest_ttl: pipeline.guest_ttl(),
            max_task_attempts: pipeline.max_task_attempts,
            scoring,
        }
    }
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self::from_settings(&PipelineSettings::default(), ScoringPolicy::default())
    }
}

/// 一次超时清扫的统计
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct SweepReport {
    /// 重新投递的任务数
    pub released_tasks: u64,
    /// 被强制失败的作业数
    pub reclaimed_jobs: usize,
    /// 因抓取超时而失败的分析数
    pub expired_fetches: usize,
    /// 本次清扫中终结的分析数
    pub finalized: usize,
}

/// 主编排器
pub struct Orchestrator {
    analyses: Arc<dyn AnalysisRepository>,
    jobs: Arc<dyn AnalysisJobRepository>,
    findings: Arc<dyn FindingRepository>,
    queue: Arc<dyn TaskQueue>,
    /// 适用的工作器集合（静态）
    categories: Vec<RuleCategory>,
    config: OrchestratorConfig,
}

impl Orchestrator {
    pub fn new(
        analyses: Arc<dyn AnalysisRepository>,
        jobs: Arc<dyn AnalysisJobRepository>,
        findings: Arc<dyn FindingRepository>,
        queue: Arc<dyn TaskQueue>,
        config: OrchestratorConfig,
    ) -> Self {
        Self {
            analyses,
            jobs,
            findings,
            queue,
            categories: RuleCategory::ALL.to_vec(),
            config,
        }
    }

    /// 替换适用的规则类别集合
    pub fn with_categories(mut self, categories: Vec<RuleCategory>) -> Self {
        let unique: BTreeSet<RuleCategory> = categories.into_iter().collect();
        self.categories = unique.into_iter().collect();
        self
    }

    pub fn categories(&self) -> &[RuleCategory] {
        &self.categories
    }

    /// 受理一次分析请求
    ///
    /// 创建 pending 分析并投递一个抓取任务，立即返回分析 ID。
    ///
    /// # 错误
    ///
    /// * `InvalidTarget` - URL 无法解析，不会创建任何记录
    /// * `UpstreamUnavailable` - 投递通道不可用，已创建的分析被标记为失败
    #[instrument(skip(self, owner))]
    pub async fn start_analysis(
        &self,
        target: &str,
        owner: OwnerContext,
    ) -> Result<Uuid, PipelineError> {
        let target_url =
            normalize_target(target).map_err(|e| PipelineError::InvalidTarget(e.to_string()))?;

        let analysis = Analysis::new(target_url.clone(), owner, self.config.guest_ttl);
        self.analyses.create(&analysis).await?;

        let task = Task::fetch(
            &FetchTaskPayload {
                analysis_id: analysis.id,
                target_url,
            },
            self.config.max_task_attempts,
        )?;

        if let Err(e) = self.queue.enqueue(task).await {
            error!(analysis_id = %analysis.id, "Failed to enqueue fetch task: {}", e);
            let reason = FailureReason::new(
                FailureCode::DispatchFailed,
                format!("fetch task could not be dispatched: {}", e),
            );
            if let Err(mark_err) = self.analyses.fail_pending(analysis.id, &reason).await {
                error!(analysis_id = %analysis.id, "Failed to record dispatch failure: {}", mark_err);
            }
            return Err(PipelineError::UpstreamUnavailable(e.to_string()));
        }

        counter!("analyses_started_total").increment(1);
        info!(analysis_id = %analysis.id, url = %analysis.target_url, "Analysis created");
        Ok(analysis.id)
    }

    /// 抓取完成：转换到 processing 并为每个类别创建作业、投递评估任务
    ///
    /// 分析已不在 pending 时（重复投递）什么也不做
    #[instrument(skip(self, assets))]
    pub async fn on_fetch_complete(
        &self,
        analysis_id: Uuid,
        assets: Vec<AssetRef>,
    ) -> Result<(), PipelineError> {
        let jobs: Vec<AnalysisJob> = self
            .categories
            .iter()
            .map(|category| AnalysisJob::new(analysis_id, *category, self.config.job_timeout))
            .collect();

        if !self.analyses.start_processing(analysis_id, &jobs).await? {
            info!(%analysis_id, "Analysis is no longer pending, ignoring fetch completion");
            return Ok(());
        }
        info!(%analysis_id, jobs = jobs.len(), "Analysis processing");

        let mut dispatch_failed = jobs.is_empty();
        for job in &jobs {
            let payload = EvaluateTaskPayload {
                analysis_id,
                job_id: job.id,
                category: job.category,
                assets: assets.clone(),
            };
            let enqueued = match Task::evaluate(&payload, self.config.max_task_attempts) {
                Ok(task) => self.queue.enqueue(task).await.map_err(|e| e.to_string()),
                Err(e) => Err(e.to_string()),
            };

            if let Err(e) = enqueued {
                warn!(%analysis_id, job_id = %job.id, category = %job.category, "Failed to dispatch job: {}", e);
                let reason = FailureReason::new(
                    FailureCode::DispatchFailed,
                    format!("evaluation task could not be dispatched: {}", e),
                );
                if self.jobs.mark_failed(job.id, &reason).await? {
                    counter!(
                        "analysis_jobs_total",
                        "category" => job.category.to_string(),
                        "outcome" => "failed"
                    )
                    .increment(1);
                }
                dispatch_failed = true;
            }
        }

        // 全部作业都可能在这里已经失败
        if dispatch_failed {
            self.try_finalize(analysis_id).await?;
        }
        Ok(())
    }

    /// 抓取失败：pending → failed，不创建任何作业
    #[instrument(skip(self, reason))]
    pub async fn on_fetch_failed(
        &self,
        analysis_id: Uuid,
        reason: FailureReason,
    ) -> Result<bool, PipelineError> {
        if !self.analyses.fail_pending(analysis_id, &reason).await? {
            info!(%analysis_id, "Analysis is no longer pending, ignoring fetch failure");
            return Ok(false);
        }

        counter!("analyses_finalized_total", "status" => AnalysisStatus::Failed.to_string())
            .increment(1);
        warn!(%analysis_id, code = %reason.code, "Analysis failed during fetch: {}", reason.message);
        Ok(true)
    }

    /// 工作器开始执行作业：pending → running
    pub async fn on_job_started(&self, job_id: Uuid) -> Result<bool, PipelineError> {
        let started = self.jobs.mark_running(job_id).await?;
        if started {
            debug!(%job_id, "Job running");
        }
        Ok(started)
    }

    /// 作业完成：在同一事务中写入问题并标记完成，随后尝试终结
    ///
    /// 问题的规则键必须属于作业类别的规则目录，否则作业以
    /// `RuleEvaluationError` 失败，不写入任何问题。
    #[instrument(skip(self, findings), fields(findings = findings.len()))]
    pub async fn on_job_complete(
        &self,
        job_id: Uuid,
        findings: Vec<NewFinding>,
    ) -> Result<(), PipelineError> {
        let job = self
            .jobs
            .find_by_id(job_id)
            .await?
            .ok_or(PipelineError::NotFound(job_id))?;

        if job.status.is_terminal() {
            info!(%job_id, status = %job.status, "Job already terminal, ignoring completion report");
            return Ok(());
        }

        let mut bound = Vec::with_capacity(findings.len());
        for finding in findings {
            let Some(rule) = find_rule(job.category, &finding.rule_key) else {
                let reason = FailureReason::new(
                    FailureCode::RuleEvaluationError,
                    format!(
                        "rule '{}' is not defined for category {}",
                        finding.rule_key, job.category
                    ),
                );
                return self.on_job_failed(job_id, reason).await;
            };
            bound.push(Finding::from_new(
                finding,
                job.id,
                job.analysis_id,
                job.category,
                rule.title,
            ));
        }

        if !self.jobs.complete_with_findings(job.id, &bound).await? {
            info!(%job_id, "Job already terminal, ignoring completion report");
            return Ok(());
        }

        counter!(
            "analysis_jobs_total",
            "category" => job.category.to_string(),
            "outcome" => "completed"
        )
        .increment(1);
        info!(%job_id, analysis_id = %job.analysis_id, category = %job.category, findings = bound.len(), "Job completed");

        self.try_finalize(job.analysis_id).await?;
        Ok(())
    }

    /// 作业失败：记录原因，随后尝试终结
    #[instrument(skip(self, reason))]
    pub async fn on_job_failed(
        &self,
        job_id: Uuid,
        reason: FailureReason,
    ) -> Result<(), PipelineError> {
        let job = self
            .jobs
            .find_by_id(job_id)
            .await?
            .ok_or(PipelineError::NotFound(job_id))?;

        if !self.jobs.mark_failed(job.id, &reason).await? {
            info!(%job_id, "Job already terminal, ignoring failure report");
            return Ok(());
        }

        counter!(
            "analysis_jobs_total",
            "category" => job.category.to_string(),
            "outcome" => "failed"
        )
        .increment(1);
        warn!(%job_id, analysis_id = %job.analysis_id, category = %job.category, code = %reason.code, "Job failed: {}", reason.message);

        self.try_finalize(job.analysis_id).await?;
        Ok(())
    }

    /// 所有作业结束时终结分析
    ///
    /// 终结是 processing → 终态 的条件更新，并发调用中只有一个会成功。
    /// 返回本次调用写入的终态，未终结时返回 `None`。
    pub async fn try_finalize(
        &self,
        analysis_id: Uuid,
    ) -> Result<Option<AnalysisStatus>, PipelineError> {
        let jobs = self.jobs.find_by_analysis(analysis_id).await?;
        if jobs.iter().any(|j| !j.status.is_terminal()) {
            return Ok(None);
        }

        let findings = self.findings.find_by_analysis(analysis_id).await?;
        let Some(outcome) = summarize(&jobs, &findings, &self.config.scoring) else {
            return Ok(None);
        };

        if !self.analyses.finalize(analysis_id, &outcome).await? {
            debug!(%analysis_id, "Analysis already finalized");
            return Ok(None);
        }

        counter!("analyses_finalized_total", "status" => outcome.status.to_string()).increment(1);
        if let Some(score) = outcome.overall_score {
            histogram!("analysis_overall_score").record(score);
        }
        info!(
            %analysis_id,
            status = %outcome.status,
            overall_score = ?outcome.overall_score,
            missing = ?outcome.missing_categories,
            "Analysis finalized"
        );
        Ok(Some(outcome.status))
    }

    /// 超时清扫
    ///
    /// 1. 释放过期的任务锁，使任务重新投递
    /// 2. 强制失败超过截止时间的作业，并尝试终结对应分析
    /// 3. 停留在 pending 超过抓取期限的分析以 `FetchTimeout` 失败
    /// 4. 作业已全部结束但仍在 processing 的分析重新尝试终结
    #[instrument(skip(self))]
    pub async fn sweep(&self, now: DateTime<Utc>) -> Result<SweepReport, PipelineError> {
        let mut report = SweepReport::default();

        match self.queue.release_expired_locks(now).await {
            Ok(released) => report.released_tasks = released,
            Err(e) => warn!("Failed to release expired task locks: {}", e),
        }

        let timeout = FailureReason::new(FailureCode::Timeout, "job exceeded its deadline");
        let reclaimed = self.jobs.fail_overdue(now, &timeout).await?;
        report.reclaimed_jobs = reclaimed.len();
        if !reclaimed.is_empty() {
            counter!("sweep_reclaimed_jobs_total").increment(reclaimed.len() as u64);
        }

        let mut touched = BTreeSet::new();
        for job in &reclaimed {
            counter!(
                "analysis_jobs_total",
                "category" => job.category.to_string(),
                "outcome" => "failed"
            )
            .increment(1);
            warn!(job_id = %job.id, analysis_id = %job.analysis_id, category = %job.category, "Job reclaimed by timeout sweep");
            touched.insert(job.analysis_id);
        }
        for analysis_id in touched {
            if self.try_finalize(analysis_id).await?.is_some() {
                report.finalized += 1;
            }
        }

        let stale_pending = self
            .analyses
            .find_stale_pending(now - self.config.fetch_timeout)
            .await?;
        for analysis_id in stale_pending {
            let reason = FailureReason::new(
                FailureCode::FetchTimeout,
                "page fetch did not report within its deadline",
            );
            if self.on_fetch_failed(analysis_id, reason).await? {
                report.expired_fetches += 1;
            }
        }

        let stale_processing = self
            .analyses
            .find_stale_processing(now - self.config.finalize_grace)
            .await?;
        for analysis_id in stale_processing {
            if self.try_finalize(analysis_id).await?.is_some() {
                report.finalized += 1;
            }
        }

        if report != SweepReport::default() {
            info!(?report, "Timeout sweep finished");
        }
        Ok(report)
    }

    /// 查询分析
    pub async fn find_analysis(&self, analysis_id: Uuid) -> Result<Option<Analysis>, PipelineError> {
        Ok(self.analyses.find_by_id(analysis_id).await?)
    }

    /// 查询作业
    pub async fn find_job(&self, job_id: Uuid) -> Result<Option<AnalysisJob>, PipelineError> {
        Ok(self.jobs.find_by_id(job_id).await?)
    }

    /// 读取视图：分析、作业和问题
    pub async fn report(&self, analysis_id: Uuid) -> Result<AnalysisResponseDto, PipelineError> {
        let analysis = self
            .analyses
            .find_by_id(analysis_id)
            .await?
            .ok_or(PipelineError::NotFound(analysis_id))?;
        let jobs = self.jobs.find_by_analysis(analysis_id).await?;
        let findings = self.findings.find_by_analysis(analysis_id).await?;
        Ok(AnalysisResponseDto::new(analysis, &jobs, findings))
    }
}

#[cfg(test)]
#[path = "orchestrator_test.rs"]
mod tests;
