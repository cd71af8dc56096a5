// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

//! 聚合与评分
//!
//! 纯函数：输入作业状态快照和已完成作业的问题，输出终态与得分。
//! 不依赖持久化或投递通道，便于独立测试。

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet, HashSet};
use uuid::Uuid;

use crate::domain::models::analysis::AnalysisStatus;
use crate::domain::models::analysis_job::{AnalysisJob, JobStatus};
use crate::domain::models::category::{RuleCategory, Severity};
use crate::domain::models::failure::{FailureCode, FailureReason};
use crate::domain::models::finding::Finding;

/// 满分
pub const MAX_SCORE: u32 = 100;

/// 评分策略：每个问题按严重程度扣分
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScoringPolicy {
    pub critical_penalty: u32,
    pub serious_penalty: u32,
    pub moderate_penalty: u32,
    pub minor_penalty: u32,
}

impl Default for ScoringPolicy {
    fn default() -> Self {
        Self {
            critical_penalty: 10,
            serious_penalty: 5,
            moderate_penalty: 3,
            minor_penalty: 1,
        }
    }
}

impl ScoringPolicy {
    pub fn penalty(&self, severity: Severity) -> u32 {
        match severity {
            Severity::Critical => self.critical_penalty,
            Severity::Serious => self.serious_penalty,
            Severity::Moderate => self.moderate_penalty,
            Severity::Minor => self.minor_penalty,
        }
    }

    /// 从满分开始逐个扣分，最低为 0
    pub fn category_score<I>(&self, severities: I) -> u32
    where
        I: IntoIterator<Item = Severity>,
    {
        let total: u32 = severities
            .into_iter()
            .fold(0u32, |acc, s| acc.saturating_add(self.penalty(s)));
        MAX_SCORE.saturating_sub(total)
    }
}

/// 一次终结的结果
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisOutcome {
    pub status: AnalysisStatus,
    pub overall_score: Option<f64>,
    pub category_scores: BTreeMap<RuleCategory, u32>,
    pub missing_categories: Vec<RuleCategory>,
    pub failure: Option<FailureReason>,
}

/// 由作业状态多重集计算分析的汇总状态
///
/// 存在未结束的作业时返回 `None`
pub fn aggregate_status(statuses: &[JobStatus]) -> Option<AnalysisStatus> {
    if statuses.iter().any(|s| !s.is_terminal()) {
        return None;
    }
    let completed = statuses
        .iter()
        .filter(|s| **s == JobStatus::Completed)
        .count();

    Some(if statuses.is_empty() || completed == 0 {
        AnalysisStatus::Failed
    } else if completed == statuses.len() {
        AnalysisStatus::Completed
    } else {
        AnalysisStatus::CompletedWithErrors
    })
}

/// 计算各类别得分与综合得分
///
/// 只有 `completed` 中的类别参与评分；综合得分是这些类别得分的算术平均，
/// 没有任何类别完成时综合得分为 `None`（而不是 0）
pub fn compute_scores(
    completed: &BTreeSet<RuleCategory>,
    findings: &[Finding],
    policy: &ScoringPolicy,
) -> (BTreeMap<RuleCategory, u32>, Option<f64>) {
    let category_scores: BTreeMap<RuleCategory, u32> = completed
        .iter()
        .map(|category| {
            let score = policy.category_score(
                findings
                    .iter()
                    .filter(|f| f.category == *category)
                    .map(|f| f.severity),
            );
            (*category, score)
        })
        .collect();

    if category_scores.is_empty() {
        return (category_scores, None);
    }

    let sum: u32 = category_scores.values().sum();
    let mean = sum as f64 / category_scores.len() as f64;
    (category_scores, Some(mean))
}

/// 汇总一次分析
///
/// 只统计已完成作业的问题：失败的工作器不产生问题，也不拉低它负责的分数。
/// 存在未结束的作业时返回 `None`。
pub fn summarize(
    jobs: &[AnalysisJob],
    findings: &[Finding],
    policy: &ScoringPolicy,
) -> Option<AnalysisOutcome> {
    let statuses: Vec<JobStatus> = jobs.iter().map(|j| j.status).collect();
    let status = aggregate_status(&statuses)?;

    let completed_jobs: HashSet<Uuid> = jobs
        .iter()
        .filter(|j| j.status == JobStatus::Completed)
        .map(|j| j.id)
        .collect();
    let completed_categories: BTreeSet<RuleCategory> = jobs
        .iter()
        .filter(|j| j.status == JobStatus::Completed)
        .map(|j| j.category)
        .collect();

    let counted: Vec<Finding> = findings
        .iter()
        .filter(|f| completed_jobs.contains(&f.job_id))
        .cloned()
        .collect();

    let (category_scores, overall_score) = compute_scores(&completed_categories, &counted, policy);

    let mut missing_categories: Vec<RuleCategory> = jobs
        .iter()
        .filter(|j| j.status == JobStatus::Failed)
        .map(|j| j.category)
        .collect();
    missing_categories.sort();
    missing_categories.dedup();

    let failure = (status == AnalysisStatus::Failed).then(|| {
        let details: Vec<String> = jobs
            .iter()
            .map(|j| match &j.error {
                Some(reason) => format!("{} ({})", j.category, reason.code),
                None => j.category.to_string(),
            })
            .collect();
        FailureReason::new(
            FailureCode::AllJobsFailed,
            if details.is_empty() {
                "no rule category was dispatched".to_string()
            } else {
                format!("no rule category could be evaluated: {}", details.join(", "))
            },
        )
    });

    Some(AnalysisOutcome {
        status,
        overall_score,
        category_scores,
        missing_categories,
        failure,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::models::finding::NewFinding;
    use chrono::Duration;

    fn job(analysis_id: Uuid, category: RuleCategory, status: JobStatus) -> AnalysisJob {
        let mut job = AnalysisJob::new(analysis_id, category, Duration::minutes(5));
        job.status = status;
        if status == JobStatus::Failed {
            job.error = Some(FailureReason::new(FailureCode::Timeout, "deadline passed"));
        }
        job
    }

    fn finding(job: &AnalysisJob, severity: Severity) -> Finding {
        Finding::from_new(
            NewFinding::new("some-rule", severity, "body"),
            job.id,
            job.analysis_id,
            job.category,
            "Some rule",
        )
    }

    #[test]
    fn test_aggregate_status_rules() {
        use JobStatus::*;
        assert_eq!(
            aggregate_status(&[Completed, Completed, Completed]),
            Some(AnalysisStatus::Completed)
        );
        assert_eq!(
            aggregate_status(&[Completed, Failed, Completed]),
            Some(AnalysisStatus::CompletedWithErrors)
        );
        assert_eq!(
            aggregate_status(&[Failed, Failed]),
            Some(AnalysisStatus::Failed)
        );
        assert_eq!(aggregate_status(&[Completed, Running]), None);
        assert_eq!(aggregate_status(&[Pending, Failed]), None);
    }

    #[test]
    fn test_aggregate_status_all_combinations() {
        for n in 1..=6usize {
            for k in 0..=n {
                let mut statuses = vec![JobStatus::Completed; k];
                statuses.extend(vec![JobStatus::Failed; n - k]);
                let expected = if k == n {
                    AnalysisStatus::Completed
                } else if k == 0 {
                    AnalysisStatus::Failed
                } else {
                    AnalysisStatus::CompletedWithErrors
                };
                assert_eq!(aggregate_status(&statuses), Some(expected), "n={} k={}", n, k);
            }
        }
    }

    #[test]
    fn test_category_score_floors_at_zero() {
        let policy = ScoringPolicy::default();
        assert_eq!(policy.category_score(vec![]), 100);
        assert_eq!(
            policy.category_score(vec![Severity::Critical, Severity::Minor]),
            89
        );
        assert_eq!(policy.category_score(vec![Severity::Critical; 20]), 0);
    }

    #[test]
    fn test_severity_weights_are_ordered() {
        let policy = ScoringPolicy::default();
        assert!(policy.penalty(Severity::Critical) > policy.penalty(Severity::Serious));
        assert!(policy.penalty(Severity::Serious) > policy.penalty(Severity::Moderate));
        assert!(policy.penalty(Severity::Moderate) > policy.penalty(Severity::Minor));
    }

    #[test]
    fn test_failed_category_excluded_from_mean() {
        let analysis_id = Uuid::new_v4();
        let a11y = job(analysis_id, RuleCategory::Accessibility, JobStatus::Completed);
        let seo = job(analysis_id, RuleCategory::Seo, JobStatus::Completed);
        let perf = job(analysis_id, RuleCategory::Performance, JobStatus::Failed);

        // 失败作业即便留下了问题也不参与评分
        let findings = vec![
            finding(&a11y, Severity::Critical),
            finding(&seo, Severity::Serious),
            finding(&perf, Severity::Critical),
        ];

        let outcome = summarize(
            &[a11y, seo, perf],
            &findings,
            &ScoringPolicy::default(),
        )
        .unwrap();

        assert_eq!(outcome.status, AnalysisStatus::CompletedWithErrors);
        assert_eq!(outcome.category_scores.len(), 2);
        assert_eq!(outcome.category_scores[&RuleCategory::Accessibility], 90);
        assert_eq!(outcome.category_scores[&RuleCategory::Seo], 95);
        assert_eq!(outcome.overall_score, Some(92.5));
        assert_eq!(outcome.missing_categories, vec![RuleCategory::Performance]);
        assert!(outcome.failure.is_none());
    }

    #[test]
    fn test_all_completed_without_findings_scores_100() {
        let analysis_id = Uuid::new_v4();
        let jobs: Vec<AnalysisJob> = RuleCategory::ALL
            .iter()
            .map(|c| job(analysis_id, *c, JobStatus::Completed))
            .collect();
        let outcome = summarize(&jobs, &[], &ScoringPolicy::default()).unwrap();
        assert_eq!(outcome.status, AnalysisStatus::Completed);
        assert_eq!(outcome.overall_score, Some(100.0));
        assert!(outcome.missing_categories.is_empty());
    }

    #[test]
    fn test_all_failed_has_no_score_and_a_reason() {
        let analysis_id = Uuid::new_v4();
        let jobs = vec![
            job(analysis_id, RuleCategory::Seo, JobStatus::Failed),
            job(analysis_id, RuleCategory::Media, JobStatus::Failed),
        ];
        let outcome = summarize(&jobs, &[], &ScoringPolicy::default()).unwrap();
        assert_eq!(outcome.status, AnalysisStatus::Failed);
        assert_eq!(outcome.overall_score, None);
        assert!(outcome.category_scores.is_empty());
        let failure = outcome.failure.unwrap();
        assert_eq!(failure.code, FailureCode::AllJobsFailed);
        assert!(failure.message.contains("seo"));
    }

    #[test]
    fn test_summarize_waits_for_running_jobs() {
        let analysis_id = Uuid::new_v4();
        let jobs = vec![
            job(analysis_id, RuleCategory::Seo, JobStatus::Completed),
            job(analysis_id, RuleCategory::Media, JobStatus::Running),
        ];
        assert!(summarize(&jobs, &[], &ScoringPolicy::default()).is_none());
    }

    #[test]
    fn test_overall_score_is_exact_mean() {
        let completed: BTreeSet<RuleCategory> =
            [RuleCategory::Accessibility, RuleCategory::Seo, RuleCategory::Images]
                .into_iter()
                .collect();
        let a11y = job(Uuid::new_v4(), RuleCategory::Accessibility, JobStatus::Completed);
        let findings = vec![finding(&a11y, Severity::Minor)];

        let (scores, overall) = compute_scores(&completed, &findings, &ScoringPolicy::default());
        assert_eq!(scores[&RuleCategory::Accessibility], 99);
        assert_eq!(overall, Some(299.0 / 3.0));
    }
}
