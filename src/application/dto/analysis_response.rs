// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use uuid::Uuid;

use crate::domain::models::analysis::{Analysis, AnalysisStatus};
use crate::domain::models::analysis_job::{AnalysisJob, JobStatus};
use crate::domain::models::category::{RuleCategory, Severity};
use crate::domain::models::failure::FailureReason;
use crate::domain::models::finding::Finding;

/// 分析读取视图
///
/// 由分析、作业和问题拼装而成，供轮询方使用
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalysisResponseDto {
    pub id: Uuid,
    pub target_url: String,
    pub status: AnalysisStatus,
    pub overall_score: Option<f64>,
    pub category_scores: BTreeMap<RuleCategory, u32>,
    /// 未能检查的类别
    pub missing_categories: Vec<RuleCategory>,
    pub failure: Option<FailureReason>,
    pub created_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
    pub expires_at: Option<DateTime<Utc>>,
    pub jobs: Vec<JobDto>,
    pub findings: Vec<FindingDto>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobDto {
    pub id: Uuid,
    pub category: RuleCategory,
    pub status: JobStatus,
    pub error: Option<FailureReason>,
    pub findings_count: i32,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FindingDto {
    pub category: RuleCategory,
    pub rule_key: String,
    pub title: String,
    pub severity: Severity,
    pub location: String,
    pub metric_value: Option<f64>,
    pub remediation: Option<serde_json::Value>,
}

impl From<&AnalysisJob> for JobDto {
    fn from(job: &AnalysisJob) -> Self {
        Self {
            id: job.id,
            category: job.category,
            status: job.status,
            error: job.error.clone(),
            findings_count: job.findings_count,
            started_at: job.started_at,
            completed_at: job.completed_at,
        }
    }
}

impl From<Finding> for FindingDto {
    fn from(finding: Finding) -> Self {
        Self {
            category: finding.category,
            rule_key: finding.rule_key,
            title: finding.title,
            severity: finding.severity,
            location: finding.location,
            metric_value: finding.metric_value,
            remediation: finding.remediation,
        }
    }
}

/// 对外展示的综合得分保留一位小数
fn display_score(score: f64) -> f64 {
    (score * 10.0).round() / 10.0
}

impl AnalysisResponseDto {
    pub fn new(analysis: Analysis, jobs: &[AnalysisJob], findings: Vec<Finding>) -> Self {
        Self {
            id: analysis.id,
            target_url: analysis.target_url,
            status: analysis.status,
            overall_score: analysis.overall_score.map(display_score),
            category_scores: analysis.category_scores,
            missing_categories: analysis.missing_categories,
            failure: analysis.failure,
            created_at: analysis.created_at,
            completed_at: analysis.completed_at,
            expires_at: analysis.expires_at,
            jobs: jobs.iter().map(JobDto::from).collect(),
            findings: findings.into_iter().map(FindingDto::from).collect(),
        }
    }
}
