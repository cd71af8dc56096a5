// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use auditrs::domain::models::analysis::AnalysisStatus;
use auditrs::domain::models::analysis_job::{AnalysisJob, JobStatus};
use auditrs::domain::models::category::{RuleCategory, Severity};
use auditrs::domain::models::finding::{Finding, NewFinding};
use auditrs::domain::services::scoring_service::{summarize, ScoringPolicy};
use uuid::Uuid;

fn jobs_with(outcomes: &[(RuleCategory, JobStatus)]) -> Vec<AnalysisJob> {
    let analysis_id = Uuid::new_v4();
    outcomes
        .iter()
        .map(|(category, status)| {
            let mut job = AnalysisJob::new(analysis_id, *category, chrono::Duration::minutes(5));
            job.status = *status;
            job
        })
        .collect()
}

fn finding(job: &AnalysisJob, key: &str, severity: Severity) -> Finding {
    Finding::from_new(
        NewFinding::new(key, severity, "body"),
        job.id,
        job.analysis_id,
        job.category,
        key,
    )
}

#[test]
fn test_every_outcome_combination_maps_to_expected_status() {
    let n = RuleCategory::ALL.len();
    for mask in 0u32..(1 << n) {
        let outcomes: Vec<(RuleCategory, JobStatus)> = RuleCategory::ALL
            .iter()
            .enumerate()
            .map(|(i, c)| {
                let status = if mask & (1 << i) != 0 {
                    JobStatus::Completed
                } else {
                    JobStatus::Failed
                };
                (*c, status)
            })
            .collect();
        let completed = mask.count_ones() as usize;

        let outcome = summarize(&jobs_with(&outcomes), &[], &ScoringPolicy::default()).unwrap();
        let expected = match completed {
            0 => AnalysisStatus::Failed,
            k if k == n => AnalysisStatus::Completed,
            _ => AnalysisStatus::CompletedWithErrors,
        };
        assert_eq!(outcome.status, expected, "mask {:06b}", mask);
        assert_eq!(outcome.missing_categories.len(), n - completed);
        assert_eq!(outcome.overall_score.is_some(), completed > 0);
    }
}

#[test]
fn test_failed_performance_is_excluded_not_zeroed() {
    let jobs = jobs_with(&[
        (RuleCategory::Accessibility, JobStatus::Completed),
        (RuleCategory::Seo, JobStatus::Completed),
        (RuleCategory::Performance, JobStatus::Failed),
    ]);
    let findings = vec![
        finding(&jobs[0], "link-name-missing", Severity::Serious),
        finding(&jobs[1], "h1-missing", Severity::Moderate),
    ];

    let outcome = summarize(&jobs, &findings, &ScoringPolicy::default()).unwrap();
    assert_eq!(outcome.status, AnalysisStatus::CompletedWithErrors);
    // (95 + 97) / 2
    assert_eq!(outcome.overall_score, Some(96.0));
    assert_eq!(outcome.missing_categories, vec![RuleCategory::Performance]);
    assert!(!outcome
        .category_scores
        .contains_key(&RuleCategory::Performance));
}

#[test]
fn test_unfinished_jobs_block_summary() {
    let jobs = jobs_with(&[
        (RuleCategory::Images, JobStatus::Completed),
        (RuleCategory::Media, JobStatus::Running),
    ]);
    assert!(summarize(&jobs, &[], &ScoringPolicy::default()).is_none());
}

#[test]
fn test_custom_penalties_apply() {
    let policy = ScoringPolicy {
        critical_penalty: 50,
        serious_penalty: 20,
        moderate_penalty: 5,
        minor_penalty: 0,
    };
    let jobs = jobs_with(&[(RuleCategory::Images, JobStatus::Completed)]);
    let findings = vec![
        finding(&jobs[0], "image-alt-missing", Severity::Critical),
        finding(&jobs[0], "image-alt-missing", Severity::Critical),
        finding(&jobs[0], "image-legacy-format", Severity::Minor),
    ];

    let outcome = summarize(&jobs, &findings, &policy).unwrap();
    assert_eq!(outcome.category_scores[&RuleCategory::Images], 0);
    assert_eq!(outcome.overall_score, Some(0.0));
}
