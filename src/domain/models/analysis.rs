// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use thiserror::Error;
use uuid::Uuid;

use super::category::RuleCategory;
use super::failure::FailureReason;

/// 分析实体
///
/// 表示针对单个 URL 的一次完整审计。分析只由编排器修改，
/// 工作器只能写入自己的作业和问题记录。
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Analysis {
    /// 分析唯一标识符
    pub id: Uuid,
    /// 规范化后的目标 URL
    pub target_url: String,
    /// 所属用户（匿名分析为空）
    pub owner_id: Option<Uuid>,
    /// 所属工作区（匿名分析为空）
    pub workspace_id: Option<Uuid>,
    /// 分析状态
    pub status: AnalysisStatus,
    /// 综合得分，仅在终态且至少一个类别完成时存在
    pub overall_score: Option<f64>,
    /// 各类别得分
    pub category_scores: BTreeMap<RuleCategory, u32>,
    /// 未能检查的类别（对应作业失败）
    pub missing_categories: Vec<RuleCategory>,
    /// 失败原因（failed 状态必有）
    pub failure: Option<FailureReason>,
    /// 创建时间
    pub created_at: DateTime<Utc>,
    /// 更新时间
    pub updated_at: DateTime<Utc>,
    /// 进入 processing 的时间
    pub processing_started_at: Option<DateTime<Utc>>,
    /// 进入终态的时间
    pub completed_at: Option<DateTime<Utc>>,
    /// 过期时间（匿名分析）
    pub expires_at: Option<DateTime<Utc>>,
}

/// 请求方上下文
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OwnerContext {
    pub owner_id: Option<Uuid>,
    pub workspace_id: Option<Uuid>,
}

impl OwnerContext {
    pub fn anonymous() -> Self {
        Self::default()
    }

    pub fn is_anonymous(&self) -> bool {
        self.owner_id.is_none() && self.workspace_id.is_none()
    }
}

/// 分析状态
///
/// 状态转换：
/// Pending → Processing → Completed/CompletedWithErrors/Failed
/// Pending → Failed（抓取失败）
///
/// 三个终态之后不允许任何转换。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum AnalysisStatus {
    #[default]
    Pending,
    Processing,
    Completed,
    CompletedWithErrors,
    Failed,
}

impl AnalysisStatus {
    /// 是否为终态
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            AnalysisStatus::Completed | AnalysisStatus::CompletedWithErrors | AnalysisStatus::Failed
        )
    }

    /// 判断状态机中是否存在 `self → next` 这条边
    pub fn can_transition_to(&self, next: AnalysisStatus) -> bool {
        use AnalysisStatus::*;
        matches!(
            (self, next),
            (Pending, Processing)
                | (Pending, Failed)
                | (Processing, Completed)
                | (Processing, CompletedWithErrors)
                | (Processing, Failed)
        )
    }

    /// 校验 `self → next` 是状态机中的合法边
    pub fn check_transition(self, next: AnalysisStatus) -> Result<(), DomainError> {
        if self.can_transition_to(next) {
            Ok(())
        } else {
            Err(DomainError::InvalidStateTransition {
                from: self,
                to: next,
            })
        }
    }
}

impl fmt::Display for AnalysisStatus {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            AnalysisStatus::Pending => write!(f, "pending"),
            AnalysisStatus::Processing => write!(f, "processing"),
            AnalysisStatus::Completed => write!(f, "completed"),
            AnalysisStatus::CompletedWithErrors => write!(f, "completed_with_errors"),
            AnalysisStatus::Failed => write!(f, "failed"),
        }
    }
}

impl FromStr for AnalysisStatus {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(AnalysisStatus::Pending),
            "processing" => Ok(AnalysisStatus::Processing),
            "completed" => Ok(AnalysisStatus::Completed),
            "completed_with_errors" => Ok(AnalysisStatus::CompletedWithErrors),
            "failed" => Ok(AnalysisStatus::Failed),
            _ => Err(()),
        }
    }
}

/// 领域错误类型
#[derive(Error, Debug)]
pub enum DomainError {
    /// 无效的状态转换
    #[error("Invalid state transition from {from} to {to}")]
    InvalidStateTransition {
        from: AnalysisStatus,
        to: AnalysisStatus,
    },
}

impl Analysis {
    /// 创建一个新的待处理分析
    ///
    /// 匿名分析会根据 `guest_ttl` 设置过期时间
    pub fn new(target_url: String, owner: OwnerContext, guest_ttl: Duration) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            target_url,
            owner_id: owner.owner_id,
            workspace_id: owner.workspace_id,
            status: AnalysisStatus::Pending,
            overall_score: None,
            category_scores: BTreeMap::new(),
            missing_categories: Vec::new(),
            failure: None,
            created_at: now,
            updated_at: now,
            processing_started_at: None,
            completed_at: None,
            expires_at: owner.is_anonymous().then(|| now + guest_ttl),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_terminal_states_have_no_outgoing_edges() {
        let all = [
            AnalysisStatus::Pending,
            AnalysisStatus::Processing,
            AnalysisStatus::Completed,
            AnalysisStatus::CompletedWithErrors,
            AnalysisStatus::Failed,
        ];
        for from in all.iter().filter(|s| s.is_terminal()) {
            for to in all {
                assert!(!from.can_transition_to(to), "{} -> {} must be rejected", from, to);
            }
        }
    }

    #[test]
    fn test_no_edge_back_to_pending() {
        assert!(!AnalysisStatus::Processing.can_transition_to(AnalysisStatus::Pending));
        assert!(AnalysisStatus::Pending.can_transition_to(AnalysisStatus::Failed));
        assert!(!AnalysisStatus::Pending.can_transition_to(AnalysisStatus::Completed));
    }

    #[test]
    fn test_anonymous_analysis_expires() {
        let analysis = Analysis::new(
            "https://example.com/".to_string(),
            OwnerContext::anonymous(),
            Duration::hours(24),
        );
        assert_eq!(analysis.status, AnalysisStatus::Pending);
        assert!(analysis.expires_at.is_some());

        let owned = Analysis::new(
            "https://example.com/".to_string(),
            OwnerContext {
                owner_id: Some(Uuid::new_v4()),
                workspace_id: None,
            },
            Duration::hours(24),
        );
        assert!(owned.expires_at.is_none());
    }

    #[test]
    fn test_check_transition_reports_edge() {
        assert!(AnalysisStatus::Processing
            .check_transition(AnalysisStatus::CompletedWithErrors)
            .is_ok());
        let err = AnalysisStatus::Completed
            .check_transition(AnalysisStatus::Failed)
            .unwrap_err();
        assert_eq!(
            err.to_string(),
            "Invalid state transition from completed to failed"
        );
    }
}
