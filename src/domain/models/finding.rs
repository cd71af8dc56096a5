// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::category::{RuleCategory, Severity};

/// 问题实体
///
/// 工作器检测到的一条规则违规。写入后不可修改，
/// 只会随所属分析的删除而级联删除。
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Finding {
    pub id: Uuid,
    /// 产生该问题的作业
    pub job_id: Uuid,
    pub analysis_id: Uuid,
    pub category: RuleCategory,
    /// 规则目录中的稳定键
    pub rule_key: String,
    pub severity: Severity,
    /// 规则标题（来自规则目录）
    pub title: String,
    /// 位置描述：选择器、DOM 路径或资源 URL
    pub location: String,
    /// 可选的度量值（例如字节数、毫秒数）
    pub metric_value: Option<f64>,
    /// 可选的修复建议
    pub remediation: Option<serde_json::Value>,
    pub created_at: DateTime<Utc>,
}

/// 工作器产生的待持久化问题
///
/// 作业 ID、分析 ID 和标题在持久化时由编排器补全
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewFinding {
    pub rule_key: String,
    pub severity: Severity,
    pub location: String,
    pub metric_value: Option<f64>,
    pub remediation: Option<serde_json::Value>,
}

impl NewFinding {
    pub fn new(rule_key: impl Into<String>, severity: Severity, location: impl Into<String>) -> Self {
        Self {
            rule_key: rule_key.into(),
            severity,
            location: location.into(),
            metric_value: None,
            remediation: None,
        }
    }

    pub fn with_metric(mut self, value: f64) -> Self {
        self.metric_value = Some(value);
        self
    }

    pub fn with_remediation(mut self, remediation: serde_json::Value) -> Self {
        self.remediation = Some(remediation);
        self
    }
}

impl Finding {
    /// 将工作器输出绑定到作业上
    pub fn from_new(
        new: NewFinding,
        job_id: Uuid,
        analysis_id: Uuid,
        category: RuleCategory,
        title: &str,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            job_id,
            analysis_id,
            category,
            rule_key: new.rule_key,
            severity: new.severity,
            title: title.to_string(),
            location: new.location,
            metric_value: new.metric_value,
            remediation: new.remediation,
            created_at: Utc::now(),
        }
    }
}
