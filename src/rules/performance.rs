// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use scraper::Html;

use super::catalog::violation;
use super::dom::select_all;
use super::{PageSnapshot, RuleError, RuleEvaluator};
use crate::domain::models::category::RuleCategory;
use crate::domain::models::finding::NewFinding;

const CATEGORY: RuleCategory = RuleCategory::Performance;

/// 性能阈值
#[derive(Debug, Clone, Copy)]
pub struct PerformanceThresholds {
    /// DOM 元素数量上限
    pub max_dom_elements: usize,
    /// 文档体积上限（字节）
    pub max_document_bytes: usize,
    /// 主文档响应时间上限（毫秒）
    pub max_response_ms: u64,
    /// 样式表数量上限
    pub max_stylesheets: usize,
}

impl Default for PerformanceThresholds {
    fn default() -> Self {
        Self {
            max_dom_elements: 1500,
            max_document_bytes: 512 * 1024,
            max_response_ms: 2000,
            max_stylesheets: 10,
        }
    }
}

/// 性能评估器
#[derive(Debug, Default, Clone, Copy)]
pub struct PerformanceEvaluator {
    thresholds: PerformanceThresholds,
}

impl PerformanceEvaluator {
    pub fn new(thresholds: PerformanceThresholds) -> Self {
        Self { thresholds }
    }
}

impl RuleEvaluator for PerformanceEvaluator {
    fn category(&self) -> RuleCategory {
        CATEGORY
    }

    fn evaluate(&self, page: &PageSnapshot) -> Result<Vec<NewFinding>, RuleError> {
        let document = Html::parse_document(&page.html);
        let limits = &self.thresholds;
        let mut findings = Vec::new();

        for script in select_all(&document, "head script[src]")? {
            let value = script.value();
            let deferred = value.attr("async").is_some()
                || value.attr("defer").is_some()
                || value.attr("type") == Some("module");
            if !deferred {
                let src = value.attr("src").unwrap_or_default();
                findings.push(violation(CATEGORY, "render-blocking-script", src)?);
            }
        }

        let dom_size = select_all(&document, "*")?.len();
        if dom_size > limits.max_dom_elements {
            findings.push(
                violation(CATEGORY, "excessive-dom-size", "html")?.with_metric(dom_size as f64),
            );
        }

        let weight = page.html.len();
        if weight > limits.max_document_bytes {
            findings.push(
                violation(CATEGORY, "page-weight", page.metadata.final_url.as_str())?
                    .with_metric(weight as f64),
            );
        }

        if page.metadata.response_time_ms > limits.max_response_ms {
            findings.push(
                violation(CATEGORY, "slow-response", page.metadata.final_url.as_str())?
                    .with_metric(page.metadata.response_time_ms as f64),
            );
        }

        let stylesheets = select_all(&document, "link[rel=stylesheet]")?.len();
        if stylesheets > limits.max_stylesheets {
            findings.push(
                violation(CATEGORY, "too-many-stylesheets", "head")?
                    .with_metric(stylesheets as f64),
            );
        }

        Ok(findings)
    }
}
