// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use once_cell::sync::Lazy;
use regex::Regex;
use scraper::Html;

use super::catalog::violation;
use super::dom::{describe, has_attr, is_focusable, select_all, text_of};
use super::{PageSnapshot, RuleError, RuleEvaluator};
use crate::domain::models::category::RuleCategory;
use crate::domain::models::finding::NewFinding;

const CATEGORY: RuleCategory = RuleCategory::Keyboard;

/// 跳转链接必须出现在前几个链接之内
const SKIP_LINK_WINDOW: usize = 3;

/// 页面链接少于此数量时不要求跳转链接
const SKIP_LINK_MIN_LINKS: usize = 5;

static FOCUS_OUTLINE_NONE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?is):focus[^{]*\{[^}]*outline(-style)?\s*:\s*(none|0)\b")
        .expect("focus outline pattern is valid")
});

/// 键盘导航评估器
#[derive(Debug, Default, Clone, Copy)]
pub struct KeyboardEvaluator;

impl RuleEvaluator for KeyboardEvaluator {
    fn category(&self) -> RuleCategory {
        CATEGORY
    }

    fn evaluate(&self, page: &PageSnapshot) -> Result<Vec<NewFinding>, RuleError> {
        let document = Html::parse_document(&page.html);
        let mut findings = Vec::new();

        for element in select_all(&document, "[tabindex]")? {
            let positive = element
                .value()
                .attr("tabindex")
                .and_then(|t| t.trim().parse::<i32>().ok())
                .map(|t| t > 0);
            if positive == Some(true) {
                findings.push(violation(CATEGORY, "tabindex-positive", describe(&element))?);
            }
        }

        for element in select_all(&document, "[onclick]")? {
            if !is_focusable(&element) && !has_attr(&element, "role") {
                findings.push(violation(
                    CATEGORY,
                    "click-handler-not-focusable",
                    describe(&element),
                )?);
            }
        }

        for style in select_all(&document, "style")? {
            if FOCUS_OUTLINE_NONE.is_match(&text_of(&style)) {
                findings.push(violation(CATEGORY, "focus-outline-removed", describe(&style))?);
            }
        }

        let links = select_all(&document, "body a[href]")?;
        if links.len() >= SKIP_LINK_MIN_LINKS {
            let has_skip_link = links.iter().take(SKIP_LINK_WINDOW).any(|a| {
                a.value()
                    .attr("href")
                    .map(|h| h.starts_with('#') && h.len() > 1)
                    .unwrap_or(false)
            });
            if !has_skip_link {
                findings.push(violation(CATEGORY, "skip-link-missing", "body")?);
            }
        }

        Ok(findings)
    }
}
