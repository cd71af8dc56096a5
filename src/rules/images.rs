// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use once_cell::sync::Lazy;
use regex::Regex;
use scraper::{ElementRef, Html};
use serde_json::json;

use super::catalog::violation;
use super::dom::{describe, has_attr, select_all};
use super::{PageSnapshot, RuleError, RuleEvaluator};
use crate::domain::models::category::RuleCategory;
use crate::domain::models::finding::NewFinding;

const CATEGORY: RuleCategory = RuleCategory::Images;

/// 首屏内默认不要求懒加载的图片数量
const EAGER_IMAGE_ALLOWANCE: usize = 3;

static LEGACY_FORMAT: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)\.(jpe?g|png|gif|bmp)(\?.*)?$").expect("legacy format pattern is valid")
});

/// 图片评估器
#[derive(Debug, Default, Clone, Copy)]
pub struct ImagesEvaluator;

fn location(img: &ElementRef<'_>) -> String {
    img.value()
        .attr("src")
        .filter(|s| !s.trim().is_empty())
        .map(|s| s.to_string())
        .unwrap_or_else(|| describe(img))
}

fn inside_picture(img: &ElementRef<'_>) -> bool {
    img.parent()
        .and_then(ElementRef::wrap)
        .map(|p| p.value().name() == "picture")
        .unwrap_or(false)
}

impl RuleEvaluator for ImagesEvaluator {
    fn category(&self) -> RuleCategory {
        CATEGORY
    }

    fn evaluate(&self, page: &PageSnapshot) -> Result<Vec<NewFinding>, RuleError> {
        let document = Html::parse_document(&page.html);
        let mut findings = Vec::new();

        for (index, img) in select_all(&document, "img")?.into_iter().enumerate() {
            let value = img.value();
            let decorative = matches!(value.attr("role"), Some("presentation" | "none"));

            if value.attr("alt").is_none() && !decorative {
                findings.push(violation(CATEGORY, "image-alt-missing", location(&img))?);
            }

            if !has_attr(&img, "width") || !has_attr(&img, "height") {
                findings.push(violation(CATEGORY, "image-dimensions-missing", location(&img))?);
            }

            if index >= EAGER_IMAGE_ALLOWANCE && value.attr("loading").is_none() {
                findings.push(violation(CATEGORY, "image-lazy-loading", location(&img))?);
            }

            let legacy = value
                .attr("src")
                .and_then(|src| LEGACY_FORMAT.captures(src))
                .map(|caps| caps[1].to_ascii_lowercase());
            if let Some(format) = legacy.filter(|_| !inside_picture(&img)) {
                findings.push(
                    violation(CATEGORY, "image-legacy-format", location(&img))?.with_remediation(
                        json!({ "current_format": format, "suggested_formats": ["avif", "webp"] }),
                    ),
                );
            }
        }

        Ok(findings)
    }
}
