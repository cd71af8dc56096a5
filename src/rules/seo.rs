// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use scraper::{ElementRef, Html};

use super::catalog::violation;
use super::dom::{has_attr, select_all, text_of};
use super::{PageSnapshot, RuleError, RuleEvaluator};
use crate::domain::models::category::RuleCategory;
use crate::domain::models::finding::NewFinding;

const CATEGORY: RuleCategory = RuleCategory::Seo;

const TITLE_MIN_CHARS: usize = 10;
const TITLE_MAX_CHARS: usize = 60;

/// SEO 评估器
#[derive(Debug, Default, Clone, Copy)]
pub struct SeoEvaluator;

/// 按 name 属性（不区分大小写）查找 meta 标签
fn meta_named<'a>(metas: &[ElementRef<'a>], name: &str) -> Option<ElementRef<'a>> {
    metas.iter().copied().find(|m| {
        m.value()
            .attr("name")
            .map(|n| n.eq_ignore_ascii_case(name))
            .unwrap_or(false)
    })
}

impl RuleEvaluator for SeoEvaluator {
    fn category(&self) -> RuleCategory {
        CATEGORY
    }

    fn evaluate(&self, page: &PageSnapshot) -> Result<Vec<NewFinding>, RuleError> {
        let document = Html::parse_document(&page.html);
        let mut findings = Vec::new();

        // title
        let title = select_all(&document, "title")?
            .first()
            .map(text_of)
            .unwrap_or_default();
        if title.is_empty() {
            findings.push(violation(CATEGORY, "title-missing", "head > title")?);
        } else {
            let length = title.chars().count();
            if !(TITLE_MIN_CHARS..=TITLE_MAX_CHARS).contains(&length) {
                findings.push(
                    violation(CATEGORY, "title-length", "head > title")?.with_metric(length as f64),
                );
            }
        }

        let metas = select_all(&document, "meta[name]")?;

        let has_description = meta_named(&metas, "description")
            .map(|m| has_attr(&m, "content"))
            .unwrap_or(false);
        if !has_description {
            findings.push(violation(CATEGORY, "meta-description-missing", "head")?);
        }

        if meta_named(&metas, "viewport").is_none() {
            findings.push(violation(CATEGORY, "viewport-missing", "head")?);
        }

        let robots_noindex = meta_named(&metas, "robots")
            .and_then(|m| m.value().attr("content"))
            .map(|c| c.to_ascii_lowercase().contains("noindex"))
            .unwrap_or(false);
        if robots_noindex {
            findings.push(violation(CATEGORY, "noindex-present", "meta[name=robots]")?);
        }
        let header_noindex = page
            .metadata
            .headers
            .get("x-robots-tag")
            .map(|v| v.to_ascii_lowercase().contains("noindex"))
            .unwrap_or(false);
        if header_noindex {
            findings.push(violation(CATEGORY, "noindex-present", "X-Robots-Tag header")?);
        }

        // headings
        let h1_count = select_all(&document, "h1")?.len();
        if h1_count == 0 {
            findings.push(violation(CATEGORY, "h1-missing", "body")?);
        } else if h1_count > 1 {
            findings.push(violation(CATEGORY, "h1-multiple", "h1")?.with_metric(h1_count as f64));
        }

        let has_canonical = select_all(&document, "link[rel][href]")?.iter().any(|link| {
            link.value()
                .attr("rel")
                .map(|rel| {
                    rel.split_whitespace()
                        .any(|r| r.eq_ignore_ascii_case("canonical"))
                })
                .unwrap_or(false)
        });
        if !has_canonical {
            findings.push(violation(CATEGORY, "canonical-missing", "head")?);
        }

        Ok(findings)
    }
}
