// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use scraper::Html;
use std::collections::{BTreeMap, HashSet};

use super::catalog::violation;
use super::dom::{describe, has_attr, is_focusable, select_all, selector, text_of};
use super::{PageSnapshot, RuleError, RuleEvaluator};
use crate::domain::models::category::RuleCategory;
use crate::domain::models::finding::NewFinding;

const CATEGORY: RuleCategory = RuleCategory::Accessibility;

/// 无障碍评估器
#[derive(Debug, Default, Clone, Copy)]
pub struct AccessibilityEvaluator;

impl AccessibilityEvaluator {
    fn check_lang(document: &Html, out: &mut Vec<NewFinding>) -> Result<(), RuleError> {
        let has_lang = select_all(document, "html")?
            .first()
            .map(|html| has_attr(html, "lang"))
            .unwrap_or(false);
        if !has_lang {
            out.push(violation(CATEGORY, "html-lang-missing", "html")?);
        }
        Ok(())
    }

    fn check_links(document: &Html, out: &mut Vec<NewFinding>) -> Result<(), RuleError> {
        for link in select_all(document, "a[href]")? {
            if !text_of(&link).is_empty()
                || has_attr(&link, "aria-label")
                || has_attr(&link, "aria-labelledby")
                || has_attr(&link, "title")
            {
                continue;
            }
            let img_alt = link
                .select(&selector("img[alt]")?)
                .any(|img| has_attr(&img, "alt"));
            if !img_alt {
                out.push(violation(CATEGORY, "link-name-missing", describe(&link))?);
            }
        }
        Ok(())
    }

    fn check_buttons(document: &Html, out: &mut Vec<NewFinding>) -> Result<(), RuleError> {
        for button in select_all(document, "button, [role=button]")? {
            if text_of(&button).is_empty()
                && !has_attr(&button, "aria-label")
                && !has_attr(&button, "aria-labelledby")
                && !has_attr(&button, "title")
            {
                out.push(violation(CATEGORY, "button-name-missing", describe(&button))?);
            }
        }
        for input in select_all(document, "input[type=submit], input[type=button], input[type=reset]")? {
            if !has_attr(&input, "value") && !has_attr(&input, "aria-label") {
                out.push(violation(CATEGORY, "button-name-missing", describe(&input))?);
            }
        }
        Ok(())
    }

    fn check_form_labels(document: &Html, out: &mut Vec<NewFinding>) -> Result<(), RuleError> {
        let labelled: HashSet<String> = select_all(document, "label[for]")?
            .iter()
            .filter_map(|l| l.value().attr("for"))
            .map(|f| f.to_string())
            .collect();

        for control in select_all(document, "input, select, textarea")? {
            let value = control.value();
            if value.name() == "input"
                && matches!(
                    value.attr("type").map(|t| t.to_ascii_lowercase()).as_deref(),
                    Some("hidden" | "submit" | "button" | "reset" | "image")
                )
            {
                continue;
            }
            let by_for = value.id().map(|id| labelled.contains(id)).unwrap_or(false);
            let wrapped = control.ancestors().any(|node| {
                node.value()
                    .as_element()
                    .map(|e| e.name() == "label")
                    .unwrap_or(false)
            });
            if by_for
                || wrapped
                || has_attr(&control, "aria-label")
                || has_attr(&control, "aria-labelledby")
                || has_attr(&control, "title")
            {
                continue;
            }
            out.push(violation(CATEGORY, "form-label-missing", describe(&control))?);
        }
        Ok(())
    }

    fn check_duplicate_ids(document: &Html, out: &mut Vec<NewFinding>) -> Result<(), RuleError> {
        let mut counts: BTreeMap<&str, usize> = BTreeMap::new();
        for element in select_all(document, "[id]")? {
            if let Some(id) = element.value().id() {
                *counts.entry(id).or_default() += 1;
            }
        }
        for (id, count) in counts.into_iter().filter(|(_, c)| *c > 1) {
            out.push(
                violation(CATEGORY, "duplicate-id", format!("#{}", id))?.with_metric(count as f64),
            );
        }
        Ok(())
    }

    fn check_hidden_focusable(document: &Html, out: &mut Vec<NewFinding>) -> Result<(), RuleError> {
        for hidden in select_all(document, "[aria-hidden=true]")? {
            let focusable = std::iter::once(hidden)
                .chain(hidden.descendants().filter_map(scraper::ElementRef::wrap))
                .any(|e| is_focusable(&e));
            if focusable {
                out.push(violation(CATEGORY, "aria-hidden-focusable", describe(&hidden))?);
            }
        }
        Ok(())
    }
}

impl RuleEvaluator for AccessibilityEvaluator {
    fn category(&self) -> RuleCategory {
        CATEGORY
    }

    fn evaluate(&self, page: &PageSnapshot) -> Result<Vec<NewFinding>, RuleError> {
        let document = Html::parse_document(&page.html);
        let mut findings = Vec::new();

        Self::check_lang(&document, &mut findings)?;
        Self::check_links(&document, &mut findings)?;
        Self::check_buttons(&document, &mut findings)?;
        Self::check_form_labels(&document, &mut findings)?;
        Self::check_duplicate_ids(&document, &mut findings)?;
        Self::check_hidden_focusable(&document, &mut findings)?;

        Ok(findings)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rules::test_support::{keys, snapshot};

    #[test]
    fn test_clean_page_has_no_findings() {
        let page = snapshot(
            r#"<html lang="en"><body>
                <a href="/about">About us</a>
                <button>Send</button>
                <label for="email">Email</label><input id="email" type="email">
                <label>Name <input type="text"></label>
            </body></html>"#,
        );
        let findings = AccessibilityEvaluator.evaluate(&page).unwrap();
        assert!(findings.is_empty(), "{:?}", findings);
    }

    #[test]
    fn test_detects_common_violations() {
        let page = snapshot(
            r#"<html><body>
                <a href="/x"></a>
                <button></button>
                <input id="q" type="search">
                <div id="dup"></div><div id="dup"></div>
                <div aria-hidden="true"><a href="/hidden">hidden</a></div>
            </body></html>"#,
        );
        let findings = AccessibilityEvaluator.evaluate(&page).unwrap();
        let keys = keys(&findings);
        assert!(keys.contains(&"html-lang-missing"));
        assert!(keys.contains(&"link-name-missing"));
        assert!(keys.contains(&"button-name-missing"));
        assert!(keys.contains(&"form-label-missing"));
        assert!(keys.contains(&"duplicate-id"));
        assert!(keys.contains(&"aria-hidden-focusable"));

        let dup = findings.iter().find(|f| f.rule_key == "duplicate-id").unwrap();
        assert_eq!(dup.location, "#dup");
        assert_eq!(dup.metric_value, Some(2.0));
    }

    #[test]
    fn test_image_link_with_alt_is_named() {
        let page = snapshot(r#"<html lang="en"><body><a href="/"><img src="logo.svg" alt="Home"></a></body></html>"#);
        let findings = AccessibilityEvaluator.evaluate(&page).unwrap();
        assert!(!keys(&findings).contains(&"link-name-missing"));
    }
}
