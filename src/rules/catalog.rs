// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use once_cell::sync::Lazy;
use std::collections::HashMap;

use super::RuleError;
use crate::domain::models::category::{RuleCategory, Severity};
use crate::domain::models::finding::NewFinding;

/// 规则定义
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RuleDefinition {
    /// 稳定键
    pub key: &'static str,
    pub category: RuleCategory,
    /// 默认严重程度
    pub severity: Severity,
    /// 展示标题
    pub title: &'static str,
}

const fn rule(
    category: RuleCategory,
    key: &'static str,
    severity: Severity,
    title: &'static str,
) -> RuleDefinition {
    RuleDefinition {
        key,
        category,
        severity,
        title,
    }
}

use RuleCategory::*;
use Severity::*;

/// 全部规则
pub static RULES: &[RuleDefinition] = &[
    rule(Accessibility, "html-lang-missing", Serious, "Document has no lang attribute"),
    rule(Accessibility, "link-name-missing", Serious, "Link has no discernible text"),
    rule(Accessibility, "button-name-missing", Critical, "Button has no accessible name"),
    rule(Accessibility, "form-label-missing", Critical, "Form control has no label"),
    rule(Accessibility, "duplicate-id", Minor, "Element id is not unique"),
    rule(Accessibility, "aria-hidden-focusable", Serious, "Hidden element contains focusable content"),
    rule(Seo, "title-missing", Serious, "Page has no title"),
    rule(Seo, "title-length", Minor, "Title length is outside 10-60 characters"),
    rule(Seo, "meta-description-missing", Moderate, "Page has no meta description"),
    rule(Seo, "h1-missing", Moderate, "Page has no h1 heading"),
    rule(Seo, "h1-multiple", Minor, "Page has more than one h1 heading"),
    rule(Seo, "canonical-missing", Minor, "Page has no canonical link"),
    rule(Seo, "noindex-present", Critical, "Page is excluded from indexing"),
    rule(Seo, "viewport-missing", Serious, "Page has no viewport meta tag"),
    rule(Performance, "render-blocking-script", Moderate, "Script blocks rendering"),
    rule(Performance, "excessive-dom-size", Moderate, "DOM contains too many elements"),
    rule(Performance, "page-weight", Serious, "Document is too large"),
    rule(Performance, "slow-response", Serious, "Server responded slowly"),
    rule(Performance, "too-many-stylesheets", Minor, "Page loads too many stylesheets"),
    rule(Images, "image-alt-missing", Critical, "Image has no alt attribute"),
    rule(Images, "image-dimensions-missing", Minor, "Image has no explicit dimensions"),
    rule(Images, "image-lazy-loading", Minor, "Offscreen image is not lazy loaded"),
    rule(Images, "image-legacy-format", Minor, "Image uses a legacy format"),
    rule(Keyboard, "tabindex-positive", Serious, "Element has a positive tabindex"),
    rule(Keyboard, "click-handler-not-focusable", Serious, "Clickable element is not focusable"),
    rule(Keyboard, "focus-outline-removed", Serious, "Focus indicator is removed"),
    rule(Keyboard, "skip-link-missing", Moderate, "Page has no skip link"),
    rule(Media, "video-captions-missing", Critical, "Video has no captions track"),
    rule(Media, "media-autoplay-unmuted", Serious, "Media autoplays with sound"),
    rule(Media, "audio-controls-missing", Moderate, "Audio has no controls"),
    rule(Media, "iframe-title-missing", Serious, "Frame has no title"),
];

static INDEX: Lazy<HashMap<(RuleCategory, &'static str), &'static RuleDefinition>> =
    Lazy::new(|| RULES.iter().map(|r| ((r.category, r.key), r)).collect());

/// 按类别和键查找规则
pub fn find_rule(category: RuleCategory, key: &str) -> Option<&'static RuleDefinition> {
    INDEX.get(&(category, key)).copied()
}

/// 某个类别的全部规则
pub fn rules_for(category: RuleCategory) -> impl Iterator<Item = &'static RuleDefinition> {
    RULES.iter().filter(move |r| r.category == category)
}

/// 以规则的默认严重程度构造一条问题
pub fn violation(
    category: RuleCategory,
    key: &str,
    location: impl Into<String>,
) -> Result<NewFinding, RuleError> {
    let rule = find_rule(category, key).ok_or_else(|| RuleError::UnknownRule {
        category,
        rule_key: key.to_string(),
    })?;
    Ok(NewFinding::new(rule.key, rule.severity, location))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_every_category_has_rules() {
        for category in RuleCategory::ALL {
            assert!(rules_for(category).count() > 0, "{} has no rules", category);
        }
    }

    #[test]
    fn test_keys_unique_within_category() {
        let mut seen = HashSet::new();
        for rule in RULES {
            assert!(seen.insert((rule.category, rule.key)), "duplicate {}", rule.key);
        }
    }

    #[test]
    fn test_lookup_is_category_scoped() {
        assert!(find_rule(RuleCategory::Seo, "title-missing").is_some());
        assert!(find_rule(RuleCategory::Media, "title-missing").is_none());
        assert!(violation(RuleCategory::Keyboard, "made-up", "body").is_err());
    }
}
