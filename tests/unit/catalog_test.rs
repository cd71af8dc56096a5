// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use auditrs::domain::models::category::RuleCategory;
use auditrs::engines::validators::normalize_target;
use auditrs::rules::{find_rule, rules_for, WorkerRegistry};

#[test]
fn test_every_category_has_evaluator_and_rules() {
    let registry = WorkerRegistry::with_defaults();
    for category in RuleCategory::ALL {
        let evaluator = registry.get(category).unwrap();
        assert_eq!(evaluator.category(), category);
        assert!(rules_for(category).count() > 0, "{} has no rules", category);
    }
    assert_eq!(registry.categories(), RuleCategory::ALL.to_vec());
}

#[test]
fn test_rule_keys_are_scoped_to_category() {
    assert!(find_rule(RuleCategory::Seo, "title-missing").is_some());
    assert!(find_rule(RuleCategory::Accessibility, "title-missing").is_none());
    assert!(find_rule(RuleCategory::Media, "no-such-rule").is_none());
}

#[test]
fn test_target_normalization() {
    assert_eq!(
        normalize_target("example.com").unwrap(),
        "https://example.com/"
    );
    assert_eq!(
        normalize_target("  http://example.com/a#top ").unwrap(),
        "http://example.com/a"
    );
    assert!(normalize_target("not a url").is_err());
    assert!(normalize_target("").is_err());
    assert!(normalize_target("ftp://example.com").is_err());
}
