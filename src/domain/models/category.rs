// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// 规则类别
///
/// 每个类别对应一个独立的规则评估工作器，同时也是一个独立的评分维度。
/// 这是一个封闭枚举：新增类别必须同时提供对应的评估器实现。
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RuleCategory {
    /// 无障碍（ARIA、表单标签、语言声明等）
    Accessibility,
    /// 搜索引擎优化（技术 SEO 与页面 SEO）
    Seo,
    /// 性能（阻塞渲染资源、页面体积、响应时间）
    Performance,
    /// 图片（替代文本、尺寸、懒加载、格式）
    Images,
    /// 键盘导航（tabindex、焦点可见性、跳转链接）
    Keyboard,
    /// 多媒体（字幕、自动播放、控件）
    Media,
}

impl RuleCategory {
    /// 全部类别，按固定顺序排列
    pub const ALL: [RuleCategory; 6] = [
        RuleCategory::Accessibility,
        RuleCategory::Seo,
        RuleCategory::Performance,
        RuleCategory::Images,
        RuleCategory::Keyboard,
        RuleCategory::Media,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            RuleCategory::Accessibility => "accessibility",
            RuleCategory::Seo => "seo",
            RuleCategory::Performance => "performance",
            RuleCategory::Images => "images",
            RuleCategory::Keyboard => "keyboard",
            RuleCategory::Media => "media",
        }
    }
}

impl fmt::Display for RuleCategory {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RuleCategory {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "accessibility" => Ok(RuleCategory::Accessibility),
            "seo" => Ok(RuleCategory::Seo),
            "performance" => Ok(RuleCategory::Performance),
            "images" => Ok(RuleCategory::Images),
            "keyboard" => Ok(RuleCategory::Keyboard),
            "media" => Ok(RuleCategory::Media),
            _ => Err(()),
        }
    }
}

/// 问题严重程度
///
/// 排序遵循 critical > serious > moderate > minor
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Minor,
    Moderate,
    Serious,
    Critical,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Severity::Minor => write!(f, "minor"),
            Severity::Moderate => write!(f, "moderate"),
            Severity::Serious => write!(f, "serious"),
            Severity::Critical => write!(f, "critical"),
        }
    }
}

impl FromStr for Severity {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "minor" => Ok(Severity::Minor),
            "moderate" => Ok(Severity::Moderate),
            "serious" => Ok(Severity::Serious),
            "critical" => Ok(Severity::Critical),
            _ => Err(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_category_string_round_trip() {
        for category in RuleCategory::ALL {
            assert_eq!(category.to_string().parse::<RuleCategory>(), Ok(category));
        }
        assert!("colour".parse::<RuleCategory>().is_err());
    }

    #[test]
    fn test_severity_ordering() {
        assert!(Severity::Critical > Severity::Serious);
        assert!(Severity::Serious > Severity::Moderate);
        assert!(Severity::Moderate > Severity::Minor);
    }
}
