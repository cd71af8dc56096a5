// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

//! DOM 辅助函数

use scraper::{ElementRef, Html, Selector};

use super::RuleError;

/// 解析 CSS 选择器
pub fn selector(css: &str) -> Result<Selector, RuleError> {
    Selector::parse(css).map_err(|e| RuleError::InvalidSelector(format!("{}: {:?}", css, e)))
}

/// 选出所有匹配元素
pub fn select_all<'a>(document: &'a Html, css: &str) -> Result<Vec<ElementRef<'a>>, RuleError> {
    let selector = selector(css)?;
    Ok(document.select(&selector).collect())
}

/// 元素是否带有非空属性
pub fn has_attr(element: &ElementRef<'_>, name: &str) -> bool {
    element
        .value()
        .attr(name)
        .map(|v| !v.trim().is_empty())
        .unwrap_or(false)
}

/// 元素的可见文本（去除首尾空白）
pub fn text_of(element: &ElementRef<'_>) -> String {
    element.text().collect::<String>().trim().to_string()
}

/// 元素能否通过键盘获得焦点
pub fn is_focusable(element: &ElementRef<'_>) -> bool {
    let value = element.value();
    if let Some(tabindex) = value.attr("tabindex") {
        return tabindex.trim().parse::<i32>().map(|t| t >= 0).unwrap_or(false);
    }
    if value.attr("disabled").is_some() {
        return false;
    }
    match value.name() {
        "a" | "area" => value.attr("href").is_some(),
        "button" | "select" | "textarea" | "iframe" | "summary" => true,
        "input" => value.attr("type") != Some("hidden"),
        _ => value.attr("contenteditable").is_some(),
    }
}

/// 生成简短的位置描述
///
/// 从元素向上拼接 `tag#id` / `tag.class` / `tag`，遇到 id 或 body 即停止
pub fn describe(element: &ElementRef<'_>) -> String {
    let mut parts = Vec::new();
    let mut current = Some(*element);

    while let Some(el) = current {
        let value = el.value();
        let name = value.name();
        if let Some(id) = value.id() {
            parts.push(format!("{}#{}", name, id));
            break;
        }
        match value.classes().next() {
            Some(class) => parts.push(format!("{}.{}", name, class)),
            None => parts.push(name.to_string()),
        }
        if name == "body" || name == "html" {
            break;
        }
        current = el.parent().and_then(ElementRef::wrap);
    }

    parts.reverse();
    parts.join(" > ")
}
