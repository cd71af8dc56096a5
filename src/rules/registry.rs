// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use std::collections::BTreeMap;
use std::sync::Arc;

use super::accessibility::AccessibilityEvaluator;
use super::images::ImagesEvaluator;
use super::keyboard::KeyboardEvaluator;
use super::media::MediaEvaluator;
use super::performance::PerformanceEvaluator;
use super::seo::SeoEvaluator;
use super::RuleEvaluator;
use crate::domain::models::category::RuleCategory;

/// 工作器注册表
///
/// 以封闭的类别枚举为键保存评估器，决定一次分析要派发的作业集合
#[derive(Clone, Default)]
pub struct WorkerRegistry {
    evaluators: BTreeMap<RuleCategory, Arc<dyn RuleEvaluator>>,
}

impl WorkerRegistry {
    /// 空注册表
    pub fn new() -> Self {
        Self::default()
    }

    /// 包含全部内置评估器的注册表
    pub fn with_defaults() -> Self {
        Self::new()
            .register(AccessibilityEvaluator)
            .register(SeoEvaluator)
            .register(PerformanceEvaluator::default())
            .register(ImagesEvaluator)
            .register(KeyboardEvaluator)
            .register(MediaEvaluator)
    }

    /// 注册评估器，同一类别后注册的覆盖先注册的
    pub fn register<E>(self, evaluator: E) -> Self
    where
        E: RuleEvaluator + 'static,
    {
        self.register_arc(Arc::new(evaluator))
    }

    pub fn register_arc(mut self, evaluator: Arc<dyn RuleEvaluator>) -> Self {
        self.evaluators.insert(evaluator.category(), evaluator);
        self
    }

    pub fn get(&self, category: RuleCategory) -> Option<Arc<dyn RuleEvaluator>> {
        self.evaluators.get(&category).cloned()
    }

    /// 适用的类别集合（固定顺序）
    pub fn categories(&self) -> Vec<RuleCategory> {
        self.evaluators.keys().copied().collect()
    }

    pub fn len(&self) -> usize {
        self.evaluators.len()
    }

    pub fn is_empty(&self) -> bool {
        self.evaluators.is_empty()
    }
}

impl std::fmt::Debug for WorkerRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WorkerRegistry")
            .field("categories", &self.categories())
            .finish()
    }
}
