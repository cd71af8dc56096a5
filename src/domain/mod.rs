// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

/// 领域层模块
///
/// 该模块包含审计流水线的核心业务逻辑，包括：
/// - 领域模型（models）：分析、作业、问题、资源和任务
/// - 仓库接口（repositories）：数据持久化与资源存储的抽象接口
/// - 服务（services）：聚合与评分规则
///
/// 领域层不依赖于任何外部实现。
pub mod models;
pub mod repositories;
pub mod services;
