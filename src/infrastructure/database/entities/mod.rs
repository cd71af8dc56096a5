// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

/// 数据库实体模块
///
/// 使用SeaORM定义数据库表对应的实体结构：
/// 分析、分析作业、问题和投递任务
pub mod analysis;
pub mod analysis_job;
pub mod finding;
pub mod task;
