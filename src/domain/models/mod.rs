// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

/// 领域模型模块
///
/// 该模块定义了审计流水线的核心业务实体，包括：
/// - 分析（analysis）：一次针对目标 URL 的完整审计
/// - 分析作业（analysis_job）：某个规则类别在一次分析中的工作单元
/// - 资源（asset）：抓取阶段持久化的页面快照引用
/// - 规则类别与严重程度（category）
/// - 失败原因（failure）
/// - 问题（finding）：工作器检测到的规则违规
/// - 任务（task）：投递通道上的消息
pub mod analysis;
pub mod analysis_job;
pub mod asset;
pub mod category;
pub mod failure;
pub mod finding;
pub mod task;
