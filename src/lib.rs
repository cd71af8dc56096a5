// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

/// 应用程序模块
///
/// 编排器、抓取器和对外的数据传输对象
pub mod application;

/// 配置模块
///
/// 处理应用程序的配置设置和环境变量
pub mod config;

/// 领域模块
///
/// 包含核心业务实体、评分服务和仓库接口
pub mod domain;

/// 引擎模块
///
/// 页面加载器：无头浏览器与 HTTP 回退
pub mod engines;

/// 基础设施模块
///
/// 提供外部服务集成，如数据库、资源存储和指标导出
pub mod infrastructure;

/// 表示层模块
///
/// 处理HTTP请求和响应，包括路由和处理器
pub mod presentation;

/// 队列模块
///
/// 实现任务投递通道和维护调度
pub mod queue;

/// 规则模块
///
/// 各类别的规则评估器和规则目录
pub mod rules;

/// 工具模块
///
/// 错误类型和日志初始化
pub mod utils;

/// 工作器模块
///
/// 实现后台任务处理和工作器管理
pub mod workers;
