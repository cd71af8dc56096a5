// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

/// 领域服务模块
///
/// - 评分服务（scoring_service）：由作业状态和问题计算分析终态与得分
///
/// 领域服务只包含纯粹的业务规则，编排与持久化由应用层负责。
pub mod scoring_service;
