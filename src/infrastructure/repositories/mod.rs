// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

/// 仓库实现模块
///
/// 基于SeaORM提供领域仓库接口的具体实现。
/// 所有状态转换都是带状态条件的更新语句，受影响行数即转换是否成功。
pub mod analysis_job_repo_impl;
pub mod analysis_repo_impl;
pub mod finding_repo_impl;
pub mod task_repo_impl;

use chrono::{DateTime, FixedOffset, Utc};
use std::str::FromStr;

use crate::domain::repositories::RepositoryError;

/// 写入数据库前统一转换为 UTC 偏移
pub(crate) fn to_db_time(value: DateTime<Utc>) -> DateTime<FixedOffset> {
    value.fixed_offset()
}

pub(crate) fn from_db_time(value: DateTime<FixedOffset>) -> DateTime<Utc> {
    value.with_timezone(&Utc)
}

/// 解析存储为字符串的枚举列
pub(crate) fn parse_column<T: FromStr>(column: &str, value: &str) -> Result<T, RepositoryError> {
    value
        .parse()
        .map_err(|_| RepositoryError::Corrupt(format!("unexpected {} value '{}'", column, value)))
}

#[cfg(test)]
pub(crate) mod test_support {
    use sea_orm::DatabaseConnection;
    use std::sync::Arc;

    use crate::infrastructure::database::connection::create_memory_pool;

    pub async fn memory_db() -> Arc<DatabaseConnection> {
        Arc::new(create_memory_pool().await.unwrap())
    }
}
