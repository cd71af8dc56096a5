// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use async_trait::async_trait;
use thiserror::Error;

/// 存储错误类型
#[derive(Error, Debug)]
pub enum StorageError {
    /// IO错误
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    /// 键已存在（资源只写一次）
    #[error("Asset already exists: {0}")]
    AlreadyExists(String),
    /// 存储错误
    #[error("Storage error: {0}")]
    Other(String),
}

/// 资源存储特质
///
/// 一写多读的对象存储。`put` 返回成功即代表数据已持久化，
/// 之后的任何 `get` 都能读到写入的值。
#[async_trait]
pub trait AssetStore: Send + Sync {
    /// 写入资源，键已存在时返回 `StorageError::AlreadyExists`
    async fn put(&self, key: &str, data: &[u8], content_type: &str) -> Result<(), StorageError>;

    /// 读取资源
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, StorageError>;

    /// 删除资源（不存在时视为成功）
    async fn delete(&self, key: &str) -> Result<(), StorageError>;
}
