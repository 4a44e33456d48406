//! 通道层错误类型定义

use thiserror::Error;

/// 通道层错误类型
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ChannelError {
    /// 键从未被写入
    #[error("Channel key '{key}' has never been written")]
    Unset { key: String },

    /// 同一个键被注册为不同的值类型
    #[error("Channel key '{key}' holds {registered}, requested as {requested}")]
    TypeMismatch {
        key: String,
        registered: &'static str,
        requested: &'static str,
    },

    /// 向量维度与机器人自由度不一致
    #[error("Channel key '{key}' has dimension {actual}, expected {expected}")]
    DimensionMismatch {
        key: String,
        expected: usize,
        actual: usize,
    },
}
