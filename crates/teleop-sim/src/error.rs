//! 仿真层错误类型定义

use teleop_channel::ChannelError;
use teleop_tools::LoopConfigError;
use thiserror::Error;

/// 仿真层错误类型
#[derive(Error, Debug, Clone, PartialEq)]
pub enum SimLoopError {
    /// 共享通道读取失败
    #[error("Channel error: {0}")]
    Channel(#[from] ChannelError),

    /// 循环配置错误
    #[error("Loop config error: {0}")]
    LoopConfig(#[from] LoopConfigError),

    /// 仿真参数非法
    #[error("Invalid simulation config: {0}")]
    InvalidConfig(String),

    /// 交互力矩维度与关节数不一致
    #[error("Interactive torque has dimension {actual}, expected {expected}")]
    InteractiveTorqueDimension { expected: usize, actual: usize },
}
