//! 控制层错误类型定义

use crate::sequencer::Phase;
use teleop_channel::ChannelError;
use teleop_tools::LoopConfigError;
use thiserror::Error;

/// 控制层错误类型
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ControlError {
    /// 共享通道读取失败（键未写入、类型或维度不符）
    #[error("Channel error: {0}")]
    Channel(#[from] ChannelError),

    /// 循环配置错误
    #[error("Loop config error: {0}")]
    LoopConfig(#[from] LoopConfigError),

    /// 配置与模型不一致
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// 当前阶段不允许的状态切换
    #[error("Invalid phase transition: {from} -> {to}")]
    InvalidTransition { from: Phase, to: Phase },

    /// 关节状态或力矩中出现 NaN / Inf
    #[error("Non-finite {0}")]
    NonFinite(&'static str),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_control_error_display() {
        let err = ControlError::from(ChannelError::Unset {
            key: "sai2::sim::panda::sensors::q".to_string(),
        });
        let msg = err.to_string();
        assert!(msg.starts_with("Channel error:"), "{}", msg);
        assert!(msg.contains("sai2::sim::panda::sensors::q"), "{}", msg);

        let err = ControlError::InvalidTransition {
            from: Phase::Posture,
            to: Phase::Calibration,
        };
        assert_eq!(
            err.to_string(),
            "Invalid phase transition: POSTURE -> CALIBRATION"
        );

        assert_eq!(
            ControlError::NonFinite("torque command").to_string(),
            "Non-finite torque command"
        );
    }
}
