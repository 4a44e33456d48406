//! 各循环注入用的端点集合
//!
//! 每个循环只拿到自己需要的端点，而不是直接引用全局键名。

use crate::error::ChannelError;
use crate::keys::ChannelKeys;
use crate::registry::{Endpoint, SharedChannel};
use nalgebra::{DVector, Matrix3, Vector3};

impl Endpoint<DVector<f64>> {
    /// 读取向量并检查维度
    ///
    /// # 错误
    ///
    /// - `ChannelError::Unset`: 键从未写入
    /// - `ChannelError::DimensionMismatch`: 维度不等于 `expected`
    pub fn get_with_dim(&self, expected: usize) -> Result<DVector<f64>, ChannelError> {
        let value = self.get()?;
        if value.len() != expected {
            return Err(ChannelError::DimensionMismatch {
                key: self.key().to_string(),
                expected,
                actual: value.len(),
            });
        }
        Ok(value)
    }
}

/// 控制循环的端点
#[derive(Debug, Clone)]
pub struct ControlEndpoints {
    pub joint_positions: Endpoint<DVector<f64>>,
    pub joint_velocities: Endpoint<DVector<f64>>,
    pub torque_command: Endpoint<DVector<f64>>,
    pub controller_running: Endpoint<i64>,
    pub ee_position: Endpoint<Vector3<f64>>,
    pub ee_orientation: Endpoint<Matrix3<f64>>,
    pub home_position: Endpoint<Vector3<f64>>,
    pub home_orientation: Endpoint<Matrix3<f64>>,
    pub operator: OperatorEndpoints,
}

impl ControlEndpoints {
    /// 在 `channel` 上注册控制循环需要的全部端点
    pub fn register(channel: &SharedChannel, keys: &ChannelKeys) -> Result<Self, ChannelError> {
        Ok(Self {
            joint_positions: channel.endpoint(&keys.joint_positions)?,
            joint_velocities: channel.endpoint(&keys.joint_velocities)?,
            torque_command: channel.endpoint(&keys.torque_command)?,
            controller_running: channel.endpoint(&keys.controller_running)?,
            ee_position: channel.endpoint(&keys.ee_position)?,
            ee_orientation: channel.endpoint(&keys.ee_orientation)?,
            home_position: channel.endpoint(&keys.home_position)?,
            home_orientation: channel.endpoint(&keys.home_orientation)?,
            operator: OperatorEndpoints::register(channel, keys)?,
        })
    }
}

/// 仿真循环（或硬件驱动）的端点
#[derive(Debug, Clone)]
pub struct SimEndpoints {
    pub joint_positions: Endpoint<DVector<f64>>,
    pub joint_velocities: Endpoint<DVector<f64>>,
    pub torque_command: Endpoint<DVector<f64>>,
}

impl SimEndpoints {
    /// 在 `channel` 上注册仿真循环需要的全部端点
    pub fn register(channel: &SharedChannel, keys: &ChannelKeys) -> Result<Self, ChannelError> {
        Ok(Self {
            joint_positions: channel.endpoint(&keys.joint_positions)?,
            joint_velocities: channel.endpoint(&keys.joint_velocities)?,
            torque_command: channel.endpoint(&keys.torque_command)?,
        })
    }
}

/// 遥操作输入端点（操作员设备一侧写入，控制循环读取）
#[derive(Debug, Clone)]
pub struct OperatorEndpoints {
    pub desired_position: Endpoint<Vector3<f64>>,
    pub desired_orientation: Endpoint<Matrix3<f64>>,
    pub calibration_ready: Endpoint<i64>,
}

impl OperatorEndpoints {
    /// 在 `channel` 上注册遥操作输入端点
    pub fn register(channel: &SharedChannel, keys: &ChannelKeys) -> Result<Self, ChannelError> {
        Ok(Self {
            desired_position: channel.endpoint(&keys.desired_position)?,
            desired_orientation: channel.endpoint(&keys.desired_orientation)?,
            calibration_ready: channel.endpoint(&keys.calibration_ready)?,
        })
    }

    /// 发布一帧操作员位姿
    pub fn publish_pose(&self, position: Vector3<f64>, orientation: Matrix3<f64>) {
        self.desired_position.set(position);
        self.desired_orientation.set(orientation);
    }

    /// 触发标定就绪（上升沿）
    pub fn signal_ready(&self) {
        self.calibration_ready.set(1);
    }
}
