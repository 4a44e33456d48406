//! 坐标系重定向
//!
//! 把操作员设备空间的位姿换算成机器人基座空间的目标位姿。
//!
//! # 相对模式（标定锚点）
//!
//! ```text
//! p_goal = p_robot0 + s · R_map · (p_op - p_op0)
//! ΔR_op  = R_op0ᵀ · R_op
//! R_goal = (R_map · ΔR_op · R_mapᵀ)^s_ang · R_robot0
//! ```
//!
//! 其中 `(p_robot0, R_robot0)` 为标定时机器人末端位姿，`(p_op0, R_op0)`
//! 为标定时操作员位姿，`R_map` 为设备系到机器人系的固定旋转（绕 Z 轴偏航）。
//!
//! # 绝对模式
//!
//! 操作员位姿直接作为机器人目标，不做换算。

use crate::types::{OperatorFrame, Pose, RobotFrame};
use nalgebra::{Matrix3, Rotation3, UnitQuaternion, Vector3};
use serde::{Deserialize, Serialize};

/// 遥操作模式
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RetargetMode {
    /// 操作员位姿直接作为机器人目标（无标定阶段）
    Absolute,
    /// 以标定锚点为原点的增量映射
    #[default]
    Relative,
}

/// 重定向配置
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetargetConfig {
    /// 位移缩放
    pub linear_scale: f64,
    /// 转角缩放（作用于旋转角度）
    pub angular_scale: f64,
    /// 设备系到机器人系的偏航角（度）
    pub yaw_offset_deg: f64,
    /// 是否把操作员姿态作为末端姿态目标
    pub track_orientation: bool,
}

impl Default for RetargetConfig {
    fn default() -> Self {
        Self {
            linear_scale: 1.0,
            angular_scale: 1.0,
            yaw_offset_deg: -90.0,
            track_orientation: false,
        }
    }
}

/// 设备系 → 机器人系旋转：绕 Z 轴 `yaw_deg` 度
pub fn device_to_robot_rotation(yaw_deg: f64) -> Matrix3<f64> {
    Rotation3::from_axis_angle(&Vector3::z_axis(), yaw_deg.to_radians()).into_inner()
}

/// 标定锚点
///
/// 进入 MOTION 阶段时捕获，之后所有目标都相对它计算。
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CalibrationAnchor {
    /// 标定时机器人末端位姿
    pub robot: Pose<RobotFrame>,
    /// 标定时操作员位姿
    pub operator: Pose<OperatorFrame>,
}

/// 坐标系重定向器
///
/// 纯函数：相同输入总是得到相同输出。
#[derive(Debug, Clone, PartialEq)]
pub struct FrameRetargeter {
    rotation: Matrix3<f64>,
    linear_scale: f64,
    angular_scale: f64,
}

impl FrameRetargeter {
    pub fn new(rotation: Matrix3<f64>, linear_scale: f64, angular_scale: f64) -> Self {
        Self {
            rotation,
            linear_scale,
            angular_scale,
        }
    }

    pub fn from_config(config: &RetargetConfig) -> Self {
        Self::new(
            device_to_robot_rotation(config.yaw_offset_deg),
            config.linear_scale,
            config.angular_scale,
        )
    }

    /// 单位映射（无旋转、无缩放）
    pub fn identity() -> Self {
        Self::new(Matrix3::identity(), 1.0, 1.0)
    }

    pub fn rotation(&self) -> &Matrix3<f64> {
        &self.rotation
    }

    pub fn linear_scale(&self) -> f64 {
        self.linear_scale
    }

    pub fn angular_scale(&self) -> f64 {
        self.angular_scale
    }

    /// 目标位置
    pub fn retarget_position(
        &self,
        anchor: &CalibrationAnchor,
        operator_position: &Vector3<f64>,
    ) -> Vector3<f64> {
        let delta = operator_position - anchor.operator.position;
        anchor.robot.position + self.rotation * delta * self.linear_scale
    }

    /// 目标姿态
    pub fn retarget_orientation(
        &self,
        anchor: &CalibrationAnchor,
        operator_orientation: &Matrix3<f64>,
    ) -> Matrix3<f64> {
        let delta_operator = anchor.operator.orientation.transpose() * operator_orientation;
        let mut delta_robot = self.rotation * delta_operator * self.rotation.transpose();
        if self.angular_scale != 1.0 {
            // 四元数求角，近单位阵时的浮点漂移不会产生 NaN
            delta_robot =
                UnitQuaternion::from_rotation_matrix(&Rotation3::from_matrix_unchecked(delta_robot))
                    .powf(self.angular_scale)
                    .to_rotation_matrix()
                    .into_inner();
        }
        delta_robot * anchor.robot.orientation
    }

    /// 目标位姿
    pub fn retarget(
        &self,
        anchor: &CalibrationAnchor,
        operator: &Pose<OperatorFrame>,
    ) -> Pose<RobotFrame> {
        Pose::new(
            self.retarget_position(anchor, &operator.position),
            self.retarget_orientation(anchor, &operator.orientation),
        )
    }
}

impl Default for FrameRetargeter {
    fn default() -> Self {
        Self::from_config(&RetargetConfig::default())
    }
}

/// 绝对模式：操作员位姿直接视为基座系目标
pub fn absolute_goal(operator: &Pose<OperatorFrame>) -> Pose<RobotFrame> {
    Pose::new(operator.position, operator.orientation)
}
