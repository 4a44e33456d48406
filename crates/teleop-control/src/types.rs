//! 控制层基础类型
//!
//! 位姿带坐标系标记（零大小类型），操作员空间位姿和机器人空间位姿
//! 在类型层面不能混用，跨坐标系只能经过 [`FrameRetargeter`](crate::FrameRetargeter)。

use nalgebra::{DVector, Matrix3, Vector3};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::marker::PhantomData;

/// 坐标系标记
pub trait Frame: fmt::Debug + Clone + Copy + PartialEq + Default + 'static {
    /// 坐标系名称（日志用）
    const NAME: &'static str;
}

/// 机器人基座坐标系
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RobotFrame;

impl Frame for RobotFrame {
    const NAME: &'static str = "robot_base";
}

/// 操作员设备坐标系
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct OperatorFrame;

impl Frame for OperatorFrame {
    const NAME: &'static str = "operator_device";
}

/// 位姿：位置（米）+ 姿态（旋转矩阵）
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Pose<F: Frame> {
    pub position: Vector3<f64>,
    pub orientation: Matrix3<f64>,
    _frame: PhantomData<F>,
}

impl<F: Frame> Pose<F> {
    pub fn new(position: Vector3<f64>, orientation: Matrix3<f64>) -> Self {
        Self {
            position,
            orientation,
            _frame: PhantomData,
        }
    }

    /// 原点 + 单位姿态
    pub fn identity() -> Self {
        Self::new(Vector3::zeros(), Matrix3::identity())
    }

    /// 指定位置 + 单位姿态
    pub fn from_position(position: Vector3<f64>) -> Self {
        Self::new(position, Matrix3::identity())
    }

    pub fn frame_name(&self) -> &'static str {
        F::NAME
    }
}

impl<F: Frame> Default for Pose<F> {
    fn default() -> Self {
        Self::identity()
    }
}

/// 一拍的关节状态快照
#[derive(Debug, Clone, PartialEq)]
pub struct RobotState {
    /// 关节位置
    pub q: DVector<f64>,
    /// 关节速度
    pub dq: DVector<f64>,
}

impl RobotState {
    pub fn new(q: DVector<f64>, dq: DVector<f64>) -> Self {
        Self { q, dq }
    }

    /// 全零状态
    pub fn zeros(dof: usize) -> Self {
        Self::new(DVector::zeros(dof), DVector::zeros(dof))
    }

    pub fn dof(&self) -> usize {
        self.q.len()
    }
}

/// 任务增益
///
/// - `kp`: 比例增益
/// - `kv`: 阻尼（速度）增益
/// - `ki`: 积分增益（0 表示不使用积分项）
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Gains {
    pub kp: f64,
    pub kv: f64,
    #[serde(default)]
    pub ki: f64,
}

impl Gains {
    pub const fn new(kp: f64, kv: f64, ki: f64) -> Self {
        Self { kp, kv, ki }
    }

    /// 替换积分增益
    pub const fn with_ki(self, ki: f64) -> Self {
        Self { ki, ..self }
    }
}

impl fmt::Display for Gains {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "kp={} kv={} ki={}", self.kp, self.kv, self.ki)
    }
}
