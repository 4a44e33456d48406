//! 末端位姿任务（操作空间控制）
//!
//! 每拍：
//!
//! ```text
//! Jₚ = J · N_prior                 (投影到上级零空间的 Jacobian)
//! Λ  = (Jₚ · M⁻¹ · Jₚᵀ)⁺          (操作空间惯量，截断伪逆处理奇异)
//! J̄  = M⁻¹ · Jₚᵀ · Λ               (动力学一致广义逆)
//! N  = (I - J̄ · Jₚ) · N_prior      (传给下级任务的零空间)
//! F  = Λ · [f_pos; f_ori]
//! τ  = Jₚᵀ · F
//! ```
//!
//! 位置 / 姿态反馈各自为 PD(+I)；开启速度饱和时改为
//! `f = Kv · (sat(Kp/Kv · e) - v)`，限制末端趋近目标的速度。

use crate::model::RobotModel;
use crate::task::{CartesianTask, Task};
use crate::types::{Gains, Pose, RobotFrame};
use nalgebra::{DMatrix, DVector, Matrix3, Rotation3, UnitQuaternion, Vector3, Vector6};
use serde::{Deserialize, Serialize};
use std::f64::consts::PI;
use std::time::Duration;

/// 末端速度饱和
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct VelocitySaturation {
    /// 最大线速度（m/s）
    pub linear: f64,
    /// 最大角速度（rad/s）
    pub angular: f64,
}

/// 位姿任务配置
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PoseTaskConfig {
    pub position_gains: Gains,
    pub orientation_gains: Gains,
    pub velocity_saturation: Option<VelocitySaturation>,
    /// 操作空间惯量伪逆的奇异值截断阈值
    pub singularity_tolerance: f64,
}

impl PoseTaskConfig {
    /// 相对（标定）遥操作：柔和增益 + 速度饱和 0.3 m/s、π/3 rad/s
    pub fn relative() -> Self {
        Self {
            position_gains: Gains::new(100.0, 15.0, 0.0),
            orientation_gains: Gains::new(100.0, 15.0, 0.0),
            velocity_saturation: Some(VelocitySaturation {
                linear: 0.3,
                angular: PI / 3.0,
            }),
            singularity_tolerance: 1e-6,
        }
    }

    /// 绝对遥操作：较硬增益，无速度饱和
    pub fn absolute() -> Self {
        Self {
            position_gains: Gains::new(200.0, 20.0, 0.0),
            orientation_gains: Gains::new(200.0, 20.0, 0.0),
            velocity_saturation: None,
            singularity_tolerance: 1e-6,
        }
    }
}

impl Default for PoseTaskConfig {
    fn default() -> Self {
        Self::relative()
    }
}

/// 末端位姿任务
#[derive(Debug, Clone)]
pub struct PoseTask {
    dof: usize,
    dt: f64,
    config: PoseTaskConfig,

    goal_position: Vector3<f64>,
    goal_orientation: Matrix3<f64>,
    integral_position: Vector3<f64>,
    integral_orientation: Vector3<f64>,

    // 最近一次 update_task_model 的快照
    current: Pose<RobotFrame>,
    twist: Vector6<f64>,
    projected_jacobian: DMatrix<f64>,
    lambda: DMatrix<f64>,
}

impl PoseTask {
    pub fn new(dof: usize, control_period: Duration, config: PoseTaskConfig) -> Self {
        Self {
            dof,
            dt: control_period.as_secs_f64(),
            config,
            goal_position: Vector3::zeros(),
            goal_orientation: Matrix3::identity(),
            integral_position: Vector3::zeros(),
            integral_orientation: Vector3::zeros(),
            current: Pose::identity(),
            twist: Vector6::zeros(),
            projected_jacobian: DMatrix::zeros(6, dof),
            lambda: DMatrix::zeros(6, 6),
        }
    }

    pub fn config(&self) -> &PoseTaskConfig {
        &self.config
    }

    /// 最近一次刷新时的末端位姿
    pub fn current_pose(&self) -> Pose<RobotFrame> {
        self.current
    }

    /// 位置误差（goal - current）
    pub fn position_error(&self) -> Vector3<f64> {
        self.goal_position - self.current.position
    }

    /// 姿态误差（旋转向量，基座系）
    ///
    /// 经四元数求角（atan2），收敛时矩阵的浮点漂移不会产生 NaN。
    pub fn orientation_error(&self) -> Vector3<f64> {
        let delta =
            Rotation3::from_matrix_unchecked(self.goal_orientation * self.current.orientation.transpose());
        UnitQuaternion::from_rotation_matrix(&delta).scaled_axis()
    }

    fn feedback(
        error: Vector3<f64>,
        velocity: Vector3<f64>,
        integral: Vector3<f64>,
        gains: Gains,
        max_velocity: Option<f64>,
    ) -> Vector3<f64> {
        match max_velocity {
            Some(limit) if gains.kv > 0.0 => {
                let mut desired_velocity = error * (gains.kp / gains.kv);
                let speed = desired_velocity.norm();
                if speed > limit {
                    desired_velocity *= limit / speed;
                }
                (desired_velocity - velocity) * gains.kv + integral * gains.ki
            },
            _ => error * gains.kp - velocity * gains.kv + integral * gains.ki,
        }
    }
}

impl Task for PoseTask {
    fn update_task_model(
        &mut self,
        model: &dyn RobotModel,
        prior_nullspace: &DMatrix<f64>,
    ) -> DMatrix<f64> {
        let jacobian = model.jacobian();
        let mass = model.mass_matrix();
        let mass_inv = mass
            .clone()
            .try_inverse()
            .unwrap_or_else(|| DMatrix::identity(self.dof, self.dof));

        self.current = model.end_effector_pose();
        self.twist = Vector6::from_iterator((&jacobian * model.joint_velocities()).iter().copied());
        self.projected_jacobian = &jacobian * prior_nullspace;

        let lambda_inv = &self.projected_jacobian * &mass_inv * self.projected_jacobian.transpose();
        // 非有限输入下 SVD 可能不收敛
        self.lambda = if lambda_inv.iter().all(|v| v.is_finite()) {
            lambda_inv
                .pseudo_inverse(self.config.singularity_tolerance)
                .unwrap_or_else(|_| DMatrix::zeros(6, 6))
        } else {
            DMatrix::zeros(6, 6)
        };

        let jbar = &mass_inv * self.projected_jacobian.transpose() * &self.lambda;
        let task_nullspace = DMatrix::identity(self.dof, self.dof) - &jbar * &self.projected_jacobian;
        task_nullspace * prior_nullspace
    }

    fn compute_torques(&mut self) -> DVector<f64> {
        let position_error = self.position_error();
        let orientation_error = self.orientation_error();

        if self.config.position_gains.ki != 0.0 {
            self.integral_position += position_error * self.dt;
        }
        if self.config.orientation_gains.ki != 0.0 {
            self.integral_orientation += orientation_error * self.dt;
        }

        let saturation = self.config.velocity_saturation;
        let force = Self::feedback(
            position_error,
            self.twist.fixed_rows::<3>(0).into_owned(),
            self.integral_position,
            self.config.position_gains,
            saturation.map(|s| s.linear),
        );
        let moment = Self::feedback(
            orientation_error,
            self.twist.fixed_rows::<3>(3).into_owned(),
            self.integral_orientation,
            self.config.orientation_gains,
            saturation.map(|s| s.angular),
        );

        let wrench = DVector::from_iterator(6, force.iter().chain(moment.iter()).copied());
        self.projected_jacobian.transpose() * (&self.lambda * wrench)
    }

    fn reinitialize(&mut self, model: &dyn RobotModel) {
        self.current = model.end_effector_pose();
        self.goal_position = self.current.position;
        self.goal_orientation = self.current.orientation;
        self.integral_position = Vector3::zeros();
        self.integral_orientation = Vector3::zeros();
    }
}

impl CartesianTask for PoseTask {
    fn set_goal_position(&mut self, goal: Vector3<f64>) {
        self.goal_position = goal;
    }

    fn set_goal_orientation(&mut self, goal: Matrix3<f64>) {
        self.goal_orientation = goal;
    }

    fn goal_pose(&self) -> Pose<RobotFrame> {
        Pose::new(self.goal_position, self.goal_orientation)
    }
}
