//! 关节空间姿态任务
//!
//! 控制律：
//!
//! ```text
//! e   = q_goal - q
//! u   = Kp·e - Kv·dq + Ki·∫e dt
//! τ   = Nᵀ · M · u
//! ```
//!
//! 其中 `N` 为上级任务传下来的零空间投影，`M` 为质量矩阵。
//! 积分项只在 `Ki > 0` 时累积，`Ki = 0` 期间积分保持为零。
//! 关节任务占满全部自由度，返回的零空间投影为零矩阵。

use crate::model::RobotModel;
use crate::task::{JointSpaceTask, Task};
use crate::types::Gains;
use nalgebra::{DMatrix, DVector};
use std::time::Duration;

/// 关节姿态任务
#[derive(Debug, Clone)]
pub struct JointTask {
    dof: usize,
    dt: f64,
    gains: Gains,
    goal: DVector<f64>,
    integral: DVector<f64>,
    integral_limit: Option<f64>,

    // 最近一次 update_task_model 的快照
    q: DVector<f64>,
    dq: DVector<f64>,
    mass: DMatrix<f64>,
    projection: DMatrix<f64>,
}

impl JointTask {
    /// 默认增益
    pub const DEFAULT_GAINS: Gains = Gains::new(50.0, 14.0, 0.0);

    /// 创建任务
    ///
    /// # 参数
    ///
    /// - `dof`: 关节数
    /// - `control_period`: 控制周期（积分步长）
    pub fn new(dof: usize, control_period: Duration) -> Self {
        Self {
            dof,
            dt: control_period.as_secs_f64(),
            gains: Self::DEFAULT_GAINS,
            goal: DVector::zeros(dof),
            integral: DVector::zeros(dof),
            integral_limit: None,
            q: DVector::zeros(dof),
            dq: DVector::zeros(dof),
            mass: DMatrix::identity(dof, dof),
            projection: DMatrix::identity(dof, dof),
        }
    }

    pub fn with_gains(mut self, gains: Gains) -> Self {
        self.gains = gains;
        self
    }

    /// 积分项逐关节限幅（rad·s）
    pub fn with_integral_limit(mut self, limit: f64) -> Self {
        self.integral_limit = Some(limit.abs());
        self
    }

    pub fn dof(&self) -> usize {
        self.dof
    }

    /// 当前关节误差（goal - q）
    pub fn error(&self) -> DVector<f64> {
        &self.goal - &self.q
    }

    pub fn integral(&self) -> &DVector<f64> {
        &self.integral
    }
}

impl Task for JointTask {
    fn update_task_model(
        &mut self,
        model: &dyn RobotModel,
        prior_nullspace: &DMatrix<f64>,
    ) -> DMatrix<f64> {
        self.q.clone_from(model.joint_positions());
        self.dq.clone_from(model.joint_velocities());
        self.mass = model.mass_matrix();
        self.projection.clone_from(prior_nullspace);
        DMatrix::zeros(self.dof, self.dof)
    }

    fn compute_torques(&mut self) -> DVector<f64> {
        let error = self.error();

        if self.gains.ki != 0.0 {
            self.integral += &error * self.dt;
            if let Some(limit) = self.integral_limit {
                self.integral.apply(|v| *v = v.clamp(-limit, limit));
            }
        }

        let command = &error * self.gains.kp - &self.dq * self.gains.kv
            + &self.integral * self.gains.ki;
        self.projection.transpose() * (&self.mass * command)
    }

    fn reinitialize(&mut self, model: &dyn RobotModel) {
        self.q.clone_from(model.joint_positions());
        self.dq.clone_from(model.joint_velocities());
        self.goal.clone_from(model.joint_positions());
        self.integral = DVector::zeros(self.dof);
    }
}

impl JointSpaceTask for JointTask {
    fn set_goal_position(&mut self, goal: DVector<f64>) {
        self.goal = goal;
    }

    fn goal_position(&self) -> &DVector<f64> {
        &self.goal
    }

    fn goal_position_reached(&self, tolerance: f64) -> bool {
        self.error().norm() < tolerance
    }

    fn set_gains(&mut self, gains: Gains) {
        if gains.ki == 0.0 {
            self.integral = DVector::zeros(self.dof);
        }
        self.gains = gains;
    }

    fn gains(&self) -> Gains {
        self.gains
    }
}
