//! 任务能力接口
//!
//! 一个任务（关节姿态任务、笛卡尔位姿任务……）每拍经历两步：
//!
//! 1. [`Task::update_task_model`]：用本拍模型和上级任务传下来的零空间投影
//!    刷新内部量，返回"上级零空间 ∩ 本任务零空间"的投影，供下级任务使用；
//! 2. [`Task::compute_torques`]：输出已经投影过的关节力矩。
//!
//! 多任务合成见 [`compose`](crate::compose)。

use crate::model::RobotModel;
use crate::types::{Gains, Pose, RobotFrame};
use nalgebra::{DMatrix, DVector, Matrix3, Vector3};

/// 控制任务
pub trait Task {
    /// 刷新任务模型
    ///
    /// # 参数
    ///
    /// - `model`: 已用本拍状态更新过的机器人模型
    /// - `prior_nullspace`: 上级任务的零空间投影（dof × dof，无上级时为单位阵）
    ///
    /// # 返回
    ///
    /// 本任务与上级任务零空间的组合投影（dof × dof）。
    fn update_task_model(
        &mut self,
        model: &dyn RobotModel,
        prior_nullspace: &DMatrix<f64>,
    ) -> DMatrix<f64>;

    /// 计算本拍关节力矩（已投影到 `prior_nullspace`）
    fn compute_torques(&mut self) -> DVector<f64>;

    /// 以当前状态为目标重新初始化（清积分、目标 = 当前值）
    fn reinitialize(&mut self, model: &dyn RobotModel);
}

/// 关节空间任务
pub trait JointSpaceTask: Task {
    fn set_goal_position(&mut self, goal: DVector<f64>);

    fn goal_position(&self) -> &DVector<f64>;

    /// 最近一次 `update_task_model` 时的关节误差范数是否小于 `tolerance`
    fn goal_position_reached(&self, tolerance: f64) -> bool;

    fn set_gains(&mut self, gains: Gains);

    fn gains(&self) -> Gains;
}

/// 笛卡尔（末端位姿）任务
pub trait CartesianTask: Task {
    fn set_goal_position(&mut self, goal: Vector3<f64>);

    fn set_goal_orientation(&mut self, goal: Matrix3<f64>);

    fn goal_pose(&self) -> Pose<RobotFrame>;
}
