//! 任务优先级合成
//!
//! 两个任务同时激活时：
//!
//! 1. 主任务以单位阵为上级零空间刷新模型，得到主任务零空间 `N₁`；
//! 2. 次任务以 `N₁` 为上级零空间刷新模型；
//! 3. 总力矩 = 主任务力矩 + 次任务力矩。
//!
//! 次任务力矩已经投影到 `N₁`，不会干扰主任务的跟踪。

use crate::model::RobotModel;
use crate::task::Task;
use nalgebra::{DMatrix, DVector};

/// 合成一拍的关节力矩
///
/// `secondary` 为 `None` 时只运行主任务（以单位阵为上级零空间）。
pub fn compose(
    model: &dyn RobotModel,
    primary: &mut dyn Task,
    secondary: Option<&mut dyn Task>,
) -> DVector<f64> {
    let dof = model.dof();
    let primary_nullspace = primary.update_task_model(model, &DMatrix::identity(dof, dof));

    match secondary {
        Some(secondary) => {
            secondary.update_task_model(model, &primary_nullspace);
            primary.compute_torques() + secondary.compute_torques()
        },
        None => primary.compute_torques(),
    }
}
