//! 任务参考实现
//!
//! - [`JointTask`]: 关节空间 PID（带动力学解耦）
//! - [`PoseTask`]: 末端位姿任务（操作空间控制，可选速度饱和）

mod joint;
mod pose;

pub use joint::JointTask;
pub use pose::{PoseTask, PoseTaskConfig, VelocitySaturation};
