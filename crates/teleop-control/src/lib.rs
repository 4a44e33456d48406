//! 遥操作控制层
//!
//! 本 crate 把操作员的远程位姿指令变成机械臂关节力矩，包括：
//! - 坐标系重定向（`retarget`）：操作员空间增量 → 机器人空间目标
//! - 任务能力接口（`task`）与参考实现（`tasks`）：关节姿态任务、笛卡尔位姿任务
//! - 任务优先级合成（`priority`）：主任务零空间投影到次任务
//! - 控制时序状态机（`sequencer`）：POSTURE → CALIBRATION → MOTION
//! - 控制循环驱动（`control_loop`）：固定 1kHz，经共享通道读状态、写力矩
//!
//! # 数据流
//!
//! ```text
//! SharedChannel ──q, dq──▶ RobotModel ──▶ ControlSequencer ──τ──▶ SharedChannel
//!                 operator pose ───────────────▲
//! ```
//!
//! 运动学 / 动力学的数值实现通过 [`RobotModel`] 和 [`Task`] trait 注入；
//! 本 crate 自带的 [`GantryModel`]、[`JointTask`]、[`PoseTask`] 用于仿真和测试。

pub mod control_loop;
mod error;
pub mod model;
pub mod priority;
pub mod retarget;
pub mod sequencer;
pub mod task;
pub mod tasks;
pub mod types;

pub use control_loop::{ControlLoop, TickReport};
pub use error::ControlError;
pub use model::{GantryModel, RobotModel};
pub use priority::compose;
pub use retarget::{
    CalibrationAnchor, FrameRetargeter, RetargetConfig, RetargetMode, absolute_goal,
    device_to_robot_rotation,
};
pub use sequencer::{
    ControlSequencer, IntegralBoost, Phase, SequencerConfig, SequencerInput, Session,
    TickOutcome, Transition,
};
pub use task::{CartesianTask, JointSpaceTask, Task};
pub use tasks::{JointTask, PoseTask, PoseTaskConfig, VelocitySaturation};
pub use types::{Frame, Gains, OperatorFrame, Pose, RobotFrame, RobotState};
