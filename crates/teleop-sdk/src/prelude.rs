//! Prelude - 常用类型的便捷导入
//!
//! ```rust
//! use teleop_sdk::prelude::*;
//! ```

// 装配层（推荐入口）
pub use crate::system::{RunningSystem, SystemConfig, SystemError, SystemReport, TeleopSystem};

// 通道层
pub use teleop_channel::{
    ChannelKeys, ControlEndpoints, KeyProfile, Mailbox, OperatorEndpoints, SharedChannel,
    SimEndpoints,
};

// 控制层
pub use teleop_control::{
    CartesianTask, ControlLoop, ControlSequencer, JointSpaceTask, Phase, Pose, RetargetMode,
    RobotModel, RobotState, SequencerConfig, Task, Transition,
};

// 仿真层
pub use teleop_sim::{PhysicsStepper, SimulationLoop};

// 工具层
pub use teleop_tools::{LoopConfig, LoopTimingStats, ShutdownSignal};

// 错误类型
pub use teleop_channel::ChannelError;
pub use teleop_control::ControlError;
pub use teleop_sim::SimLoopError;
