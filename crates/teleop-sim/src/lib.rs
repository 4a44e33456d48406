//! 遥操作仿真层
//!
//! - [`PhysicsStepper`]: 物理步进接口（外部物理引擎或 [`JointSpaceSim`]）
//! - [`SimulationLoop`]: 固定 2kHz 循环，读取控制力矩（+ 交互力矩），
//!   步进物理，发布关节状态
//!
//! 仿真循环与控制循环各自计时，不假设相位对齐，只通过共享通道交换数据。

mod error;
pub mod sim_loop;
pub mod stepper;

pub use error::SimLoopError;
pub use sim_loop::SimulationLoop;
pub use stepper::{JointLimit, JointSimConfig, JointSpaceSim, PhysicsStepper};
