//! Teleop SDK - 机械臂实时遥操作栈
//!
//! 操作员通过远程位姿设备驱动 7 关节机械臂：控制循环（1kHz）计算关节力矩，
//! 仿真循环（2kHz）推进物理并回传关节状态，两者经共享通道交换数据。
//!
//! # 架构设计
//!
//! 从底层到高层：
//!
//! - **通道层** (`channel`): 按键寻址的最新值存储、交互力矩邮箱
//! - **工具层** (`tools`): 固定频率循环计时、退出信号、实时线程优先级
//! - **控制层** (`control`): 坐标系重定向、任务优先级合成、控制时序状态机、控制循环
//! - **仿真层** (`sim`): 物理步进接口与关节空间参考仿真、仿真循环
//! - **装配层** (`system`): 进程内装配并运行完整系统
//!
//! # 快速开始
//!
//! ```rust,no_run
//! use teleop_sdk::prelude::*;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! teleop_sdk::init_logger();
//! let shutdown = ShutdownSignal::install()?;
//! let system = TeleopSystem::build(&SystemConfig::default())?;
//! let running = system.spawn(shutdown)?;
//! let report = running.join()?;
//! println!("{}", report.control);
//! # Ok(())
//! # }
//! ```

pub use teleop_channel as channel;
pub use teleop_control as control;
pub use teleop_sim as sim;
pub use teleop_tools as tools;

pub mod logging;
pub mod prelude;
pub mod system;

// --- 用户以此为界 ---
// 常用类型通过 Facade 直接导出

pub use logging::{init_logger, init_logger_with};
pub use system::{
    ReferenceControlLoop, ReferenceSimulationLoop, RunningSystem, SystemConfig, SystemError,
    SystemReport, TeleopSystem,
};

pub use teleop_channel::{ChannelError, ChannelKeys, KeyProfile, SharedChannel};
pub use teleop_control::{ControlError, Phase, RetargetMode};
pub use teleop_sim::SimLoopError;
pub use teleop_tools::{LoopConfig, LoopTimingStats, ShutdownSignal};
