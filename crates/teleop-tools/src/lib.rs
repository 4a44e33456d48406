//! # Teleop Tools - 循环基础设施
//!
//! 控制循环与仿真循环共用的基础设施：
//!
//! - `timing` - 绝对锚点定时器（`spin_sleep`）与循环耗时统计
//! - `shutdown` - 进程级协作式退出标志与信号处理
//! - `realtime` - 可选的线程优先级提升（需要 `realtime` feature）

pub mod realtime;
pub mod shutdown;
pub mod timing;

pub use shutdown::{ShutdownError, ShutdownSignal};
pub use timing::{LoopConfig, LoopConfigError, LoopTimer, LoopTimingStats};
