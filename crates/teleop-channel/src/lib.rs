//! 共享实时通道
//!
//! 控制循环与仿真循环（或真实硬件驱动）之间唯一的数据交换面，包括：
//! - 类型化端点注册表（`SharedChannel` / `Endpoint<T>`，ArcSwap 无锁读写）
//! - 稳定的逻辑键集合（`ChannelKeys`，仿真 / 真实机器人两套配置）
//! - 各循环注入用的端点集合（`ControlEndpoints` / `SimEndpoints` / `OperatorEndpoints`）
//! - 单槽邮箱（`Mailbox<T>`，覆盖写语义，用于交互力矩）
//!
//! # 语义
//!
//! 每个键都是 last-writer-wins 的原子单元，不排队、不保留历史。
//! 不同键之间没有顺序保证：读者可能看到新的关节位置和旧的关节速度，
//! 控制器需要容忍这种陈旧性。

mod endpoints;
mod error;
mod keys;
mod mailbox;
mod registry;

pub use endpoints::{ControlEndpoints, OperatorEndpoints, SimEndpoints};
pub use error::ChannelError;
pub use keys::{ChannelKeys, KeyProfile};
pub use mailbox::Mailbox;
pub use registry::{Endpoint, SharedChannel};
