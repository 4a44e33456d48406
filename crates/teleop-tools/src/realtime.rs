//! 线程优先级
//!
//! 启用 `realtime` feature 时，把当前线程提升到最高优先级；
//! 未启用时为空操作。

use tracing::debug;

/// 提升当前线程优先级
///
/// 失败只记录警告，不影响循环运行。
/// 在 Linux 上通常需要 `CAP_SYS_NICE` 或 rtkit。
#[cfg(feature = "realtime")]
pub fn promote_current_thread(name: &str) {
    use thread_priority::{ThreadPriority, set_current_thread_priority};
    use tracing::{info, warn};

    match set_current_thread_priority(ThreadPriority::Max) {
        Ok(_) => {
            info!("{} thread priority set to MAX (realtime)", name);
        },
        Err(e) => {
            warn!(
                "Failed to set {} thread priority: {:?}. \
                On Linux, you may need to run with CAP_SYS_NICE or use rtkit.",
                name, e
            );
        },
    }
    debug!("{} thread running with realtime feature enabled", name);
}

/// 提升当前线程优先级（未启用 `realtime` feature，空操作）
#[cfg(not(feature = "realtime"))]
pub fn promote_current_thread(name: &str) {
    debug!("{} thread running without realtime priority", name);
}
