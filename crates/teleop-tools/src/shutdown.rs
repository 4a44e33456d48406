//! 协作式退出
//!
//! 进程级布尔标志，由信号处理（SIGINT / SIGTERM / SIGHUP）置位，
//! 各循环在每拍开始时轮询一次。一拍一旦开始总会执行完，不支持拍内取消。

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use thiserror::Error;
use tracing::info;

/// 信号处理安装失败
#[derive(Debug, Error)]
#[error("Failed to install signal handler: {0}")]
pub struct ShutdownError(#[from] ctrlc::Error);

/// 退出信号
///
/// Clone 是轻量的（Arc 指针），所有克隆共享同一个标志。
#[derive(Debug, Clone, Default)]
pub struct ShutdownSignal {
    requested: Arc<AtomicBool>,
}

impl ShutdownSignal {
    /// 创建未触发的退出信号
    pub fn new() -> Self {
        Self::default()
    }

    /// 安装进程信号处理（Ctrl+C / SIGTERM / SIGHUP），返回与之绑定的退出信号
    ///
    /// 每个进程只能安装一次。SIGABRT 不在其中：`abort()` 在处理函数返回后仍会终止进程。
    pub fn install() -> Result<Self, ShutdownError> {
        let signal = Self::new();
        let handler_signal = signal.clone();
        ctrlc::set_handler(move || {
            info!("Received interrupt signal. Shutting down...");
            handler_signal.request();
        })?;
        Ok(signal)
    }

    /// 请求退出
    pub fn request(&self) {
        // Release: 置位前的写入对看到 true 的线程可见
        self.requested.store(true, Ordering::Release);
    }

    /// 是否已请求退出
    pub fn is_requested(&self) -> bool {
        self.requested.load(Ordering::Acquire)
    }

    /// 循环是否应继续运行
    pub fn is_running(&self) -> bool {
        !self.is_requested()
    }
}
