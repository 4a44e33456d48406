//! 日志初始化
//!
//! 安装 `tracing-subscriber` 的 fmt 订阅者（`RUST_LOG` 优先，缺省为给定指令），
//! 并把 `log` 宏桥接到 `tracing`。重复调用是空操作。

use std::sync::Once;
use tracing_subscriber::EnvFilter;

static INIT: Once = Once::new();

/// 以 `info` 为缺省级别初始化日志
///
/// # 示例
///
/// ```
/// teleop_sdk::init_logger();
/// tracing::info!("logger ready");
/// ```
pub fn init_logger() {
    init_logger_with("info");
}

/// 以指定的缺省过滤指令初始化日志（如 `"teleop=debug"`）
pub fn init_logger_with(default_directive: &str) {
    INIT.call_once(|| {
        let filter = EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new(default_directive));
        let subscriber = tracing_subscriber::fmt().with_env_filter(filter).finish();

        // 已有全局订阅者（例如宿主程序自己初始化过）时保持不变
        if tracing::subscriber::set_global_default(subscriber).is_err() {
            return;
        }
        if let Err(e) = tracing_log::LogTracer::init() {
            tracing::debug!("log bridge not installed: {}", e);
        }
    });
}
