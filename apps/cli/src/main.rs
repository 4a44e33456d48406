//! # teleop
//!
//! 进程内启动完整遥操作系统：仿真循环（2kHz）+ 控制循环（1kHz），
//! 可选地从日志回放操作员位置。Ctrl+C / SIGTERM 退出。
//!
//! ```bash
//! # 默认配置（相对模式，设备系偏航 -90°）
//! teleop
//!
//! # 设备系偏航 0°，回放操作员日志
//! teleop 0 --replay poses.txt
//!
//! # 绝对模式 + 配置文件
//! teleop --mode absolute --config teleop.toml
//! ```

use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};
use nalgebra::Vector3;
use std::path::PathBuf;
use std::thread;
use teleop_sdk::{RetargetMode, ShutdownSignal, TeleopSystem};
use tracing::{info, warn};

mod config;
mod replay;

use config::TeleopConfig;
use replay::{PoseReplay, ReplayConfig};

/// teleop - 机械臂实时遥操作
#[derive(Parser, Debug)]
#[command(name = "teleop")]
#[command(about = "Real-time robot arm teleoperation (in-process simulation)", long_about = None)]
#[command(version)]
#[command(allow_negative_numbers = true)]
struct Cli {
    /// 设备系到机器人系的偏航角（度），覆盖配置文件
    yaw_deg: Option<f64>,

    /// TOML 配置文件
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// 遥操作模式
    #[arg(short, long, value_enum)]
    mode: Option<Mode>,

    /// 操作员位置回放日志
    #[arg(long)]
    replay: Option<PathBuf>,

    /// 回放采样间隔（毫秒）
    #[arg(long)]
    replay_interval_ms: Option<u64>,
}

#[derive(ValueEnum, Clone, Copy, Debug)]
enum Mode {
    /// 标定后按增量跟踪
    Relative,
    /// 直接跟踪操作员位姿
    Absolute,
}

impl From<Mode> for RetargetMode {
    fn from(mode: Mode) -> Self {
        match mode {
            Mode::Relative => RetargetMode::Relative,
            Mode::Absolute => RetargetMode::Absolute,
        }
    }
}

impl Cli {
    /// 配置文件 + 命令行覆盖
    fn resolve_config(&self) -> Result<TeleopConfig> {
        let mode = self.mode.map(RetargetMode::from);
        let mut config = match &self.config {
            Some(path) => TeleopConfig::load(path, mode)?,
            None => TeleopConfig::for_mode(mode.unwrap_or_default()),
        };

        if let Some(yaw) = self.yaw_deg {
            config.apply_yaw_offset(yaw);
        }
        if let Some(file) = &self.replay {
            let interval_ms = config.replay.as_ref().map(|r| r.interval_ms);
            config.replay = Some(ReplayConfig {
                interval_ms: interval_ms.unwrap_or(replay::DEFAULT_INTERVAL_MS),
                ..ReplayConfig::new(file.clone())
            });
        }
        if let (Some(interval_ms), Some(replay)) = (self.replay_interval_ms, config.replay.as_mut())
        {
            replay.interval_ms = interval_ms;
        }

        config.system.validate().context("invalid configuration")?;
        Ok(config)
    }
}

fn main() -> Result<()> {
    teleop_sdk::init_logger();

    let cli = Cli::parse();
    let config = cli.resolve_config()?;

    let replay = config
        .replay
        .as_ref()
        .map(|replay_config| {
            replay::ensure_exists(&replay_config.file)?;
            PoseReplay::load(replay_config)
        })
        .transpose()?;

    info!(
        "Starting teleoperation: {:?} mode, yaw offset {:.1}°",
        config.system.sequencer.mode, config.system.sequencer.retarget.yaw_offset_deg
    );

    let shutdown = ShutdownSignal::install().context("failed to install signal handler")?;
    let system = TeleopSystem::build(&config.system)?;
    let running = system.spawn(shutdown.clone())?;

    let replay_thread = match replay {
        Some(replay) => {
            let operator = running.operator().clone();
            let home_position = running
                .channel()
                .endpoint::<Vector3<f64>>(&running.keys().home_position)?;
            let shutdown = shutdown.clone();
            let handle = thread::Builder::new()
                .name("teleop-replay".into())
                .spawn(move || {
                    if replay::wait_for_home(&home_position, &shutdown) {
                        replay.run(&operator, &shutdown);
                    }
                })
                .context("failed to spawn replay thread")?;
            Some(handle)
        },
        None => None,
    };

    let report = running.join();
    // 回放线程在退出信号后的下一个采样点结束
    shutdown.request();
    if let Some(handle) = replay_thread {
        if handle.join().is_err() {
            warn!("Replay thread panicked");
        }
    }

    let report = report?;
    println!("════════════════════════════════════════");
    println!("           控制循环");
    println!("════════════════════════════════════════");
    println!("{}", report.control);
    println!("════════════════════════════════════════");
    println!("           仿真循环");
    println!("════════════════════════════════════════");
    println!("{}", report.simulation);
    Ok(())
}
