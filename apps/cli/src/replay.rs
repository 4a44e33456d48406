//! 操作员位姿回放
//!
//! 从制表符分隔的日志回放操作员位置，每行：
//!
//! ```text
//! <timestamp>\t[..]\t[x, y, z]\t[..]
//! ```
//!
//! 第三列为设备位置。每个采样写入期望位置并拉高就绪标志，
//! 控制端在 CALIBRATION 阶段看到标志后完成标定。

use nalgebra::Vector3;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::thread;
use std::time::{Duration, Instant};
use teleop_sdk::ShutdownSignal;
use teleop_sdk::channel::{Endpoint, OperatorEndpoints};
use thiserror::Error;
use tracing::{debug, info};

/// 默认回放间隔（毫秒）
pub const DEFAULT_INTERVAL_MS: u64 = 232;

/// 回放配置
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReplayConfig {
    /// 日志文件
    pub file: PathBuf,
    /// 采样间隔（毫秒）
    #[serde(default = "default_interval_ms")]
    pub interval_ms: u64,
    /// 把 z 置零，只回放平面运动
    #[serde(default = "default_planar")]
    pub planar: bool,
}

fn default_interval_ms() -> u64 {
    DEFAULT_INTERVAL_MS
}

fn default_planar() -> bool {
    true
}

impl ReplayConfig {
    pub fn new(file: PathBuf) -> Self {
        Self {
            file,
            interval_ms: DEFAULT_INTERVAL_MS,
            planar: true,
        }
    }

    pub fn interval(&self) -> Duration {
        Duration::from_millis(self.interval_ms)
    }
}

/// 回放错误
#[derive(Error, Debug)]
pub enum ReplayError {
    #[error("Failed to read replay log {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Replay log line {line}: {reason}")]
    Parse { line: usize, reason: String },

    #[error("Replay log {0} contains no samples")]
    Empty(PathBuf),
}

/// 解析一行，返回第三列的位置
fn parse_line(line: &str, line_number: usize) -> Result<Vector3<f64>, ReplayError> {
    let parse_error = |reason: String| ReplayError::Parse {
        line: line_number,
        reason,
    };

    let column = line
        .trim()
        .split('\t')
        .nth(2)
        .ok_or_else(|| parse_error("expected at least 3 tab-separated columns".to_string()))?;
    let values: Vec<f64> = serde_json::from_str(column.trim())
        .map_err(|e| parse_error(format!("invalid position list '{}': {}", column, e)))?;
    match values.as_slice() {
        [x, y, z, ..] => Ok(Vector3::new(*x, *y, *z)),
        _ => Err(parse_error(format!(
            "position list has {} entries, expected 3",
            values.len()
        ))),
    }
}

/// 解析整份日志（跳过空行）
pub fn parse_log(content: &str) -> Result<Vec<Vector3<f64>>, ReplayError> {
    content
        .lines()
        .enumerate()
        .filter(|(_, line)| !line.trim().is_empty())
        .map(|(i, line)| parse_line(line, i + 1))
        .collect()
}

/// 位姿回放源
#[derive(Debug, Clone)]
pub struct PoseReplay {
    positions: Vec<Vector3<f64>>,
    interval: Duration,
}

impl PoseReplay {
    /// 按配置加载日志
    pub fn load(config: &ReplayConfig) -> Result<Self, ReplayError> {
        let content = fs::read_to_string(&config.file).map_err(|source| ReplayError::Io {
            path: config.file.clone(),
            source,
        })?;
        let mut positions = parse_log(&content)?;
        if positions.is_empty() {
            return Err(ReplayError::Empty(config.file.clone()));
        }
        if config.planar {
            positions.iter_mut().for_each(|p| p.z = 0.0);
        }
        info!(
            "Loaded {} operator samples from {}",
            positions.len(),
            config.file.display()
        );
        Ok(Self {
            positions,
            interval: config.interval(),
        })
    }

    pub fn from_positions(positions: Vec<Vector3<f64>>, interval: Duration) -> Self {
        Self {
            positions,
            interval,
        }
    }

    pub fn positions(&self) -> &[Vector3<f64>] {
        &self.positions
    }

    /// 逐个发布采样，直到回放结束或收到退出信号
    ///
    /// # 返回
    ///
    /// 已发布的采样数。
    pub fn run(&self, operator: &OperatorEndpoints, shutdown: &ShutdownSignal) -> usize {
        let mut published = 0;
        for (i, position) in self.positions.iter().enumerate() {
            if !shutdown.is_running() {
                break;
            }
            let start = Instant::now();
            debug!("replay sample {}: {:?}", i, position.as_slice());
            operator.desired_position.set(*position);
            operator.signal_ready();
            published += 1;

            if let Some(remaining) = self.interval.checked_sub(start.elapsed()) {
                thread::sleep(remaining);
            }
        }
        info!("Replay finished after {} samples", published);
        published
    }
}

/// 等待控制端发布 home 位姿（离开 POSTURE），再开始回放
///
/// 控制端离开 POSTURE 时会把操作员目标重置为 home，
/// 在那之前发布的采样会被覆盖。
///
/// # 返回
///
/// 收到退出信号时返回 `false`。
pub fn wait_for_home(home_position: &Endpoint<Vector3<f64>>, shutdown: &ShutdownSignal) -> bool {
    const POLL_INTERVAL: Duration = Duration::from_millis(10);

    while shutdown.is_running() {
        if home_position.is_set() {
            // 让控制端完成本拍的阶段切换
            thread::sleep(POLL_INTERVAL);
            return true;
        }
        thread::sleep(POLL_INTERVAL);
    }
    false
}

/// 检查回放文件存在（启动前给出明确错误）
pub fn ensure_exists(path: &Path) -> Result<(), ReplayError> {
    fs::metadata(path).map(|_| ()).map_err(|source| ReplayError::Io {
        path: path.to_path_buf(),
        source,
    })
}
