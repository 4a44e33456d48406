//! 配置文件
//!
//! TOML 格式，所有段落都可省略（使用默认值）：
//!
//! ```toml
//! [control]
//! frequency_hz = 1000.0
//!
//! [simulation_loop]
//! frequency_hz = 2000.0
//!
//! [sequencer]
//! mode = "relative"
//! posture_tolerance = 0.05
//!
//! [sequencer.retarget]
//! yaw_offset_deg = -90.0
//! linear_scale = 1.0
//!
//! [pose_task.position_gains]
//! kp = 100.0
//! kv = 15.0
//!
//! [simulation]
//! inertia = [1.0, 1.0, 1.0, 1.0, 1.0, 1.0, 1.0]
//!
//! [keys]
//! profile = "simulation"
//!
//! [replay]
//! file = "poses.txt"
//! interval_ms = 232
//! ```

use crate::replay::ReplayConfig;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use teleop_sdk::{RetargetMode, SystemConfig};
use thiserror::Error;

/// 配置加载错误
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse config file {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
}

/// `teleop` 配置
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TeleopConfig {
    #[serde(flatten)]
    pub system: SystemConfig,

    /// 操作员位姿回放（可选）
    #[serde(default)]
    pub replay: Option<ReplayConfig>,
}

impl TeleopConfig {
    /// 指定模式的预设配置（无配置文件时使用）
    pub fn for_mode(mode: RetargetMode) -> Self {
        Self {
            system: SystemConfig::for_mode(mode),
            replay: None,
        }
    }

    /// 从 TOML 文件加载
    ///
    /// `mode` 为命令行指定的模式，优先于文件中的 `sequencer.mode`。
    pub fn load(path: &Path, mode: Option<RetargetMode>) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::parse(&content, mode).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// 解析 TOML
    ///
    /// 文件未给出的模式相关字段（POSTURE 增益、容差、积分增强、姿态跟踪、
    /// 位姿任务参数）取所选模式的预设，而不是相对模式的缺省值。
    pub fn parse(content: &str, mode: Option<RetargetMode>) -> Result<Self, toml::de::Error> {
        let file: toml::Table = toml::from_str(content)?;
        let mut config: Self = toml::Value::Table(file.clone()).try_into()?;
        let mode = mode.unwrap_or(config.system.sequencer.mode);
        config.fill_mode_presets(mode, &file);
        Ok(config)
    }

    fn fill_mode_presets(&mut self, mode: RetargetMode, file: &toml::Table) {
        let preset = SystemConfig::for_mode(mode);
        let given = |path: &[&str]| is_given(file, path);

        let sequencer = &mut self.system.sequencer;
        sequencer.mode = mode;
        if !given(&["sequencer", "posture_gains"]) {
            sequencer.posture_gains = preset.sequencer.posture_gains;
        }
        if !given(&["sequencer", "posture_tolerance"]) {
            sequencer.posture_tolerance = preset.sequencer.posture_tolerance;
        }
        if !given(&["sequencer", "integral_boost"]) {
            sequencer.integral_boost = preset.sequencer.integral_boost;
        }
        if !given(&["sequencer", "retarget", "track_orientation"]) {
            sequencer.retarget.track_orientation = preset.sequencer.retarget.track_orientation;
        }

        let pose_task = &mut self.system.pose_task;
        if !given(&["pose_task", "position_gains"]) {
            pose_task.position_gains = preset.pose_task.position_gains;
        }
        if !given(&["pose_task", "orientation_gains"]) {
            pose_task.orientation_gains = preset.pose_task.orientation_gains;
        }
        if !given(&["pose_task", "velocity_saturation"]) {
            pose_task.velocity_saturation = preset.pose_task.velocity_saturation;
        }
        if !given(&["pose_task", "singularity_tolerance"]) {
            pose_task.singularity_tolerance = preset.pose_task.singularity_tolerance;
        }
    }

    /// 覆盖设备系偏航角（度）
    pub fn apply_yaw_offset(&mut self, yaw_offset_deg: f64) {
        self.system.sequencer.retarget.yaw_offset_deg = yaw_offset_deg;
    }
}

/// 文件中是否显式给出了 `path` 指向的字段
fn is_given(table: &toml::Table, path: &[&str]) -> bool {
    match path.split_first() {
        None => true,
        Some((key, [])) => table.contains_key(*key),
        Some((key, rest)) => table
            .get(*key)
            .and_then(toml::Value::as_table)
            .is_some_and(|nested| is_given(nested, rest)),
    }
}
