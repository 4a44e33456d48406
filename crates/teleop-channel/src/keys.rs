//! 通道键集合
//!
//! 键名保持与现有 sai2 生态（Redis 键）一致，便于与外部进程互通：
//! - 仿真配置：`sai2::sim::panda::...`
//! - 真实机器人配置：`sai2::FrankaPanda::<name>::...`（仅覆盖传感器 / 执行器 / 运行标志）

use serde::{Deserialize, Serialize};

/// 键集合配置
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "profile", rename_all = "snake_case")]
pub enum KeyProfile {
    /// 仿真（默认）
    #[default]
    Simulation,
    /// 真实机器人
    Hardware {
        /// 机器人名称（如 "Juliet"）
        robot_name: String,
    },
}

/// 控制栈使用的全部逻辑键
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChannelKeys {
    // === 传感器（控制循环读取） ===
    pub joint_positions: String,
    pub joint_velocities: String,

    // === 执行器（控制循环写入，仿真读取） ===
    pub torque_command: String,
    pub controller_running: String,

    // === 可观测量（控制循环写入） ===
    pub home_position: String,
    pub home_orientation: String,
    pub ee_position: String,
    pub ee_orientation: String,

    // === 遥操作输入（外部进程写入） ===
    /// 期望末端位置，3 个实数
    pub desired_position: String,
    /// 期望末端姿态，3x3 旋转矩阵
    pub desired_orientation: String,
    /// 标定就绪标志（0/1，消费方读取后复位）
    pub calibration_ready: String,
}

impl ChannelKeys {
    /// 仿真键集合
    pub fn simulation() -> Self {
        Self {
            joint_positions: "sai2::sim::panda::sensors::q".to_string(),
            joint_velocities: "sai2::sim::panda::sensors::dq".to_string(),
            torque_command: "sai2::sim::panda::actuators::fgc".to_string(),
            controller_running: "sai2::sim::panda::controller".to_string(),
            home_position: "sai2::panda::home_position".to_string(),
            home_orientation: "sai2::panda::home_orientation".to_string(),
            ee_position: "sai2::panda::ee_pos".to_string(),
            ee_orientation: "sai2::panda::ee_ori".to_string(),
            desired_position: "teleop::desired_pos".to_string(),
            desired_orientation: "teleop::desired_ori".to_string(),
            calibration_ready: "teleop::replay_ready".to_string(),
        }
    }

    /// 真实机器人键集合
    ///
    /// 只有传感器、执行器和运行标志换成 `sai2::FrankaPanda::<robot_name>::` 前缀，
    /// 可观测量和遥操作输入保持不变。
    pub fn hardware(robot_name: &str) -> Self {
        let prefix = format!("sai2::FrankaPanda::{}", robot_name);
        Self {
            joint_positions: format!("{}::sensors::q", prefix),
            joint_velocities: format!("{}::sensors::dq", prefix),
            torque_command: format!("{}::actuators::fgc", prefix),
            controller_running: format!("{}::running", prefix),
            ..Self::simulation()
        }
    }

    /// 根据配置选择键集合
    pub fn from_profile(profile: &KeyProfile) -> Self {
        match profile {
            KeyProfile::Simulation => Self::simulation(),
            KeyProfile::Hardware { robot_name } => Self::hardware(robot_name),
        }
    }
}

impl Default for ChannelKeys {
    fn default() -> Self {
        Self::simulation()
    }
}
