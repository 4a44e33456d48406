//! 场景测试公共设施
//!
//! 锁步驱动：每个控制拍之后仿真前进两拍（1kHz / 2kHz），不依赖墙钟，结果可复现。

#![allow(dead_code)]

use nalgebra::{DVector, Matrix3, Vector3};
use teleop_sdk::control::{Phase, TickReport, Transition};
use teleop_sdk::sim::PhysicsStepper;
use teleop_sdk::{SystemConfig, TeleopSystem};

/// 每个控制拍对应的仿真拍数
pub const SIM_TICKS_PER_CONTROL_TICK: usize = 2;

/// 锁步测试台
pub struct LockStep {
    pub system: TeleopSystem,
    pub ticks: u64,
}

impl LockStep {
    /// 装配并初始化控制循环
    pub fn new(config: &SystemConfig) -> Self {
        let mut system = TeleopSystem::build(config).expect("system should build");
        system
            .control_mut()
            .initialize()
            .expect("control loop should initialize");
        Self { system, ticks: 0 }
    }

    /// 一个控制拍 + 两个仿真拍
    pub fn step(&mut self) -> TickReport {
        let report = self.system.control_mut().tick().expect("control tick");
        for _ in 0..SIM_TICKS_PER_CONTROL_TICK {
            self.system.simulation_mut().tick().expect("simulation tick");
        }
        self.ticks += 1;
        report
    }

    /// 最多运行 `max_ticks` 拍，直到发生阶段切换
    pub fn run_until_transition(&mut self, max_ticks: u64) -> Transition {
        for _ in 0..max_ticks {
            if let Some(transition) = self.step().transition {
                return transition;
            }
        }
        panic!(
            "no transition within {} ticks (phase {})",
            max_ticks,
            self.phase()
        );
    }

    pub fn run(&mut self, ticks: u64) {
        for _ in 0..ticks {
            self.step();
        }
    }

    pub fn phase(&self) -> Phase {
        self.system.control().phase()
    }

    pub fn joint_positions(&self) -> DVector<f64> {
        self.system.simulation().stepper().joint_positions().clone()
    }

    /// 控制循环最近发布的末端位置
    pub fn ee_position(&self) -> Vector3<f64> {
        self.system
            .control()
            .endpoints()
            .ee_position
            .get()
            .expect("ee position published")
    }

    pub fn ee_orientation(&self) -> Matrix3<f64> {
        self.system
            .control()
            .endpoints()
            .ee_orientation
            .get()
            .expect("ee orientation published")
    }

    /// 以操作员身份发布设备位姿
    pub fn publish_operator(&self, position: Vector3<f64>, orientation: Matrix3<f64>) {
        self.system.operator().publish_pose(position, orientation);
    }

    pub fn signal_ready(&self) {
        self.system.operator().signal_ready();
    }

    pub fn ready_flag(&self) -> i64 {
        self.system
            .operator()
            .calibration_ready
            .get()
            .expect("ready flag published")
    }
}

/// 仿真从 home 构型（加给定偏移）开始的配置
pub fn config_starting_near_home(mut config: SystemConfig, offset: &[f64]) -> SystemConfig {
    config.simulation.initial_positions = config
        .sequencer
        .home_joint_positions
        .iter()
        .zip(offset.iter().chain(std::iter::repeat(&0.0)))
        .map(|(home, delta)| home + delta)
        .collect();
    config
}

/// 从 home 附近启动，走完 POSTURE，停在 CALIBRATION（相对模式）或 MOTION（绝对模式）
pub fn past_posture(config: SystemConfig) -> LockStep {
    let config = config_starting_near_home(config, &[]);
    let mut bench = LockStep::new(&config);
    bench.run_until_transition(100);
    bench
}

/// 相对模式：走完 POSTURE，并以当前操作员位姿完成标定，进入 MOTION
pub fn calibrated(config: SystemConfig, operator_position: Vector3<f64>) -> LockStep {
    let mut bench = past_posture(config);
    assert_eq!(bench.phase(), Phase::Calibration);
    bench.publish_operator(operator_position, Matrix3::identity());
    bench.signal_ready();
    let transition = bench.run_until_transition(10);
    assert_eq!(transition.to_phase(), Phase::Motion);
    bench
}
