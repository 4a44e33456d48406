//! 控制循环驱动
//!
//! 固定频率（默认 1000 Hz）循环，每拍严格按以下顺序执行：
//!
//! 1. 从共享通道读取关节位置 / 速度
//! 2. 用读到的状态更新机器人模型
//! 3. 发布末端位姿
//! 4. 读取操作员位姿（CALIBRATION 阶段额外读取就绪标志）
//! 5. 推进状态机一拍，执行阶段切换的副作用
//! 6. 发布关节力矩
//!
//! 退出（收到退出信号、达到 `max_ticks` 或出错）时总会写一次零力矩，
//! 并把 controller-running 标志清零。
//!
//! # 使用示例
//!
//! ```
//! use std::time::Duration;
//! use nalgebra::DVector;
//! use teleop_channel::{ChannelKeys, ControlEndpoints, SharedChannel, SimEndpoints};
//! use teleop_control::{ControlLoop, ControlSequencer, GantryModel, PoseTaskConfig, SequencerConfig};
//! use teleop_tools::LoopConfig;
//!
//! let channel = SharedChannel::new();
//! let keys = ChannelKeys::simulation();
//! let sim = SimEndpoints::register(&channel, &keys).unwrap();
//! sim.joint_positions.set(DVector::zeros(7));
//! sim.joint_velocities.set(DVector::zeros(7));
//!
//! let config = LoopConfig::control();
//! let sequencer = ControlSequencer::with_reference_tasks(
//!     SequencerConfig::relative(),
//!     PoseTaskConfig::relative(),
//!     7,
//!     config.period(),
//! );
//! let mut control = ControlLoop::new(
//!     ControlEndpoints::register(&channel, &keys).unwrap(),
//!     GantryModel::new(7).unwrap(),
//!     sequencer,
//!     config,
//! )
//! .unwrap();
//!
//! control.initialize().unwrap();
//! let report = control.tick().unwrap();
//! assert!(report.transition.is_none());
//! assert_eq!(sim.torque_command.get().unwrap().len(), 7);
//! ```

use crate::error::ControlError;
use crate::model::RobotModel;
use crate::sequencer::{ControlSequencer, Phase, SequencerInput, Transition};
use crate::task::{CartesianTask, JointSpaceTask};
use crate::types::{OperatorFrame, Pose, RobotFrame, RobotState};
use nalgebra::{DVector, Matrix3, Vector3};
use teleop_channel::ControlEndpoints;
use teleop_tools::{LoopConfig, LoopTimer, LoopTimingStats, ShutdownSignal, realtime};
use tracing::{error, info, trace, warn};

/// 单拍结果
#[derive(Debug, Clone, PartialEq)]
pub struct TickReport {
    /// 本拍结束后的阶段
    pub phase: Phase,
    /// 本拍发生的阶段切换
    pub transition: Option<Transition>,
    /// MOTION 阶段的末端目标位姿
    pub goal: Option<Pose<RobotFrame>>,
}

/// 控制循环
pub struct ControlLoop<M, J, P> {
    endpoints: ControlEndpoints,
    model: M,
    sequencer: ControlSequencer<J, P>,
    config: LoopConfig,
    dof: usize,
}

impl<M, J, P> ControlLoop<M, J, P>
where
    M: RobotModel,
    J: JointSpaceTask,
    P: CartesianTask,
{
    /// 创建控制循环
    ///
    /// # 错误
    ///
    /// - 循环频率非法
    /// - home 构型长度与模型自由度不一致
    pub fn new(
        endpoints: ControlEndpoints,
        model: M,
        sequencer: ControlSequencer<J, P>,
        config: LoopConfig,
    ) -> Result<Self, ControlError> {
        config.validate()?;
        let dof = model.dof();
        sequencer.config().validate(dof)?;
        Ok(Self {
            endpoints,
            model,
            sequencer,
            config,
            dof,
        })
    }

    pub fn model(&self) -> &M {
        &self.model
    }

    pub fn sequencer(&self) -> &ControlSequencer<J, P> {
        &self.sequencer
    }

    pub fn endpoints(&self) -> &ControlEndpoints {
        &self.endpoints
    }

    pub fn phase(&self) -> Phase {
        self.sequencer.phase()
    }

    /// 启动前初始化共享通道
    ///
    /// 操作员位姿置为原点 + 单位姿态，就绪标志清零，controller-running 置 1，
    /// 并用当前关节状态刷新一次模型。
    ///
    /// # 错误
    ///
    /// 关节状态尚未发布或维度不符时返回 `ControlError::Channel`。
    pub fn initialize(&mut self) -> Result<(), ControlError> {
        let operator = &self.endpoints.operator;
        operator.publish_pose(Vector3::zeros(), Matrix3::identity());
        operator.calibration_ready.set(0);

        let state = self.read_state()?;
        self.model.update(&state);
        self.endpoints.controller_running.set(1);
        info!(
            "Control loop initialized ({} joints, {:.0} Hz, phase {})",
            self.dof,
            self.config.frequency_hz,
            self.phase()
        );
        Ok(())
    }

    fn read_state(&self) -> Result<RobotState, ControlError> {
        let q = self.endpoints.joint_positions.get_with_dim(self.dof)?;
        let dq = self.endpoints.joint_velocities.get_with_dim(self.dof)?;
        if !q.iter().chain(dq.iter()).all(|v| v.is_finite()) {
            return Err(ControlError::NonFinite("joint state"));
        }
        Ok(RobotState::new(q, dq))
    }

    fn read_operator_pose(&self) -> Result<Pose<OperatorFrame>, ControlError> {
        let operator = &self.endpoints.operator;
        Ok(Pose::new(
            operator.desired_position.get()?,
            operator.desired_orientation.get()?,
        ))
    }

    /// 执行一拍
    pub fn tick(&mut self) -> Result<TickReport, ControlError> {
        // 1-2. 状态 → 模型
        let state = self.read_state()?;
        self.model.update(&state);

        // 3. 末端位姿
        let ee = self.model.end_effector_pose();
        self.endpoints.ee_position.set(ee.position);
        self.endpoints.ee_orientation.set(ee.orientation);

        // 4. 操作员输入
        let operator_pose = self.read_operator_pose()?;
        let calibration_ready = if self.phase() == Phase::Calibration {
            self.endpoints.operator.calibration_ready.get()? != 0
        } else {
            false
        };

        // 5. 状态机
        let outcome = self.sequencer.step(
            &self.model,
            &SequencerInput {
                operator_pose,
                calibration_ready,
            },
        );
        if let Some(transition) = &outcome.transition {
            self.apply_transition(transition);
        }

        // 6. 力矩
        if !outcome.torques.iter().all(|t| t.is_finite()) {
            return Err(ControlError::NonFinite("torque command"));
        }
        trace!("torque command: {:?}", outcome.torques.as_slice());
        self.endpoints.torque_command.set(outcome.torques);

        Ok(TickReport {
            phase: self.phase(),
            transition: outcome.transition,
            goal: outcome.goal,
        })
    }

    fn apply_transition(&self, transition: &Transition) {
        if let Some(home) = transition.home() {
            self.endpoints.home_position.set(home.position);
            self.endpoints.home_orientation.set(home.orientation);
        }

        match transition {
            Transition::PostureToCalibration { home } | Transition::PostureToMotion { home } => {
                // 操作员尚未发布时，目标保持在 home
                self.endpoints
                    .operator
                    .publish_pose(home.position, home.orientation);
            },
            Transition::CalibrationToMotion { .. }
            | Transition::MotionToCalibration { .. }
            | Transition::Restarted { .. } => {
                self.endpoints.operator.calibration_ready.set(0);
            },
        }
    }

    /// MOTION → CALIBRATION（两拍之间调用）
    pub fn recalibrate(&mut self) -> Result<Transition, ControlError> {
        let transition = self.sequencer.recalibrate(&self.model)?;
        self.apply_transition(&transition);
        Ok(transition)
    }

    /// 任意阶段 → POSTURE（两拍之间调用）
    pub fn restart(&mut self) -> Transition {
        let transition = self.sequencer.restart(&self.model);
        self.apply_transition(&transition);
        transition
    }

    /// 写零力矩并清除 controller-running 标志
    pub fn shutdown(&mut self) {
        self.endpoints.torque_command.set(DVector::zeros(self.dof));
        self.endpoints.controller_running.set(0);
        info!("Control loop stopped, zero torque commanded");
    }

    /// 运行到退出信号（或 `max_ticks`）
    ///
    /// 每拍开始时轮询一次 `shutdown`。无论正常退出还是出错，
    /// 都会先写零力矩，再返回。
    ///
    /// # 返回
    ///
    /// 循环耗时统计。
    pub fn run(&mut self, shutdown: &ShutdownSignal) -> Result<LoopTimingStats, ControlError> {
        realtime::promote_current_thread("control");

        if let Err(e) = self.initialize() {
            self.shutdown();
            return Err(e);
        }

        let mut timer = match LoopTimer::new(&self.config) {
            Ok(timer) => timer,
            Err(e) => {
                self.shutdown();
                return Err(e.into());
            },
        };

        let result = loop {
            if !shutdown.is_running() {
                break Ok(());
            }
            if self.config.max_ticks.is_some_and(|max| timer.ticks() >= max) {
                break Ok(());
            }

            timer.wait_for_next_loop();
            if let Err(e) = self.tick() {
                error!("Control loop tick {} failed: {}", timer.ticks(), e);
                break Err(e);
            }
        };

        timer.stop();
        self.shutdown();

        let stats = timer.stats();
        info!("Control loop timer stats:\n{}", stats);
        if stats.overruns > 0 {
            warn!(
                "Control loop overran {} of {} ticks ({:.2}%)",
                stats.overruns,
                stats.ticks,
                stats.overrun_rate()
            );
        }

        result.map(|()| stats)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::GantryModel;
    use crate::sequencer::{DEFAULT_HOME_JOINT_POSITIONS, SequencerConfig};
    use crate::tasks::{JointTask, PoseTask, PoseTaskConfig};
    use teleop_channel::{ChannelError, ChannelKeys, SharedChannel, SimEndpoints};

    type TestLoop = ControlLoop<GantryModel, JointTask, PoseTask>;

    fn setup(config: SequencerConfig) -> (TestLoop, SimEndpoints) {
        let channel = SharedChannel::new();
        let keys = ChannelKeys::simulation();
        let sim = SimEndpoints::register(&channel, &keys).unwrap();
        let loop_config = LoopConfig {
            frequency_hz: 1000.0,
            initial_wait_us: 0,
            max_ticks: Some(5),
        };
        let sequencer = ControlSequencer::with_reference_tasks(
            config,
            PoseTaskConfig::relative(),
            7,
            loop_config.period(),
        );
        let control = ControlLoop::new(
            ControlEndpoints::register(&channel, &keys).unwrap(),
            GantryModel::new(7).unwrap(),
            sequencer,
            loop_config,
        )
        .unwrap();
        (control, sim)
    }

    fn publish_state(sim: &SimEndpoints, q: DVector<f64>) {
        let dof = q.len();
        sim.joint_positions.set(q);
        sim.joint_velocities.set(DVector::zeros(dof));
    }

    fn home() -> DVector<f64> {
        DVector::from_column_slice(&DEFAULT_HOME_JOINT_POSITIONS)
    }

    #[test]
    fn test_new_rejects_mismatched_home() {
        let channel = SharedChannel::new();
        let keys = ChannelKeys::simulation();
        let sequencer = ControlSequencer::with_reference_tasks(
            SequencerConfig::relative(),
            PoseTaskConfig::relative(),
            6,
            LoopConfig::control().period(),
        );
        let result = ControlLoop::new(
            ControlEndpoints::register(&channel, &keys).unwrap(),
            GantryModel::new(6).unwrap(),
            sequencer,
            LoopConfig::control(),
        );
        assert!(matches!(result, Err(ControlError::InvalidConfig(_))));
    }

    #[test]
    fn test_initialize_seeds_operator_keys() {
        let (mut control, sim) = setup(SequencerConfig::relative());
        publish_state(&sim, DVector::zeros(7));
        control.initialize().unwrap();

        let endpoints = control.endpoints();
        assert_eq!(endpoints.operator.desired_position.get().unwrap(), Vector3::zeros());
        assert_eq!(
            endpoints.operator.desired_orientation.get().unwrap(),
            Matrix3::identity()
        );
        assert_eq!(endpoints.operator.calibration_ready.get().unwrap(), 0);
        assert_eq!(endpoints.controller_running.get().unwrap(), 1);
    }

    #[test]
    fn test_initialize_fails_without_robot_state() {
        let (mut control, _sim) = setup(SequencerConfig::relative());
        assert!(matches!(
            control.initialize(),
            Err(ControlError::Channel(ChannelError::Unset { .. }))
        ));
    }

    #[test]
    fn test_tick_publishes_ee_pose_and_torque() {
        let (mut control, sim) = setup(SequencerConfig::relative());
        let mut q = DVector::zeros(7);
        q[0] = 0.25;
        publish_state(&sim, q);
        control.initialize().unwrap();

        let report = control.tick().unwrap();
        assert_eq!(report.phase, Phase::Posture);
        assert_eq!(
            control.endpoints().ee_position.get().unwrap(),
            Vector3::new(0.25, 0.0, 0.0)
        );
        assert_eq!(sim.torque_command.get().unwrap().len(), 7);
    }

    #[test]
    fn test_posture_exit_publishes_home_and_seeds_desired_pose() {
        let (mut control, sim) = setup(SequencerConfig::relative());
        publish_state(&sim, home());
        control.initialize().unwrap();

        let report = control.tick().unwrap();
        assert!(matches!(
            report.transition,
            Some(Transition::PostureToCalibration { .. })
        ));

        let endpoints = control.endpoints();
        let ee = control.model().end_effector_pose();
        assert_eq!(endpoints.home_position.get().unwrap(), ee.position);
        assert_eq!(endpoints.home_orientation.get().unwrap(), ee.orientation);
        assert_eq!(endpoints.operator.desired_position.get().unwrap(), ee.position);
    }

    #[test]
    fn test_ready_flag_consumed_on_motion_entry() {
        let (mut control, sim) = setup(SequencerConfig::relative());
        publish_state(&sim, home());
        control.initialize().unwrap();
        control.tick().unwrap();
        assert_eq!(control.phase(), Phase::Calibration);

        control.endpoints().operator.signal_ready();
        let report = control.tick().unwrap();
        assert!(matches!(
            report.transition,
            Some(Transition::CalibrationToMotion { .. })
        ));
        assert_eq!(report.phase, Phase::Motion);
        assert_eq!(
            control.endpoints().operator.calibration_ready.get().unwrap(),
            0
        );
    }

    #[test]
    fn test_dimension_mismatch_is_reported() {
        let (mut control, sim) = setup(SequencerConfig::relative());
        publish_state(&sim, DVector::zeros(7));
        control.initialize().unwrap();
        publish_state(&sim, DVector::zeros(6));

        assert!(matches!(
            control.tick(),
            Err(ControlError::Channel(ChannelError::DimensionMismatch {
                expected: 7,
                actual: 6,
                ..
            }))
        ));
    }

    #[test]
    fn test_non_finite_state_stops_with_zero_torque() {
        let (mut control, sim) = setup(SequencerConfig::relative());
        publish_state(&sim, home());
        control.initialize().unwrap();
        control.tick().unwrap();

        let mut q = home();
        q[4] = f64::NAN;
        publish_state(&sim, q);
        assert_eq!(control.tick(), Err(ControlError::NonFinite("joint state")));

        let result = control.run(&ShutdownSignal::new());
        assert_eq!(result.err(), Some(ControlError::NonFinite("joint state")));
        assert_eq!(sim.torque_command.get().unwrap(), DVector::zeros(7));
        assert_eq!(control.endpoints().controller_running.get().unwrap(), 0);
    }

    #[test]
    fn test_run_stops_at_max_ticks_with_zero_torque() {
        let (mut control, sim) = setup(SequencerConfig::relative());
        publish_state(&sim, DVector::zeros(7));

        let stats = control.run(&ShutdownSignal::new()).unwrap();
        assert_eq!(stats.ticks, 5);
        assert_eq!(sim.torque_command.get().unwrap(), DVector::zeros(7));
        assert_eq!(control.endpoints().controller_running.get().unwrap(), 0);
    }

    #[test]
    fn test_run_writes_zero_torque_on_error() {
        let (mut control, sim) = setup(SequencerConfig::relative());
        // 关节状态从未发布
        let result = control.run(&ShutdownSignal::new());
        assert!(result.is_err());
        assert_eq!(sim.torque_command.get().unwrap(), DVector::zeros(7));
    }

    #[test]
    fn test_run_exits_immediately_when_shutdown_requested() {
        let (mut control, sim) = setup(SequencerConfig::relative());
        publish_state(&sim, DVector::zeros(7));
        let shutdown = ShutdownSignal::new();
        shutdown.request();

        let stats = control.run(&shutdown).unwrap();
        assert_eq!(stats.ticks, 0);
        assert_eq!(sim.torque_command.get().unwrap(), DVector::zeros(7));
    }

    #[test]
    fn test_recalibrate_resets_ready_flag() {
        let (mut control, sim) = setup(SequencerConfig::relative());
        publish_state(&sim, home());
        control.initialize().unwrap();
        control.tick().unwrap();
        control.endpoints().operator.signal_ready();
        control.tick().unwrap();
        assert_eq!(control.phase(), Phase::Motion);

        control.endpoints().operator.signal_ready();
        let transition = control.recalibrate().unwrap();
        assert_eq!(transition.to_phase(), Phase::Calibration);
        assert_eq!(
            control.endpoints().operator.calibration_ready.get().unwrap(),
            0
        );

        let transition = control.restart();
        assert_eq!(transition, Transition::Restarted { from: Phase::Calibration });
        assert_eq!(control.phase(), Phase::Posture);
    }
}
