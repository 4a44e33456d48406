//! 仿真循环驱动
//!
//! 固定频率（默认 2000 Hz）循环，每拍：
//!
//! 1. 读取最新控制力矩
//! 2. 在交互力矩邮箱的锁内叠加交互力矩并交给物理步进
//! 3. 步进一个固定步长
//! 4. 发布关节位置 / 速度
//!
//! 交互力矩由外部组件（渲染 / 交互线程）通过 [`Mailbox`] 投递，
//! 只保留最新值，不排队。

use crate::error::SimLoopError;
use crate::stepper::PhysicsStepper;
use nalgebra::DVector;
use std::sync::Arc;
use teleop_channel::{Mailbox, SimEndpoints};
use teleop_tools::{LoopConfig, LoopTimer, LoopTimingStats, ShutdownSignal, realtime};
use tracing::{error, info, warn};

/// 仿真循环
pub struct SimulationLoop<S> {
    endpoints: SimEndpoints,
    stepper: S,
    interactive_torque: Arc<Mailbox<DVector<f64>>>,
    config: LoopConfig,
}

impl<S: PhysicsStepper> SimulationLoop<S> {
    /// 创建仿真循环，物理步长设为循环周期
    ///
    /// # 错误
    ///
    /// 循环频率非法时返回 `SimLoopError::LoopConfig`。
    pub fn new(
        endpoints: SimEndpoints,
        mut stepper: S,
        config: LoopConfig,
    ) -> Result<Self, SimLoopError> {
        config.validate()?;
        stepper.set_timestep(config.period().as_secs_f64());
        Ok(Self {
            endpoints,
            stepper,
            interactive_torque: Arc::new(Mailbox::new()),
            config,
        })
    }

    /// 使用外部共享的交互力矩邮箱
    pub fn with_interactive_torque(mut self, mailbox: Arc<Mailbox<DVector<f64>>>) -> Self {
        self.interactive_torque = mailbox;
        self
    }

    /// 交互力矩邮箱（交给交互组件投递）
    pub fn interactive_torque(&self) -> Arc<Mailbox<DVector<f64>>> {
        Arc::clone(&self.interactive_torque)
    }

    pub fn stepper(&self) -> &S {
        &self.stepper
    }

    pub fn stepper_mut(&mut self) -> &mut S {
        &mut self.stepper
    }

    pub fn endpoints(&self) -> &SimEndpoints {
        &self.endpoints
    }

    /// 发布初始关节状态和零力矩
    pub fn initialize(&mut self) {
        self.publish_state();
        self.endpoints
            .torque_command
            .set(DVector::zeros(self.stepper.dof()));
        info!(
            "Simulation loop initialized ({} joints, {:.0} Hz, dt = {:.6} s)",
            self.stepper.dof(),
            self.config.frequency_hz,
            self.stepper.timestep()
        );
    }

    fn publish_state(&self) {
        self.endpoints
            .joint_positions
            .set(self.stepper.joint_positions().clone());
        self.endpoints
            .joint_velocities
            .set(self.stepper.joint_velocities().clone());
    }

    /// 执行一拍
    pub fn tick(&mut self) -> Result<(), SimLoopError> {
        let dof = self.stepper.dof();
        let commanded = self.endpoints.torque_command.get_with_dim(dof)?;

        let stepper = &mut self.stepper;
        self.interactive_torque.with_latest(|interactive| {
            let total = match interactive {
                Some(ui) if ui.len() != dof => {
                    return Err(SimLoopError::InteractiveTorqueDimension {
                        expected: dof,
                        actual: ui.len(),
                    });
                },
                Some(ui) => commanded + ui,
                None => commanded,
            };
            stepper.set_joint_torques(&total);
            Ok(())
        })?;

        self.stepper.integrate();
        self.publish_state();
        Ok(())
    }

    /// 运行到退出信号（或 `max_ticks`）
    pub fn run(&mut self, shutdown: &ShutdownSignal) -> Result<LoopTimingStats, SimLoopError> {
        realtime::promote_current_thread("simulation");
        self.initialize();
        let mut timer = LoopTimer::new(&self.config)?;

        let result = loop {
            if !shutdown.is_running() {
                break Ok(());
            }
            if self.config.max_ticks.is_some_and(|max| timer.ticks() >= max) {
                break Ok(());
            }

            timer.wait_for_next_loop();
            if let Err(e) = self.tick() {
                error!("Simulation loop tick {} failed: {}", timer.ticks(), e);
                break Err(e);
            }
        };

        timer.stop();
        let stats = timer.stats();
        info!("Simulation loop timer stats:\n{}", stats);
        if stats.overruns > 0 {
            warn!(
                "Simulation loop overran {} of {} ticks ({:.2}%)",
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
    use crate::stepper::{JointSimConfig, JointSpaceSim};
    use approx::assert_relative_eq;
    use teleop_channel::{ChannelError, ChannelKeys, SharedChannel};

    fn setup(dof: usize, max_ticks: Option<u64>) -> (SimulationLoop<JointSpaceSim>, SimEndpoints) {
        let channel = SharedChannel::new();
        let keys = ChannelKeys::simulation();
        let sim = JointSpaceSim::new(&JointSimConfig::with_dof(dof)).unwrap();
        let config = LoopConfig {
            max_ticks,
            ..LoopConfig::simulation()
        };
        let sim_loop =
            SimulationLoop::new(SimEndpoints::register(&channel, &keys).unwrap(), sim, config)
                .unwrap();
        // 同一通道上的另一组端点，扮演控制侧
        let control_side = SimEndpoints::register(&channel, &keys).unwrap();
        (sim_loop, control_side)
    }

    #[test]
    fn test_timestep_follows_loop_period() {
        let (sim_loop, _) = setup(3, None);
        assert_relative_eq!(sim_loop.stepper().timestep(), 0.0005, epsilon = 1e-15);
    }

    #[test]
    fn test_initialize_publishes_state_and_zero_torque() {
        let (mut sim_loop, control) = setup(3, None);
        sim_loop.initialize();
        assert_eq!(control.joint_positions.get().unwrap(), DVector::zeros(3));
        assert_eq!(control.joint_velocities.get().unwrap(), DVector::zeros(3));
        assert_eq!(control.torque_command.get().unwrap(), DVector::zeros(3));
    }

    #[test]
    fn test_tick_integrates_commanded_torque() {
        let (mut sim_loop, control) = setup(2, None);
        sim_loop.initialize();
        control.torque_command.set(DVector::from_vec(vec![1.0, -2.0]));
        sim_loop.tick().unwrap();

        let dq = control.joint_velocities.get().unwrap();
        assert_relative_eq!(dq[0], 0.0005, epsilon = 1e-15);
        assert_relative_eq!(dq[1], -0.001, epsilon = 1e-15);
    }

    #[test]
    fn test_interactive_torque_is_additive() {
        let (mut sim_loop, control) = setup(2, None);
        sim_loop.initialize();
        let mailbox = sim_loop.interactive_torque();

        control.torque_command.set(DVector::from_vec(vec![1.0, 1.0]));
        mailbox.post(DVector::from_vec(vec![1.0, -1.0]));
        sim_loop.tick().unwrap();

        let dq = control.joint_velocities.get().unwrap();
        assert_relative_eq!(dq[0], 2.0 * 0.0005, epsilon = 1e-15);
        assert_relative_eq!(dq[1], 0.0, epsilon = 1e-15);
        // 邮箱保留最新值，下一拍继续生效
        assert!(!mailbox.is_empty());
    }

    #[test]
    fn test_shared_mailbox() {
        let (sim_loop, _) = setup(2, None);
        let mailbox = Arc::new(Mailbox::new());
        let sim_loop = sim_loop.with_interactive_torque(Arc::clone(&mailbox));
        mailbox.post(DVector::zeros(2));
        assert!(!sim_loop.interactive_torque().is_empty());
    }

    #[test]
    fn test_interactive_torque_dimension_checked() {
        let (mut sim_loop, _control) = setup(2, None);
        sim_loop.initialize();
        sim_loop.interactive_torque().post(DVector::zeros(3));
        assert_eq!(
            sim_loop.tick(),
            Err(SimLoopError::InteractiveTorqueDimension {
                expected: 2,
                actual: 3,
            })
        );
    }

    #[test]
    fn test_commanded_torque_dimension_checked() {
        let (mut sim_loop, control) = setup(2, None);
        sim_loop.initialize();
        control.torque_command.set(DVector::zeros(7));
        assert!(matches!(
            sim_loop.tick(),
            Err(SimLoopError::Channel(ChannelError::DimensionMismatch { .. }))
        ));
    }

    #[test]
    fn test_run_until_max_ticks() {
        let (mut sim_loop, control) = setup(2, Some(20));
        let stats = sim_loop.run(&ShutdownSignal::new()).unwrap();
        assert_eq!(stats.ticks, 20);
        assert_relative_eq!(sim_loop.stepper().sim_time(), 0.01, epsilon = 1e-12);
        assert!(control.joint_positions.is_set());
    }
}
