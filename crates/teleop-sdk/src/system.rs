//! 进程内遥操作系统装配
//!
//! 把共享通道、仿真循环、控制循环装配在一起：
//!
//! ```text
//!   operator ──desired pose / ready──┐
//!                                    ▼
//!  SimulationLoop (2kHz) ◀──τ── SharedChannel ◀──τ── ControlLoop (1kHz)
//!          └──────────q, dq──────────▶ └──────────q, dq──────────▶
//! ```
//!
//! [`TeleopSystem::build`] 只做装配，不启动线程（锁步测试直接调用两个循环的 `tick()`）；
//! [`TeleopSystem::spawn`] 在两个独立线程中运行两个循环。
//! 任何一个循环退出（包括出错）都会触发退出信号，让另一个循环随之停止。

use nalgebra::DVector;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use teleop_channel::{
    ChannelError, ChannelKeys, ControlEndpoints, KeyProfile, Mailbox, OperatorEndpoints,
    SharedChannel, SimEndpoints,
};
use teleop_control::{
    ControlError, ControlLoop, ControlSequencer, GantryModel, JointTask, PoseTask,
    PoseTaskConfig, RetargetMode, SequencerConfig,
};
use teleop_sim::{JointSimConfig, JointSpaceSim, SimLoopError, SimulationLoop};
use teleop_tools::{LoopConfig, LoopTimingStats, ShutdownSignal};
use thiserror::Error;
use tracing::{error, info};

/// 参考控制循环类型
pub type ReferenceControlLoop = ControlLoop<GantryModel, JointTask, PoseTask>;

/// 参考仿真循环类型
pub type ReferenceSimulationLoop = SimulationLoop<JointSpaceSim>;

/// 系统装配 / 运行错误
#[derive(Error, Debug)]
pub enum SystemError {
    #[error("Channel error: {0}")]
    Channel(#[from] ChannelError),

    #[error("Control error: {0}")]
    Control(#[from] ControlError),

    #[error("Simulation error: {0}")]
    Simulation(#[from] SimLoopError),

    /// 线程创建失败
    #[error("Failed to spawn {name} thread: {source}")]
    Spawn {
        name: &'static str,
        #[source]
        source: std::io::Error,
    },

    /// 循环线程 panic
    #[error("{0} thread panicked")]
    ThreadPanicked(&'static str),
}

/// 系统配置
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SystemConfig {
    /// 控制循环（默认 1000 Hz）
    pub control: LoopConfig,
    /// 仿真循环（默认 2000 Hz）
    pub simulation_loop: LoopConfig,
    /// 控制时序状态机
    pub sequencer: SequencerConfig,
    /// 末端位姿任务
    pub pose_task: PoseTaskConfig,
    /// 关节空间仿真
    pub simulation: JointSimConfig,
    /// 通道键集合
    pub keys: KeyProfile,
}

impl SystemConfig {
    /// 按遥操作模式选择状态机和位姿任务预设
    pub fn for_mode(mode: RetargetMode) -> Self {
        let pose_task = match mode {
            RetargetMode::Relative => PoseTaskConfig::relative(),
            RetargetMode::Absolute => PoseTaskConfig::absolute(),
        };
        Self {
            sequencer: SequencerConfig::for_mode(mode),
            pose_task,
            ..Self::default()
        }
    }

    /// 关节数（由仿真初始构型决定）
    pub fn dof(&self) -> usize {
        self.simulation.dof()
    }

    /// 启动前校验全部配置
    pub fn validate(&self) -> Result<(), SystemError> {
        self.control.validate().map_err(ControlError::from)?;
        self.simulation_loop.validate().map_err(SimLoopError::from)?;
        self.simulation.validate()?;
        self.sequencer.validate(self.dof())?;
        Ok(())
    }

    pub fn channel_keys(&self) -> ChannelKeys {
        ChannelKeys::from_profile(&self.keys)
    }
}

impl Default for SystemConfig {
    fn default() -> Self {
        Self {
            control: LoopConfig::control(),
            simulation_loop: LoopConfig::simulation(),
            sequencer: SequencerConfig::relative(),
            pose_task: PoseTaskConfig::relative(),
            simulation: JointSimConfig::default(),
            keys: KeyProfile::default(),
        }
    }
}

/// 装配好的系统（未启动）
pub struct TeleopSystem {
    channel: SharedChannel,
    keys: ChannelKeys,
    control: ReferenceControlLoop,
    simulation: ReferenceSimulationLoop,
    operator: OperatorEndpoints,
}

impl TeleopSystem {
    /// 装配系统
    ///
    /// 仿真循环在装配时就发布初始关节状态，控制循环随后可以直接初始化。
    ///
    /// # 错误
    ///
    /// 配置非法（频率、惯量、home 构型长度等）时返回错误，不会启动任何循环。
    pub fn build(config: &SystemConfig) -> Result<Self, SystemError> {
        config.validate()?;

        let dof = config.dof();
        let channel = SharedChannel::new();
        let keys = config.channel_keys();

        let stepper = JointSpaceSim::new(&config.simulation)?;
        let mut simulation = SimulationLoop::new(
            SimEndpoints::register(&channel, &keys)?,
            stepper,
            config.simulation_loop.clone(),
        )?;
        simulation.initialize();

        let model = GantryModel::new(dof)?
            .with_joint_inertia(DVector::from_column_slice(&config.simulation.inertia))?;
        let sequencer = ControlSequencer::with_reference_tasks(
            config.sequencer.clone(),
            config.pose_task.clone(),
            dof,
            config.control.period(),
        );
        let control = ControlLoop::new(
            ControlEndpoints::register(&channel, &keys)?,
            model,
            sequencer,
            config.control.clone(),
        )?;

        let operator = OperatorEndpoints::register(&channel, &keys)?;

        info!(
            "Teleoperation system assembled: {} joints, {:?} mode",
            dof, config.sequencer.mode
        );
        Ok(Self {
            channel,
            keys,
            control,
            simulation,
            operator,
        })
    }

    pub fn channel(&self) -> &SharedChannel {
        &self.channel
    }

    pub fn keys(&self) -> &ChannelKeys {
        &self.keys
    }

    pub fn operator(&self) -> &OperatorEndpoints {
        &self.operator
    }

    pub fn control(&self) -> &ReferenceControlLoop {
        &self.control
    }

    pub fn control_mut(&mut self) -> &mut ReferenceControlLoop {
        &mut self.control
    }

    pub fn simulation(&self) -> &ReferenceSimulationLoop {
        &self.simulation
    }

    pub fn simulation_mut(&mut self) -> &mut ReferenceSimulationLoop {
        &mut self.simulation
    }

    /// 交互力矩邮箱
    pub fn interactive_torque(&self) -> Arc<Mailbox<DVector<f64>>> {
        self.simulation.interactive_torque()
    }

    /// 在独立线程中启动仿真循环和控制循环
    pub fn spawn(self, shutdown: ShutdownSignal) -> Result<RunningSystem, SystemError> {
        let Self {
            channel,
            keys,
            mut control,
            mut simulation,
            operator,
        } = self;
        let interactive_torque = simulation.interactive_torque();

        let sim_shutdown = shutdown.clone();
        let simulation = thread::Builder::new()
            .name("teleop-simulation".into())
            .spawn(move || {
                let result = simulation.run(&sim_shutdown);
                sim_shutdown.request();
                result
            })
            .map_err(|source| SystemError::Spawn {
                name: "simulation",
                source,
            })?;

        let control_shutdown = shutdown.clone();
        let control = thread::Builder::new()
            .name("teleop-control".into())
            .spawn(move || {
                let result = control.run(&control_shutdown);
                control_shutdown.request();
                result
            });
        let control = match control {
            Ok(handle) => handle,
            Err(source) => {
                shutdown.request();
                return Err(SystemError::Spawn {
                    name: "control",
                    source,
                });
            },
        };

        Ok(RunningSystem {
            channel,
            keys,
            operator,
            interactive_torque,
            shutdown,
            control,
            simulation,
        })
    }
}

/// 两个循环的耗时统计
#[derive(Debug, Clone)]
pub struct SystemReport {
    pub control: LoopTimingStats,
    pub simulation: LoopTimingStats,
}

/// 运行中的系统
pub struct RunningSystem {
    channel: SharedChannel,
    keys: ChannelKeys,
    operator: OperatorEndpoints,
    interactive_torque: Arc<Mailbox<DVector<f64>>>,
    shutdown: ShutdownSignal,
    control: JoinHandle<Result<LoopTimingStats, ControlError>>,
    simulation: JoinHandle<Result<LoopTimingStats, SimLoopError>>,
}

impl RunningSystem {
    pub fn channel(&self) -> &SharedChannel {
        &self.channel
    }

    pub fn keys(&self) -> &ChannelKeys {
        &self.keys
    }

    pub fn operator(&self) -> &OperatorEndpoints {
        &self.operator
    }

    pub fn interactive_torque(&self) -> Arc<Mailbox<DVector<f64>>> {
        Arc::clone(&self.interactive_torque)
    }

    pub fn shutdown_signal(&self) -> &ShutdownSignal {
        &self.shutdown
    }

    /// 任一循环已经退出
    pub fn is_finished(&self) -> bool {
        self.control.is_finished() || self.simulation.is_finished()
    }

    /// 请求退出并等待两个循环结束
    pub fn stop(self) -> Result<SystemReport, SystemError> {
        self.shutdown.request();
        self.join()
    }

    /// 等待两个循环结束（不主动请求退出）
    ///
    /// 两个循环都出错时优先返回控制循环的错误。
    pub fn join(self) -> Result<SystemReport, SystemError> {
        let control = self
            .control
            .join()
            .map_err(|_| SystemError::ThreadPanicked("control"))?;
        let simulation = self
            .simulation
            .join()
            .map_err(|_| SystemError::ThreadPanicked("simulation"))?;

        let control = control.inspect_err(|e| error!("Control loop failed: {}", e))?;
        let simulation = simulation.inspect_err(|e| error!("Simulation loop failed: {}", e))?;
        Ok(SystemReport {
            control,
            simulation,
        })
    }
}
