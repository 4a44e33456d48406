//! 控制时序状态机
//!
//! ```text
//!            ‖q - q_home‖ < tol            ready == 1
//! POSTURE ─────────────────────▶ CALIBRATION ────────────▶ MOTION
//!    │                                                      ▲
//!    └───────────── 绝对模式：‖q - q_home‖ < tol ──────────────┘
//! ```
//!
//! - **POSTURE**: 只运行关节任务，把机械臂拉到固定的 home 关节构型。
//!   误差进入 `tolerance_scale × tol` 后可选地打开积分项（消除静差），离开时关闭。
//! - **CALIBRATION**: 关节任务保持当前构型，等待操作员置位就绪标志；
//!   就绪时捕获标定锚点（机器人末端位姿 + 操作员位姿）。
//! - **MOTION**: 位姿任务为主任务跟踪重定向后的目标，关节任务在其零空间中
//!   作为次任务维持姿态。
//!
//! 每个阶段只持有自己需要的数据（[`Session`]），MOTION 之外不存在锚点。
//!
//! [`ControlSequencer::step`] 是纯计算：不访问共享通道。阶段切换的副作用
//! （发布 home 位姿、复位就绪标志）通过返回的 [`Transition`] 交给控制循环执行。

use crate::error::ControlError;
use crate::model::RobotModel;
use crate::priority::compose;
use crate::retarget::{CalibrationAnchor, FrameRetargeter, RetargetConfig, RetargetMode, absolute_goal};
use crate::task::{CartesianTask, JointSpaceTask, Task};
use crate::tasks::{JointTask, PoseTask, PoseTaskConfig};
use crate::types::{Gains, OperatorFrame, Pose, RobotFrame};
use nalgebra::{DMatrix, DVector};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;
use tracing::{debug, info};

/// 默认 home 关节构型（7 关节，rad）
pub const DEFAULT_HOME_JOINT_POSITIONS: [f64; 7] = [
    -0.0975007, 0.0812935, -0.275996, -2.13114, 0.0854098, 2.19845, 0.453058,
];

/// POSTURE 阶段的积分增强
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct IntegralBoost {
    /// 增强后的积分增益
    pub ki: f64,
    /// 粗容差 = `tolerance_scale × posture_tolerance`
    pub tolerance_scale: f64,
}

/// 状态机配置
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SequencerConfig {
    /// 遥操作模式
    pub mode: RetargetMode,
    /// home 关节构型（长度必须等于机器人 dof）
    pub home_joint_positions: Vec<f64>,
    /// POSTURE 阶段关节任务增益（离开时恢复为此值）
    pub posture_gains: Gains,
    /// POSTURE 完成判据（关节误差范数，rad）
    pub posture_tolerance: f64,
    /// 接近 home 时的积分增强（`None` 表示不增强）
    pub integral_boost: Option<IntegralBoost>,
    /// 重定向参数
    pub retarget: RetargetConfig,
}

impl SequencerConfig {
    /// 相对（标定）模式：POSTURE → CALIBRATION → MOTION
    pub fn relative() -> Self {
        Self {
            mode: RetargetMode::Relative,
            home_joint_positions: DEFAULT_HOME_JOINT_POSITIONS.to_vec(),
            posture_gains: Gains::new(200.0, 20.0, 0.0),
            posture_tolerance: 5e-2,
            integral_boost: Some(IntegralBoost {
                ki: 50.0,
                tolerance_scale: 10.0,
            }),
            retarget: RetargetConfig::default(),
        }
    }

    /// 绝对模式：POSTURE → MOTION，跟踪操作员位姿（含姿态）
    pub fn absolute() -> Self {
        Self {
            mode: RetargetMode::Absolute,
            posture_tolerance: 1e-2,
            integral_boost: None,
            retarget: RetargetConfig {
                track_orientation: true,
                ..RetargetConfig::default()
            },
            ..Self::relative()
        }
    }

    /// 按模式选择预设
    pub fn for_mode(mode: RetargetMode) -> Self {
        match mode {
            RetargetMode::Relative => Self::relative(),
            RetargetMode::Absolute => Self::absolute(),
        }
    }

    /// 检查配置与机器人自由度是否一致
    ///
    /// # 错误
    ///
    /// - home 构型长度不等于 `dof`
    /// - 容差非正
    pub fn validate(&self, dof: usize) -> Result<(), ControlError> {
        if self.home_joint_positions.len() != dof {
            return Err(ControlError::InvalidConfig(format!(
                "home_joint_positions has {} entries, robot has {} joints",
                self.home_joint_positions.len(),
                dof
            )));
        }
        if !(self.posture_tolerance.is_finite() && self.posture_tolerance > 0.0) {
            return Err(ControlError::InvalidConfig(format!(
                "posture_tolerance must be positive, got {}",
                self.posture_tolerance
            )));
        }
        Ok(())
    }

    pub fn home(&self) -> DVector<f64> {
        DVector::from_column_slice(&self.home_joint_positions)
    }
}

impl Default for SequencerConfig {
    fn default() -> Self {
        Self::relative()
    }
}

/// 阶段（不带数据，用于日志和查询）
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Phase {
    Posture,
    Calibration,
    Motion,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Phase::Posture => "POSTURE",
            Phase::Calibration => "CALIBRATION",
            Phase::Motion => "MOTION",
        };
        f.write_str(name)
    }
}

/// 当前阶段及其数据
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Session {
    Posture,
    /// `home`: 离开 POSTURE 时捕获的末端位姿
    Calibration { home: Pose<RobotFrame> },
    /// `anchor`: 相对模式的标定锚点；绝对模式为 `None`
    Motion { anchor: Option<CalibrationAnchor> },
}

impl Session {
    pub fn phase(&self) -> Phase {
        match self {
            Session::Posture => Phase::Posture,
            Session::Calibration { .. } => Phase::Calibration,
            Session::Motion { .. } => Phase::Motion,
        }
    }
}

/// 阶段切换（控制循环据此执行副作用）
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Transition {
    /// 相对模式到达 home
    PostureToCalibration { home: Pose<RobotFrame> },
    /// 绝对模式到达 home
    PostureToMotion { home: Pose<RobotFrame> },
    /// 操作员就绪，锚点已捕获
    CalibrationToMotion { anchor: CalibrationAnchor },
    /// 显式重新标定
    MotionToCalibration { home: Pose<RobotFrame> },
    /// 显式回到 POSTURE
    Restarted { from: Phase },
}

impl Transition {
    pub fn from_phase(&self) -> Phase {
        match self {
            Transition::PostureToCalibration { .. } | Transition::PostureToMotion { .. } => {
                Phase::Posture
            },
            Transition::CalibrationToMotion { .. } => Phase::Calibration,
            Transition::MotionToCalibration { .. } => Phase::Motion,
            Transition::Restarted { from } => *from,
        }
    }

    pub fn to_phase(&self) -> Phase {
        match self {
            Transition::PostureToCalibration { .. } | Transition::MotionToCalibration { .. } => {
                Phase::Calibration
            },
            Transition::PostureToMotion { .. } | Transition::CalibrationToMotion { .. } => {
                Phase::Motion
            },
            Transition::Restarted { .. } => Phase::Posture,
        }
    }

    /// 切换后机器人的 home 位姿（若本次切换重新捕获了 home）
    pub fn home(&self) -> Option<&Pose<RobotFrame>> {
        match self {
            Transition::PostureToCalibration { home }
            | Transition::PostureToMotion { home }
            | Transition::MotionToCalibration { home } => Some(home),
            _ => None,
        }
    }
}

/// 单拍输入
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SequencerInput {
    /// 最新操作员位姿
    pub operator_pose: Pose<OperatorFrame>,
    /// 标定就绪标志（只在 CALIBRATION 阶段有意义）
    pub calibration_ready: bool,
}

/// 单拍输出
#[derive(Debug, Clone, PartialEq)]
pub struct TickOutcome {
    /// 本拍关节力矩
    pub torques: DVector<f64>,
    /// 本拍发生的阶段切换
    pub transition: Option<Transition>,
    /// MOTION 阶段的末端目标位姿
    pub goal: Option<Pose<RobotFrame>>,
}

/// 控制时序状态机
///
/// 泛型参数为注入的任务实现，参考实现见 [`ControlSequencer::with_reference_tasks`]。
#[derive(Debug, Clone)]
pub struct ControlSequencer<J, P> {
    config: SequencerConfig,
    retargeter: FrameRetargeter,
    joint_task: J,
    pose_task: P,
    session: Session,
}

impl ControlSequencer<JointTask, PoseTask> {
    /// 使用自带的 [`JointTask`] / [`PoseTask`] 创建状态机
    pub fn with_reference_tasks(
        config: SequencerConfig,
        pose_config: PoseTaskConfig,
        dof: usize,
        control_period: Duration,
    ) -> Self {
        let joint_task = JointTask::new(dof, control_period);
        let pose_task = PoseTask::new(dof, control_period, pose_config);
        Self::new(config, joint_task, pose_task)
    }
}

impl<J: JointSpaceTask, P: CartesianTask> ControlSequencer<J, P> {
    /// 创建状态机，初始阶段为 POSTURE
    pub fn new(config: SequencerConfig, mut joint_task: J, pose_task: P) -> Self {
        joint_task.set_goal_position(config.home());
        joint_task.set_gains(config.posture_gains);
        Self {
            retargeter: FrameRetargeter::from_config(&config.retarget),
            config,
            joint_task,
            pose_task,
            session: Session::Posture,
        }
    }

    pub fn config(&self) -> &SequencerConfig {
        &self.config
    }

    pub fn retargeter(&self) -> &FrameRetargeter {
        &self.retargeter
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    pub fn phase(&self) -> Phase {
        self.session.phase()
    }

    /// MOTION 阶段（相对模式）的标定锚点
    pub fn anchor(&self) -> Option<&CalibrationAnchor> {
        match &self.session {
            Session::Motion { anchor } => anchor.as_ref(),
            _ => None,
        }
    }

    pub fn joint_task(&self) -> &J {
        &self.joint_task
    }

    pub fn pose_task(&self) -> &P {
        &self.pose_task
    }

    /// 推进一拍
    ///
    /// `model` 必须已用本拍关节状态更新。
    pub fn step(&mut self, model: &dyn RobotModel, input: &SequencerInput) -> TickOutcome {
        match self.session {
            Session::Posture => self.step_posture(model),
            Session::Calibration { home } => self.step_calibration(model, home, input),
            Session::Motion { anchor } => self.step_motion(model, anchor, input),
        }
    }

    fn step_posture(&mut self, model: &dyn RobotModel) -> TickOutcome {
        let dof = model.dof();
        self.joint_task
            .update_task_model(model, &DMatrix::identity(dof, dof));

        if let Some(boost) = self.config.integral_boost {
            let boosted = self.config.posture_gains.with_ki(boost.ki);
            let coarse = boost.tolerance_scale * self.config.posture_tolerance;
            if self.joint_task.gains() != boosted && self.joint_task.goal_position_reached(coarse) {
                debug!("Posture within {:.3} rad, enabling integral term ({})", coarse, boosted);
                self.joint_task.set_gains(boosted);
            }
        }

        let torques = self.joint_task.compute_torques();

        let transition = self
            .joint_task
            .goal_position_reached(self.config.posture_tolerance)
            .then(|| self.leave_posture(model));

        TickOutcome {
            torques,
            transition,
            goal: None,
        }
    }

    fn leave_posture(&mut self, model: &dyn RobotModel) -> Transition {
        self.pose_task.reinitialize(model);
        self.joint_task.reinitialize(model);
        self.joint_task.set_gains(self.config.posture_gains);

        let home = model.end_effector_pose();
        let transition = match self.config.mode {
            RetargetMode::Relative => {
                self.session = Session::Calibration { home };
                Transition::PostureToCalibration { home }
            },
            RetargetMode::Absolute => {
                self.session = Session::Motion { anchor: None };
                Transition::PostureToMotion { home }
            },
        };
        info!(
            "Posture reached, {} -> {} (home position: [{:.4}, {:.4}, {:.4}])",
            transition.from_phase(),
            transition.to_phase(),
            home.position.x,
            home.position.y,
            home.position.z
        );
        transition
    }

    fn step_calibration(
        &mut self,
        model: &dyn RobotModel,
        home: Pose<RobotFrame>,
        input: &SequencerInput,
    ) -> TickOutcome {
        let torques = compose(model, &mut self.joint_task, None);

        let transition = input.calibration_ready.then(|| {
            let anchor = CalibrationAnchor {
                robot: home,
                operator: input.operator_pose,
            };
            self.session = Session::Motion {
                anchor: Some(anchor),
            };
            info!(
                "Operator ready, CALIBRATION -> MOTION (operator anchor: [{:.4}, {:.4}, {:.4}])",
                anchor.operator.position.x, anchor.operator.position.y, anchor.operator.position.z
            );
            Transition::CalibrationToMotion { anchor }
        });

        TickOutcome {
            torques,
            transition,
            goal: None,
        }
    }

    fn step_motion(
        &mut self,
        model: &dyn RobotModel,
        anchor: Option<CalibrationAnchor>,
        input: &SequencerInput,
    ) -> TickOutcome {
        let target = match anchor {
            Some(anchor) => self.retargeter.retarget(&anchor, &input.operator_pose),
            None => absolute_goal(&input.operator_pose),
        };
        self.pose_task.set_goal_position(target.position);
        if self.config.retarget.track_orientation {
            self.pose_task.set_goal_orientation(target.orientation);
        }

        let torques = compose(model, &mut self.pose_task, Some(&mut self.joint_task));

        TickOutcome {
            torques,
            transition: None,
            goal: Some(self.pose_task.goal_pose()),
        }
    }

    /// MOTION → CALIBRATION：以当前末端位姿重新捕获 home，等待新的就绪信号
    ///
    /// # 错误
    ///
    /// 不在相对模式的 MOTION 阶段时返回 `ControlError::InvalidTransition`。
    pub fn recalibrate(&mut self, model: &dyn RobotModel) -> Result<Transition, ControlError> {
        if !matches!(self.session, Session::Motion { anchor: Some(_) }) {
            return Err(ControlError::InvalidTransition {
                from: self.phase(),
                to: Phase::Calibration,
            });
        }

        self.pose_task.reinitialize(model);
        self.joint_task.reinitialize(model);
        let home = model.end_effector_pose();
        self.session = Session::Calibration { home };
        info!("Recalibration requested, MOTION -> CALIBRATION");
        Ok(Transition::MotionToCalibration { home })
    }

    /// 任意阶段 → POSTURE：重新驱动到 home 关节构型
    pub fn restart(&mut self, model: &dyn RobotModel) -> Transition {
        let from = self.phase();
        self.pose_task.reinitialize(model);
        self.joint_task.reinitialize(model);
        self.joint_task.set_goal_position(self.config.home());
        self.joint_task.set_gains(self.config.posture_gains);
        self.session = Session::Posture;
        info!("Restart requested, {} -> POSTURE", from);
        Transition::Restarted { from }
    }
}
