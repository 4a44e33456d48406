//! 物理步进
//!
//! [`PhysicsStepper`] 是仿真循环消费的物理接口：设定力矩、前进一个固定步长、
//! 读出关节状态。碰撞、接触、重力等由具体实现负责。
//!
//! [`JointSpaceSim`] 是自带的参考实现：每个关节是独立的刚体
//! （惯量 + 粘性阻尼，重力已补偿），半隐式欧拉积分，可选关节限位
//! （越界时夹紧位置并清零速度）。

use crate::error::SimLoopError;
use nalgebra::DVector;
use serde::{Deserialize, Serialize};

/// 物理步进接口
pub trait PhysicsStepper {
    /// 关节数
    fn dof(&self) -> usize;

    /// 当前步长（秒）
    fn timestep(&self) -> f64;

    /// 设置步长（秒）
    fn set_timestep(&mut self, dt: f64);

    /// 设置下一步使用的关节力矩（长度 = dof）
    fn set_joint_torques(&mut self, torques: &DVector<f64>);

    /// 前进一个步长
    fn integrate(&mut self);

    fn joint_positions(&self) -> &DVector<f64>;

    fn joint_velocities(&self) -> &DVector<f64>;
}

/// 关节限位
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct JointLimit {
    pub lower: f64,
    pub upper: f64,
}

impl JointLimit {
    pub fn new(lower: f64, upper: f64) -> Self {
        Self { lower, upper }
    }
}

/// 关节空间仿真配置
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct JointSimConfig {
    /// 各关节惯量（kg 或 kg·m²）
    pub inertia: Vec<f64>,
    /// 各关节粘性阻尼
    pub damping: Vec<f64>,
    /// 关节限位（`None` 表示不限位）
    pub joint_limits: Option<Vec<JointLimit>>,
    /// 初始关节位置（长度决定关节数）
    pub initial_positions: Vec<f64>,
}

impl JointSimConfig {
    /// `dof` 个单位惯量、无阻尼、无限位的关节，从零位开始
    pub fn with_dof(dof: usize) -> Self {
        Self {
            inertia: vec![1.0; dof],
            damping: vec![0.0; dof],
            joint_limits: None,
            initial_positions: vec![0.0; dof],
        }
    }

    pub fn dof(&self) -> usize {
        self.initial_positions.len()
    }

    /// 校验各数组长度和取值
    pub fn validate(&self) -> Result<(), SimLoopError> {
        let dof = self.dof();
        let invalid = |msg: String| Err(SimLoopError::InvalidConfig(msg));

        if dof == 0 {
            return invalid("initial_positions must not be empty".to_string());
        }
        if self.inertia.len() != dof || self.damping.len() != dof {
            return invalid(format!(
                "inertia ({}) and damping ({}) must have {} entries",
                self.inertia.len(),
                self.damping.len(),
                dof
            ));
        }
        if self.inertia.iter().any(|m| !(m.is_finite() && *m > 0.0)) {
            return invalid("inertia must be finite and positive".to_string());
        }
        if self.damping.iter().any(|b| !(b.is_finite() && *b >= 0.0)) {
            return invalid("damping must be finite and non-negative".to_string());
        }
        if let Some(limits) = &self.joint_limits {
            if limits.len() != dof {
                return invalid(format!(
                    "joint_limits has {} entries, expected {}",
                    limits.len(),
                    dof
                ));
            }
            if limits.iter().any(|l| !(l.lower < l.upper)) {
                return invalid("joint limit lower bound must be below upper bound".to_string());
            }
        }
        Ok(())
    }
}

impl Default for JointSimConfig {
    fn default() -> Self {
        Self::with_dof(7)
    }
}

/// 关节空间参考仿真
#[derive(Debug, Clone)]
pub struct JointSpaceSim {
    inertia: DVector<f64>,
    damping: DVector<f64>,
    limits: Option<Vec<JointLimit>>,
    dt: f64,
    q: DVector<f64>,
    dq: DVector<f64>,
    torques: DVector<f64>,
    steps: u64,
}

impl JointSpaceSim {
    /// 默认步长（2kHz）
    pub const DEFAULT_TIMESTEP: f64 = 1.0 / 2000.0;

    /// 创建仿真
    ///
    /// # 错误
    ///
    /// 配置非法时返回 `SimLoopError::InvalidConfig`。
    pub fn new(config: &JointSimConfig) -> Result<Self, SimLoopError> {
        config.validate()?;
        let dof = config.dof();
        Ok(Self {
            inertia: DVector::from_column_slice(&config.inertia),
            damping: DVector::from_column_slice(&config.damping),
            limits: config.joint_limits.clone(),
            dt: Self::DEFAULT_TIMESTEP,
            q: DVector::from_column_slice(&config.initial_positions),
            dq: DVector::zeros(dof),
            torques: DVector::zeros(dof),
            steps: 0,
        })
    }

    /// 重置到给定关节位置（速度、力矩清零）
    pub fn reset(&mut self, q: DVector<f64>) {
        let dof = q.len();
        self.q = q;
        self.dq = DVector::zeros(dof);
        self.torques = DVector::zeros(dof);
        self.steps = 0;
    }

    /// 已积分的仿真时间（秒）
    pub fn sim_time(&self) -> f64 {
        self.steps as f64 * self.dt
    }

    fn enforce_limits(&mut self) {
        let Some(limits) = &self.limits else {
            return;
        };
        for (i, limit) in limits.iter().enumerate() {
            if self.q[i] < limit.lower {
                self.q[i] = limit.lower;
                self.dq[i] = 0.0;
            } else if self.q[i] > limit.upper {
                self.q[i] = limit.upper;
                self.dq[i] = 0.0;
            }
        }
    }
}

impl PhysicsStepper for JointSpaceSim {
    fn dof(&self) -> usize {
        self.q.len()
    }

    fn timestep(&self) -> f64 {
        self.dt
    }

    fn set_timestep(&mut self, dt: f64) {
        self.dt = dt;
    }

    fn set_joint_torques(&mut self, torques: &DVector<f64>) {
        self.torques.clone_from(torques);
    }

    fn integrate(&mut self) {
        // 半隐式欧拉：先速度后位置
        let acceleration =
            (&self.torques - self.damping.component_mul(&self.dq)).component_div(&self.inertia);
        self.dq += acceleration * self.dt;
        self.q += &self.dq * self.dt;
        self.enforce_limits();
        self.steps += 1;
    }

    fn joint_positions(&self) -> &DVector<f64> {
        &self.q
    }

    fn joint_velocities(&self) -> &DVector<f64> {
        &self.dq
    }
}
