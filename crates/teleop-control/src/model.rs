//! 机器人模型接口
//!
//! 控制层只通过 [`RobotModel`] 访问运动学 / 动力学量，具体数值实现
//! （URDF 解析、刚体动力学库等）由外部注入。
//!
//! 本模块自带一个解析模型 [`GantryModel`]：三个正交移动关节给出末端位置，
//! 后续三个转动关节按 Z-Y-X 给出末端姿态，超过 6 个的关节为冗余关节
//! （不影响末端位姿，只在零空间中运动）。质量矩阵为对角阵。
//! 它足够简单，可以手工验证 Jacobian 和零空间，用于仿真和测试。

use crate::error::ControlError;
use crate::types::{Pose, RobotFrame, RobotState};
use nalgebra::{DMatrix, DVector, Matrix3, Rotation3, Vector3};

/// 机器人模型
///
/// 每拍由控制循环调用一次 [`update`](RobotModel::update)，
/// 之后的所有查询都基于这一拍的状态。
pub trait RobotModel {
    /// 关节数
    fn dof(&self) -> usize;

    /// 用本拍关节状态刷新模型
    fn update(&mut self, state: &RobotState);

    /// 当前关节位置
    fn joint_positions(&self) -> &DVector<f64>;

    /// 当前关节速度
    fn joint_velocities(&self) -> &DVector<f64>;

    /// 末端（控制点）在基座坐标系下的位姿
    fn end_effector_pose(&self) -> Pose<RobotFrame>;

    /// 末端几何 Jacobian（6 × dof，前三行线速度，后三行角速度）
    fn jacobian(&self) -> DMatrix<f64>;

    /// 关节空间质量矩阵（dof × dof，对称正定）
    fn mass_matrix(&self) -> DMatrix<f64>;
}

/// 解析龙门架模型
#[derive(Debug, Clone)]
pub struct GantryModel {
    dof: usize,
    base_position: Vector3<f64>,
    joint_inertia: DVector<f64>,
    q: DVector<f64>,
    dq: DVector<f64>,
}

impl GantryModel {
    /// 最少关节数（三个移动关节）
    pub const MIN_DOF: usize = 3;

    /// 创建模型，所有关节惯量为 1
    ///
    /// # 错误
    ///
    /// `dof < 3` 时返回 `ControlError::InvalidConfig`。
    pub fn new(dof: usize) -> Result<Self, ControlError> {
        if dof < Self::MIN_DOF {
            return Err(ControlError::InvalidConfig(format!(
                "gantry model needs at least {} joints, got {}",
                Self::MIN_DOF,
                dof
            )));
        }
        Ok(Self {
            dof,
            base_position: Vector3::zeros(),
            joint_inertia: DVector::from_element(dof, 1.0),
            q: DVector::zeros(dof),
            dq: DVector::zeros(dof),
        })
    }

    /// 设置基座偏移（q = 0 时末端所在位置）
    pub fn with_base_position(mut self, base_position: Vector3<f64>) -> Self {
        self.base_position = base_position;
        self
    }

    /// 设置各关节惯量
    ///
    /// # 错误
    ///
    /// 长度不等于 dof，或存在非正惯量时返回 `ControlError::InvalidConfig`。
    pub fn with_joint_inertia(mut self, joint_inertia: DVector<f64>) -> Result<Self, ControlError> {
        if joint_inertia.len() != self.dof {
            return Err(ControlError::InvalidConfig(format!(
                "joint inertia has {} entries, model has {} joints",
                joint_inertia.len(),
                self.dof
            )));
        }
        if joint_inertia.iter().any(|m| !(m.is_finite() && *m > 0.0)) {
            return Err(ControlError::InvalidConfig(
                "joint inertia must be finite and positive".to_string(),
            ));
        }
        self.joint_inertia = joint_inertia;
        Ok(self)
    }

    /// 第 `i` 个转动关节角（不存在时为 0）
    fn wrist_angle(&self, i: usize) -> f64 {
        self.q.get(Self::MIN_DOF + i).copied().unwrap_or(0.0)
    }

    fn orientation(&self) -> Matrix3<f64> {
        let yaw = Rotation3::from_axis_angle(&Vector3::z_axis(), self.wrist_angle(0));
        let pitch = Rotation3::from_axis_angle(&Vector3::y_axis(), self.wrist_angle(1));
        let roll = Rotation3::from_axis_angle(&Vector3::x_axis(), self.wrist_angle(2));
        (yaw * pitch * roll).into_inner()
    }
}

impl RobotModel for GantryModel {
    fn dof(&self) -> usize {
        self.dof
    }

    fn update(&mut self, state: &RobotState) {
        self.q.clone_from(&state.q);
        self.dq.clone_from(&state.dq);
    }

    fn joint_positions(&self) -> &DVector<f64> {
        &self.q
    }

    fn joint_velocities(&self) -> &DVector<f64> {
        &self.dq
    }

    fn end_effector_pose(&self) -> Pose<RobotFrame> {
        let offset = Vector3::new(
            self.q.get(0).copied().unwrap_or(0.0),
            self.q.get(1).copied().unwrap_or(0.0),
            self.q.get(2).copied().unwrap_or(0.0),
        );
        Pose::new(self.base_position + offset, self.orientation())
    }

    fn jacobian(&self) -> DMatrix<f64> {
        let mut jacobian = DMatrix::zeros(6, self.dof);
        for axis in 0..Self::MIN_DOF {
            jacobian[(axis, axis)] = 1.0;
        }

        let (sa, ca) = self.wrist_angle(0).sin_cos();
        let (sb, cb) = self.wrist_angle(1).sin_cos();
        // Z-Y-X 欧拉角速率 → 基座系角速度
        let axes = [
            Vector3::new(0.0, 0.0, 1.0),
            Vector3::new(-sa, ca, 0.0),
            Vector3::new(ca * cb, sa * cb, -sb),
        ];
        for (i, axis) in axes.iter().enumerate() {
            let col = Self::MIN_DOF + i;
            if col >= self.dof {
                break;
            }
            jacobian.fixed_view_mut::<3, 1>(3, col).copy_from(axis);
        }
        jacobian
    }

    fn mass_matrix(&self) -> DMatrix<f64> {
        DMatrix::from_diagonal(&self.joint_inertia)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_rejects_too_few_joints() {
        assert!(matches!(
            GantryModel::new(2),
            Err(ControlError::InvalidConfig(_))
        ));
        assert!(GantryModel::new(3).is_ok());
    }

    #[test]
    fn test_inertia_validation() {
        let model = GantryModel::new(4).unwrap();
        assert!(model.clone().with_joint_inertia(DVector::from_element(3, 1.0)).is_err());
        assert!(
            model
                .clone()
                .with_joint_inertia(DVector::from_vec(vec![1.0, 1.0, 0.0, 1.0]))
                .is_err()
        );
        let model = model
            .with_joint_inertia(DVector::from_vec(vec![1.0, 2.0, 3.0, 4.0]))
            .unwrap();
        assert_eq!(model.mass_matrix()[(3, 3)], 4.0);
        assert_eq!(model.mass_matrix()[(0, 1)], 0.0);
    }

    #[test]
    fn test_end_effector_pose() {
        let mut model = GantryModel::new(6)
            .unwrap()
            .with_base_position(Vector3::new(0.3, 0.0, 0.5));
        let q = DVector::from_vec(vec![0.1, -0.2, 0.05, std::f64::consts::FRAC_PI_2, 0.0, 0.0]);
        model.update(&RobotState::new(q, DVector::zeros(6)));

        let pose = model.end_effector_pose();
        assert_relative_eq!(pose.position, Vector3::new(0.4, -0.2, 0.55), epsilon = 1e-12);
        // 绕 Z 轴 90°
        assert_relative_eq!(
            pose.orientation * Vector3::x(),
            Vector3::y(),
            epsilon = 1e-12
        );
    }

    #[test]
    fn test_jacobian_matches_finite_difference() {
        let mut model = GantryModel::new(6).unwrap();
        let q = DVector::from_vec(vec![0.1, 0.2, 0.3, 0.4, -0.3, 0.7]);
        let dq = DVector::from_vec(vec![0.0, 0.0, 0.0, 0.2, -0.1, 0.3]);
        model.update(&RobotState::new(q.clone(), dq.clone()));

        let twist = model.jacobian() * &dq;
        let r0 = model.end_effector_pose().orientation;

        let h = 1e-7;
        model.update(&RobotState::new(&q + &dq * h, dq.clone()));
        let r1 = model.end_effector_pose().orientation;

        // ω^ ≈ (R1 - R0) / h · R0ᵀ
        let omega_hat = (r1 - r0) / h * r0.transpose();
        let omega = Vector3::new(omega_hat[(2, 1)], omega_hat[(0, 2)], omega_hat[(1, 0)]);
        assert_relative_eq!(omega, twist.fixed_rows::<3>(3).into_owned(), epsilon = 1e-5);
    }

    #[test]
    fn test_redundant_joints_do_not_move_end_effector() {
        let model = GantryModel::new(7).unwrap();
        let jacobian = model.jacobian();
        assert_eq!(jacobian.shape(), (6, 7));
        assert!(jacobian.column(6).iter().all(|v| *v == 0.0));
    }

    #[test]
    fn test_positional_model_has_no_angular_rows() {
        let model = GantryModel::new(3).unwrap();
        let jacobian = model.jacobian();
        assert_eq!(jacobian.rows(3, 3).norm(), 0.0);
        assert_eq!(model.end_effector_pose().orientation, Matrix3::identity());
    }
}
