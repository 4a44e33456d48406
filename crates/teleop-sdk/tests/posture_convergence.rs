//! POSTURE 阶段收敛测试
//!
//! 关节任务把机械臂从偏离 home 的构型驱动回 home，
//! 达到容差后恰好发生一次阶段切换。

mod common;

use common::{LockStep, config_starting_near_home};
use nalgebra::DVector;
use teleop_sdk::control::{Phase, RetargetMode, Transition};
use teleop_sdk::SystemConfig;

fn home(config: &SystemConfig) -> DVector<f64> {
    DVector::from_column_slice(&config.sequencer.home_joint_positions)
}

#[test]
fn test_posture_error_decreases_monotonically() {
    let mut config = SystemConfig::default();
    config.sequencer.integral_boost = None;
    let config = config_starting_near_home(config, &[0.0, 0.0, 0.0, 0.3]);
    let home = home(&config);

    let mut bench = LockStep::new(&config);
    let mut last_error = (bench.joint_positions() - &home).norm();
    assert!((last_error - 0.3).abs() < 1e-12);

    let mut transitions = Vec::new();
    for tick in 0..5_000u64 {
        let report = bench.step();
        if let Some(transition) = report.transition {
            transitions.push(transition);
            break;
        }
        if tick % 10 == 9 {
            let error = (bench.joint_positions() - &home).norm();
            assert!(
                error <= last_error + 1e-12,
                "posture error grew at tick {}: {} -> {}",
                tick,
                last_error,
                error
            );
            last_error = error;
        }
    }

    assert_eq!(transitions.len(), 1, "posture never completed");
    assert!(matches!(
        transitions[0],
        Transition::PostureToCalibration { .. }
    ));
    assert_eq!(bench.phase(), Phase::Calibration);
    assert!((bench.joint_positions() - &home).norm() < 5e-2);

    // 之后保持在 CALIBRATION，不再切换
    for _ in 0..500 {
        assert!(bench.step().transition.is_none());
    }
}

#[test]
fn test_posture_from_zero_configuration_with_integral_boost() {
    let config = SystemConfig::default();
    let home = home(&config);
    let mut bench = LockStep::new(&config);

    let transition = bench.run_until_transition(5_000);
    assert!(matches!(transition, Transition::PostureToCalibration { .. }));
    assert!((bench.joint_positions() - &home).norm() < 5e-2);
    // 离开 POSTURE 时恢复原始增益（积分项关闭）
    assert_eq!(
        bench.system.control().sequencer().joint_task().integral().norm(),
        0.0
    );
}

#[test]
fn test_home_pose_published_on_posture_exit() {
    let config = config_starting_near_home(SystemConfig::default(), &[0.01]);
    let mut bench = LockStep::new(&config);
    let endpoints = bench.system.control().endpoints().clone();
    assert!(!endpoints.home_position.is_set());

    let transition = bench.run_until_transition(100);
    let home = transition.home().copied().expect("posture exit carries home");

    assert_eq!(endpoints.home_position.get().unwrap(), home.position);
    assert_eq!(endpoints.home_orientation.get().unwrap(), home.orientation);
    // 操作员目标在标定前保持在 home
    assert_eq!(
        endpoints.operator.desired_position.get().unwrap(),
        home.position
    );
}

#[test]
fn test_absolute_mode_skips_calibration() {
    let config = config_starting_near_home(
        SystemConfig::for_mode(RetargetMode::Absolute),
        &[0.05, -0.05],
    );
    let mut bench = LockStep::new(&config);

    let transition = bench.run_until_transition(5_000);
    assert!(matches!(transition, Transition::PostureToMotion { .. }));
    assert_eq!(bench.phase(), Phase::Motion);
    assert!((bench.joint_positions() - home(&config)).norm() < 1e-2);
}
