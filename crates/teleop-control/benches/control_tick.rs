//! 控制循环单拍性能基准测试
//!
//! 1kHz 控制循环的预算是 1ms，这里测量不含等待的纯计算耗时。

use criterion::{Criterion, black_box, criterion_group, criterion_main};
use nalgebra::{DMatrix, DVector, Vector3};
use teleop_channel::{ChannelKeys, ControlEndpoints, SharedChannel, SimEndpoints};
use teleop_control::sequencer::DEFAULT_HOME_JOINT_POSITIONS;
use teleop_control::{
    ControlLoop, ControlSequencer, GantryModel, JointTask, PoseTask, PoseTaskConfig, RobotModel,
    RobotState, SequencerConfig, Task, compose,
};
use teleop_tools::LoopConfig;

fn home_model() -> GantryModel {
    let mut model = GantryModel::new(7).unwrap();
    model.update(&RobotState::new(
        DVector::from_column_slice(&DEFAULT_HOME_JOINT_POSITIONS),
        DVector::zeros(7),
    ));
    model
}

fn setup_motion_loop() -> (ControlLoop<GantryModel, JointTask, PoseTask>, SimEndpoints) {
    let channel = SharedChannel::new();
    let keys = ChannelKeys::simulation();
    let sim = SimEndpoints::register(&channel, &keys).unwrap();
    sim.joint_positions
        .set(DVector::from_column_slice(&DEFAULT_HOME_JOINT_POSITIONS));
    sim.joint_velocities.set(DVector::zeros(7));

    let config = LoopConfig::control();
    let sequencer = ControlSequencer::with_reference_tasks(
        SequencerConfig::relative(),
        PoseTaskConfig::relative(),
        7,
        config.period(),
    );
    let mut control = ControlLoop::new(
        ControlEndpoints::register(&channel, &keys).unwrap(),
        GantryModel::new(7).unwrap(),
        sequencer,
        config,
    )
    .unwrap();

    control.initialize().unwrap();
    control.tick().unwrap();
    control.endpoints().operator.signal_ready();
    control.tick().unwrap();
    (control, sim)
}

fn bench_compose(c: &mut Criterion) {
    let model = home_model();
    let period = LoopConfig::control().period();
    let mut pose = PoseTask::new(7, period, PoseTaskConfig::relative());
    pose.reinitialize(&model);
    let mut joint = JointTask::new(7, period);
    joint.reinitialize(&model);

    c.bench_function("compose_pose_and_joint_7dof", |b| {
        b.iter(|| black_box(compose(&model, &mut pose, Some(&mut joint))))
    });
}

fn bench_pose_task_model(c: &mut Criterion) {
    let model = home_model();
    let mut pose = PoseTask::new(7, LoopConfig::control().period(), PoseTaskConfig::relative());
    let identity = DMatrix::identity(7, 7);

    c.bench_function("pose_task_update_model_7dof", |b| {
        b.iter(|| black_box(pose.update_task_model(&model, &identity)))
    });
}

fn bench_motion_tick(c: &mut Criterion) {
    let (mut control, _sim) = setup_motion_loop();
    let operator = control.endpoints().operator.clone();
    let mut offset = 0.0;

    c.bench_function("control_loop_motion_tick", |b| {
        b.iter(|| {
            offset = (offset + 1e-4) % 0.1;
            operator
                .desired_position
                .set(Vector3::new(offset, 0.0, 0.0));
            black_box(control.tick().unwrap())
        })
    });
}

criterion_group!(
    benches,
    bench_compose,
    bench_pose_task_model,
    bench_motion_tick
);
criterion_main!(benches);
