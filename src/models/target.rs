// src/models/target.rs

//! 目標：一定速度で直進し、指定区間で横方向に正弦加速度（ウィーブ）をかける

use log::debug;

use crate::config::parameters::TargetParameters;
use crate::simulation::engagement::{Engagement, Kinematics};
use crate::simulation::framework::{Model, ModelError, StateBlock};

const PX: usize = 0;
const PY: usize = 1;
const VX: usize = 2;
const VY: usize = 3;

/// 初期状態 [px, py, vx, vy] を求める
///
/// 目標は時刻 `time_to_go` に原点を通過する。飛行経路角は交差角の補角。
///
/// # 引数
/// - `speed`: 速度 (m/s)
/// - `crossing_angle`: 交差角 (rad)
/// - `time_to_go`: 原点通過時刻 (s)
pub fn initial_state(speed: f64, crossing_angle: f64, time_to_go: f64) -> [f64; 4] {
    let theta = std::f64::consts::PI - crossing_angle;
    let vx = speed * theta.cos();
    let vy = speed * theta.sin();
    [-time_to_go * vx, -time_to_go * vy, vx, vy]
}

/// ウィーブの加速度と加加速度（慣性 y 方向）
///
/// # 戻り値
/// - `(ay, jy)`
pub fn weave_motion(amplitude: f64, omega: f64, phase: f64, t: f64) -> (f64, f64) {
    let arg = omega * t + phase;
    (amplitude * arg.sin(), amplitude * omega * arg.cos())
}

pub struct Target {
    params: TargetParameters,
    crossing_angle: f64,
    time_to_go: f64,
    block: StateBlock,
    phase: f64,
    weaving: bool,
}

impl Target {
    pub fn new(params: TargetParameters, crossing_angle: f64, time_to_go: f64) -> Self {
        Target {
            params,
            crossing_angle,
            time_to_go,
            block: StateBlock::new(4),
            phase: 0.0,
            weaving: false,
        }
    }

    fn in_weave_window(&self, t: f64) -> bool {
        self.weaving && t >= self.params.weave_start && t <= self.params.weave_end
    }

    fn motion(&self, t: f64) -> (f64, f64) {
        if self.in_weave_window(t) {
            weave_motion(self.params.weave_amplitude(), self.params.weave_omega(), self.phase, t)
        } else {
            (0.0, 0.0)
        }
    }
}

impl Model<Engagement> for Target {
    fn name(&self) -> &'static str {
        "target"
    }

    fn initialize(&mut self, _t: f64, ctx: &mut Engagement) -> Result<(), ModelError> {
        let x0 = initial_state(self.params.init_speed, self.crossing_angle, self.time_to_go);
        self.block.clear();
        self.block.x_mut().copy_from_slice(&x0);
        self.phase = ctx.noise.uniform(-std::f64::consts::PI, std::f64::consts::PI);
        self.weaving = false;
        Ok(())
    }

    fn frame_schedule(&self) -> Option<(f64, f64)> {
        // ウィーブ区間が空なら離散更新は不要
        (self.params.weave_start <= self.params.weave_end).then_some((self.params.weave_start, self.params.weave_period))
    }

    fn states(&self) -> Option<&StateBlock> {
        Some(&self.block)
    }

    fn states_mut(&mut self) -> Option<&mut StateBlock> {
        Some(&mut self.block)
    }

    fn update(&mut self, t: f64, ctx: &mut Engagement) {
        let x = self.block.x();
        let (ay, jy) = self.motion(t);
        ctx.target.kinematics = Kinematics {
            position: [x[PX], x[PY]],
            velocity: [x[VX], x[VY]],
            acceleration: [0.0, ay],
        };
        ctx.target.jerk = [0.0, jy];
        ctx.target.weaving = self.weaving;
        ctx.target.omega = if self.weaving { self.params.weave_omega() } else { 0.0 };
    }

    fn update_derivatives(&mut self, t: f64, _ctx: &Engagement) {
        let (ay, _) = self.motion(t);
        let (vx, vy) = (self.block.x()[VX], self.block.x()[VY]);
        let dx = self.block.dx_mut();
        dx[PX] = vx;
        dx[PY] = vy;
        dx[VX] = 0.0;
        dx[VY] = ay;
    }

    /// ウィーブ開始時に横方向の位置・速度を正弦運動の初期値に合わせる
    fn frame_update(&mut self, t: f64, _ctx: &mut Engagement) -> Result<(), ModelError> {
        if self.weaving || t > self.params.weave_end {
            return Ok(());
        }
        self.weaving = true;

        let amplitude = self.params.weave_amplitude();
        let omega = self.params.weave_omega();
        let arg = omega * t + self.phase;
        let x = self.block.x_mut();
        x[VY] -= amplitude / omega * arg.cos();
        x[PY] -= amplitude / (omega * omega) * arg.sin();
        debug!("target weave started at t = {:.3} (phase {:.3} rad)", t, self.phase);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::math::NoiseSource;
    use crate::simulation::framework::Scheduler;
    use approx::assert_abs_diff_eq;

    #[test]
    fn test_initial_state_passes_origin_at_time_to_go() {
        let x = initial_state(270.0, 0.0, 50.0);
        assert_abs_diff_eq!(x[VX], -270.0, epsilon = 1e-9);
        assert_abs_diff_eq!(x[VY], 0.0, epsilon = 1e-9);
        assert_abs_diff_eq!(x[PX], 13500.0, epsilon = 1e-6);

        let x = initial_state(100.0, 30f64.to_radians(), 10.0);
        assert_abs_diff_eq!(x[PX] + 10.0 * x[VX], 0.0, epsilon = 1e-9);
        assert_abs_diff_eq!(x[PY] + 10.0 * x[VY], 0.0, epsilon = 1e-9);
        assert!(x[VY] > 0.0);
    }

    #[test]
    fn test_weave_jerk_is_derivative_of_acceleration() {
        let (a0, j) = weave_motion(40.0, 0.6, 0.3, 2.0);
        let (a1, _) = weave_motion(40.0, 0.6, 0.3, 2.0 + 1e-6);
        assert_abs_diff_eq!((a1 - a0) / 1e-6, j, epsilon = 1e-4);
    }

    #[test]
    fn test_straight_flight() {
        let params = TargetParameters::default();
        let mut scheduler = Scheduler::new(Engagement::new(NoiseSource::from_seed(1)), 0.01);
        scheduler.add_model(Box::new(Target::new(params, 0.0, 50.0)));
        scheduler.initialize(0.0).unwrap();
        while scheduler.time() < 10.0 - 1e-9 {
            scheduler.tick();
        }
        let kin = scheduler.context().target.kinematics;
        assert_abs_diff_eq!(kin.position[0], 13500.0 - 2700.0, epsilon = 1e-6);
        assert_abs_diff_eq!(kin.position[1], 0.0, epsilon = 1e-9);
        assert!(!scheduler.context().target.weaving);
    }

    #[test]
    fn test_weave_is_centered_on_flight_path() {
        let params = TargetParameters {
            weave_start: 1.0,
            weave_end: 100.0,
            ..TargetParameters::default()
        };
        let amplitude = params.weave_amplitude();
        let omega = params.weave_omega();
        let mut scheduler = Scheduler::new(Engagement::new(NoiseSource::from_seed(3)), 0.01);
        scheduler.add_model(Box::new(Target::new(params, 0.0, 50.0)));
        scheduler.initialize(0.0).unwrap();

        let mut max_y: f64 = 0.0;
        let mut min_y: f64 = 0.0;
        while scheduler.time() < 31.0 - 1e-9 {
            scheduler.tick();
            let y = scheduler.context().target.kinematics.position[1];
            max_y = max_y.max(y);
            min_y = min_y.min(y);
        }
        // 横位置の振幅は A / ω^2
        let expected = amplitude / (omega * omega);
        assert!(scheduler.context().target.weaving);
        assert_abs_diff_eq!(max_y, expected, epsilon = 0.01 * expected);
        assert_abs_diff_eq!(min_y, -expected, epsilon = 0.01 * expected);
    }
}
