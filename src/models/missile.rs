// src/models/missile.rs

use log::info;

use crate::config::parameters::MissileParameters;
use crate::simulation::engagement::{Engagement, Kinematics};
use crate::simulation::framework::{Model, ModelError, StateBlock, TIME_EPSILON};

const PX: usize = 0;
const PY: usize = 1;
const VX: usize = 2;
const VY: usize = 3;

/// 機体横加速度を慣性座標系の加速度に変換する
///
/// # 引数
/// - `velocity`: 速度ベクトル [vx, vy]
/// - `lateral_accel`: 機体 y 軸方向の加速度 (m/s^2)
///
/// # 戻り値
/// - 加速度ベクトル [ax, ay]
pub fn body_to_inertial_accel(velocity: &[f64; 2], lateral_accel: f64) -> [f64; 2] {
    let theta = velocity[1].atan2(velocity[0]);
    [-lateral_accel * theta.sin(), lateral_accel * theta.cos()]
}

/// 迎撃ミサイル
///
/// 発射前は静止し、発射時刻に初速を与えられる。以後は速度の大きさを保ち、
/// オートパイロットの横加速度で旋回する。
pub struct Missile {
    params: MissileParameters,
    time_to_go: f64,
    block: StateBlock,
    launched: bool,
}

impl Missile {
    pub fn new(params: MissileParameters, time_to_go: f64) -> Self {
        Missile {
            params,
            time_to_go,
            block: StateBlock::new(4),
            launched: false,
        }
    }

    fn velocity(&self) -> [f64; 2] {
        [self.block.x()[VX], self.block.x()[VY]]
    }
}

impl Model<Engagement> for Missile {
    fn name(&self) -> &'static str {
        "missile"
    }

    fn initialize(&mut self, _t: f64, _ctx: &mut Engagement) -> Result<(), ModelError> {
        self.block.clear();
        // 発射後に初速のまま飛べば time_to_go に原点へ達する位置
        self.block.x_mut()[PX] = -(self.time_to_go - self.params.launch_time) * self.params.init_speed;
        self.launched = false;
        Ok(())
    }

    fn frame_schedule(&self) -> Option<(f64, f64)> {
        Some((self.params.launch_time, self.params.frame_time_step))
    }

    fn states(&self) -> Option<&StateBlock> {
        Some(&self.block)
    }

    fn states_mut(&mut self) -> Option<&mut StateBlock> {
        Some(&mut self.block)
    }

    fn update(&mut self, _t: f64, ctx: &mut Engagement) {
        let x = self.block.x();
        let velocity = self.velocity();
        let acceleration = if self.launched {
            body_to_inertial_accel(&velocity, ctx.autopilot_accel)
        } else {
            [0.0, 0.0]
        };
        ctx.missile.kinematics = Kinematics {
            position: [x[PX], x[PY]],
            velocity,
            acceleration,
        };
        ctx.missile.launched = self.launched;
    }

    fn update_derivatives(&mut self, _t: f64, ctx: &Engagement) {
        let velocity = self.velocity();
        let acceleration = if self.launched {
            body_to_inertial_accel(&velocity, ctx.autopilot_accel)
        } else {
            [0.0, 0.0]
        };
        let dx = self.block.dx_mut();
        dx[PX] = velocity[0];
        dx[PY] = velocity[1];
        dx[VX] = acceleration[0];
        dx[VY] = acceleration[1];
    }

    fn frame_update(&mut self, t: f64, _ctx: &mut Engagement) -> Result<(), ModelError> {
        if !self.launched && t >= self.params.launch_time - TIME_EPSILON {
            self.launched = true;
            let x = self.block.x_mut();
            x[VX] = self.params.init_speed;
            x[VY] = 0.0;
            info!("missile launched at t = {:.3} from x = {:.1} m", t, x[PX]);
        }
        Ok(())
    }
}
