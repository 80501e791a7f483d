// src/models/guidance.rs

//! 誘導則：比例航法と、正弦運動する目標に対する最適誘導

use log::trace;

use crate::config::parameters::{GuidanceLaw, GuidanceParameters};
use crate::simulation::engagement::{Engagement, Kinematics, LineOfSight};
use crate::simulation::framework::{Model, ModelError};

/// ω tgo がこれより小さいときは級数近似を使う
const SMALL_PHASE: f64 = 1.0e-4;

/// 誘導計算の入力
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct GuidanceInputs {
    pub los: LineOfSight,
    pub target: Kinematics,
    pub target_jerk: [f64; 2],
    pub omega: f64, // ウィーブ角周波数 (rad/s)
}

/// 比例航法の加速度指令 a = N' Vc λ'
pub fn pro_nav(nav_gain: f64, closing_velocity: f64, los_rate: f64) -> f64 {
    nav_gain * closing_velocity * los_rate
}

/// ウィーブ最適誘導の有効航法定数
///
/// # 引数
/// - `x`: tgo / 制御時定数
pub fn weave_gain(x: f64) -> f64 {
    if x < 1.0e-2 {
        // x -> 0 の漸近形
        return 10.0 / x + 20.0 / 9.0;
    }
    let ex = (-x).exp();
    let x2 = x * x;
    let x3 = x2 * x;
    let num = 6.0 * x2 * (ex - 1.0 + x);
    let den = 2.0 * x3 - 6.0 * x2 + 6.0 * x + 3.0 - 12.0 * x * ex - 3.0 * (-2.0 * x).exp();
    num / den
}

/// ウィーブ最適誘導の加速度指令
///
/// 位置・速度は相対量、目標の加速度・加加速度とミサイル加速度は絶対量
/// （いずれも慣性 y 成分）。
///
/// # 引数
/// - `rel_y`, `rel_vy`: 相対位置・相対速度の y 成分
/// - `target_ay`, `target_jy`: 目標の加速度・加加速度の y 成分
/// - `missile_ay`: ミサイル加速度の y 成分
/// - `omega`: ウィーブ角周波数 (rad/s)
/// - `tgo`: 残り飛行時間 (s)
/// - `tau_ctrl`: 制御時定数 (s)
///
/// # 戻り値
/// - 加速度指令 (m/s^2)。`tgo` が正でなければ 0
#[allow(clippy::too_many_arguments)]
pub fn weave_command(
    rel_y: f64,
    rel_vy: f64,
    target_ay: f64,
    target_jy: f64,
    missile_ay: f64,
    omega: f64,
    tgo: f64,
    tau_ctrl: f64,
) -> f64 {
    if !(tgo > 0.0) {
        return 0.0;
    }
    let x = tgo / tau_ctrl;
    let wt = omega * tgo;
    let (acc_term, jerk_term) = if wt.abs() < SMALL_PHASE {
        (0.5 * tgo * tgo, tgo * tgo * tgo / 6.0)
    } else {
        let w2 = omega * omega;
        ((1.0 - wt.cos()) / w2, (wt - wt.sin()) / (w2 * omega))
    };

    let zem = rel_y + tgo * rel_vy + acc_term * target_ay + jerk_term * target_jy
        - missile_ay * tau_ctrl * tau_ctrl * ((-x).exp() - 1.0 + x);
    weave_gain(x) * zem / (tgo * tgo)
}

/// 誘導計算機
///
/// 発射時刻からフレーム周期ごとに加速度指令を計算する。接近中でないときは
/// 直前の接近速度・残り飛行時間を保持する。
pub struct Guidance {
    params: GuidanceParameters,
    launch_time: f64,
    closing_velocity: f64,
    time_to_go: f64,
}

impl Guidance {
    pub fn new(params: GuidanceParameters, launch_time: f64) -> Self {
        Guidance {
            params,
            launch_time,
            closing_velocity: 0.0,
            time_to_go: 0.0,
        }
    }

    fn inputs(&self, ctx: &Engagement) -> Option<GuidanceInputs> {
        if self.params.use_truth {
            return Some(GuidanceInputs {
                los: LineOfSight::between(&ctx.missile.kinematics, &ctx.target.kinematics),
                target: ctx.target.kinematics,
                target_jerk: ctx.target.jerk,
                omega: ctx.target.omega,
            });
        }
        let track = &ctx.missile_track;
        track.estimate.map(|est| GuidanceInputs {
            los: LineOfSight {
                angle: est.los_angle,
                rate: est.los_rate,
                range: est.range,
                range_rate: est.range_rate,
            },
            target: track.target,
            target_jerk: track.target_jerk,
            omega: track.omega,
        })
    }

    fn command(&mut self, inputs: &GuidanceInputs, missile: &Kinematics) -> f64 {
        if inputs.los.range_rate < 0.0 {
            self.closing_velocity = -inputs.los.range_rate;
            self.time_to_go = -inputs.los.range / inputs.los.range_rate;
        }

        match self.params.law {
            GuidanceLaw::ProNav => pro_nav(self.params.nav_gain, self.closing_velocity, inputs.los.rate),
            GuidanceLaw::Weave => {
                let rel = inputs.target.relative_to(missile);
                weave_command(
                    rel[1],
                    rel[3],
                    inputs.target.acceleration[1],
                    inputs.target_jerk[1],
                    missile.acceleration[1],
                    inputs.omega,
                    self.time_to_go,
                    self.params.tau_ctrl,
                )
            }
        }
    }
}

impl Model<Engagement> for Guidance {
    fn name(&self) -> &'static str {
        "guidance"
    }

    fn initialize(&mut self, _t: f64, ctx: &mut Engagement) -> Result<(), ModelError> {
        self.closing_velocity = 0.0;
        self.time_to_go = 0.0;
        ctx.guidance_command = 0.0;
        Ok(())
    }

    fn frame_schedule(&self) -> Option<(f64, f64)> {
        Some((self.launch_time, self.params.frame_time_step))
    }

    fn frame_update(&mut self, t: f64, ctx: &mut Engagement) -> Result<(), ModelError> {
        let command = match self.inputs(ctx) {
            Some(inputs) => self.command(&inputs, &ctx.missile.kinematics),
            None => 0.0,
        };
        if !command.is_finite() {
            ctx.guidance_command = 0.0;
            return Err(ModelError::Invalid(format!("guidance command is not finite at t = {:.3}", t)));
        }
        trace!("t = {:.4}: tgo = {:.3}, command = {:.3}", t, self.time_to_go, command);
        ctx.guidance_command = command;
        Ok(())
    }
}
