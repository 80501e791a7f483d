// src/models/autopilot.rs

use crate::config::parameters::AutopilotParameters;
use crate::simulation::engagement::Engagement;
use crate::simulation::framework::{Model, ModelError, StateBlock};

/// 3 次遅れの時定数補正係数
const LAG_CORRECTION: f64 = 1.09;

/// 加速度指令を ±limit に制限する
pub fn limit_command(command: f64, limit: f64) -> f64 {
    command.clamp(-limit, limit)
}

/// 等しい時定数の 1 次遅れ 3 段直列の微分
///
/// # 引数
/// - `x`: 各段の出力 [x0, x1, x2]（x0 が最終段）
/// - `command`: 入力（制限済み加速度指令）
/// - `tau`: 全体の時定数 (s)
///
/// # 戻り値
/// - 微分 [x0', x1', x2']
pub fn third_order_lag(x: &[f64], command: f64, tau: f64) -> [f64; 3] {
    let tau_prime = tau / 3.0 / LAG_CORRECTION;
    [
        (x[1] - x[0]) / tau_prime,
        (x[2] - x[1]) / tau_prime,
        (command - x[2]) / tau_prime,
    ]
}

/// オートパイロット：誘導指令を制限し、3 次遅れで機体横加速度を応答させる
pub struct Autopilot {
    params: AutopilotParameters,
    launch_time: f64,
    block: StateBlock,
    command: f64,
}

impl Autopilot {
    pub fn new(params: AutopilotParameters, launch_time: f64) -> Self {
        Autopilot {
            params,
            launch_time,
            block: StateBlock::new(3),
            command: 0.0,
        }
    }
}

impl Model<Engagement> for Autopilot {
    fn name(&self) -> &'static str {
        "autopilot"
    }

    fn initialize(&mut self, _t: f64, _ctx: &mut Engagement) -> Result<(), ModelError> {
        self.block.clear();
        self.command = 0.0;
        Ok(())
    }

    fn frame_schedule(&self) -> Option<(f64, f64)> {
        Some((self.launch_time, self.params.frame_time_step))
    }

    fn states(&self) -> Option<&StateBlock> {
        Some(&self.block)
    }

    fn states_mut(&mut self) -> Option<&mut StateBlock> {
        Some(&mut self.block)
    }

    fn update(&mut self, _t: f64, ctx: &mut Engagement) {
        ctx.autopilot_accel = self.block.x()[0];
    }

    fn update_derivatives(&mut self, _t: f64, _ctx: &Engagement) {
        let dx = third_order_lag(self.block.x(), self.command, self.params.tau);
        self.block.dx_mut().copy_from_slice(&dx);
    }

    fn frame_update(&mut self, _t: f64, ctx: &mut Engagement) -> Result<(), ModelError> {
        self.command = limit_command(ctx.guidance_command, self.params.accel_limit);
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
    fn test_command_limit() {
        assert_eq!(limit_command(350.0, 300.0), 300.0);
        assert_eq!(limit_command(-350.0, 300.0), -300.0);
        assert_eq!(limit_command(12.0, 300.0), 12.0);
    }

    #[test]
    fn test_lag_derivatives() {
        let tau_prime = 0.2 / 3.0 / 1.09;
        let dx = third_order_lag(&[0.0, 0.0, 0.0], 10.0, 0.2);
        assert_eq!(dx[0], 0.0);
        assert_eq!(dx[1], 0.0);
        assert_abs_diff_eq!(dx[2], 10.0 / tau_prime, epsilon = 1e-9);
    }

    #[test]
    fn test_step_response_settles_to_limited_command() {
        let mut ctx = Engagement::new(NoiseSource::from_seed(1));
        ctx.guidance_command = 500.0;
        let mut scheduler = Scheduler::new(ctx, 1e-3);
        scheduler.add_model(Box::new(Autopilot::new(AutopilotParameters::default(), 0.0)));
        scheduler.initialize(0.0).unwrap();

        // 3 段直列なので立ち上がりは遅れる
        while scheduler.time() < 0.05 - 1e-9 {
            scheduler.tick();
        }
        let early = scheduler.context().autopilot_accel;
        assert!(early > 0.0 && early < 100.0, "early response {}", early);

        while scheduler.time() < 3.0 - 1e-9 {
            scheduler.tick();
        }
        assert_abs_diff_eq!(scheduler.context().autopilot_accel, 300.0, epsilon = 1e-3);
    }
}
