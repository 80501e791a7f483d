// src/simulation/runner.rs

//! 1 試行の実行：モデルの組み立て、メインループ、最接近時の外れ距離計算

use std::io::Write;
use std::path::Path;

use log::{debug, info, warn};

use crate::config::SimulationConfig;
use crate::math::random::{run_seed, NoiseSource};
use crate::models::{Autopilot, FcMscTracker, FcRadar, FcWeaveTracker, Guidance, Missile, MissileTracker, Seeker, Target};
use crate::simulation::csv::{create_csv_row, setup_csv_output};
use crate::simulation::engagement::{Engagement, LineOfSight};
use crate::simulation::framework::{ModelError, Scheduler};
use crate::simulation::SimulationError;

/// 最大時間に達した試行の外れ距離
pub const LARGE_MISS: f64 = 999.0e9;

/// 最接近時の外れ距離
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ClosestApproach {
    pub miss: f64,
    pub miss_x: f64,
    pub miss_y: f64,
}

/// 相対状態から最接近点までの外れ距離を求める
///
/// 相対速度一定とみなし、相対位置を相対速度方向の成分（行き過ぎ量）と
/// 直交成分に分ける。
///
/// # 引数
/// - `rel`: 目標のミサイルに対する相対状態 [px, py, vx, vy, ...]
pub fn closest_approach(rel: &[f64]) -> ClosestApproach {
    let range = rel[0].hypot(rel[1]);
    let rel_speed = rel[2].hypot(rel[3]);
    if range == 0.0 || rel_speed == 0.0 {
        return ClosestApproach {
            miss: range,
            miss_x: rel[0],
            miss_y: rel[1],
        };
    }

    let cos_a = ((rel[0] * rel[2] + rel[1] * rel[3]) / (range * rel_speed)).clamp(-1.0, 1.0);
    let angle = cos_a.acos();
    let overshoot = range * cos_a;
    ClosestApproach {
        miss: range * angle.sin(),
        miss_x: rel[0] - overshoot * rel[2] / rel_speed,
        miss_y: rel[1] - overshoot * rel[3] / rel_speed,
    }
}

/// 交差角：ミサイルと目標の速度ベクトルのなす角の補角 (rad)
pub fn crossing_angle(missile_velocity: &[f64; 2], target_velocity: &[f64; 2]) -> f64 {
    let dot = missile_velocity[0] * target_velocity[0] + missile_velocity[1] * target_velocity[1];
    let norm = missile_velocity[0].hypot(missile_velocity[1]) * target_velocity[0].hypot(target_velocity[1]);
    if norm == 0.0 {
        return 0.0;
    }
    std::f64::consts::PI - (dot / norm).clamp(-1.0, 1.0).acos()
}

/// 1 試行の結果
#[derive(Debug, Clone, PartialEq)]
pub struct TrialResult {
    pub run: u32,
    pub seed: u64,
    pub miss: f64,
    pub miss_x: f64,
    pub miss_y: f64,
    pub time_of_flight: f64, // 終了時のシミュレーション時刻 (s)
    pub crossing_angle: f64, // (rad)
    pub timed_out: bool,
    pub frame_failures: usize,
    pub diverged: bool, // 推定器の発散・補正スキップがあった
}

impl TrialResult {
    pub fn is_hit(&self, threshold: f64) -> bool {
        self.miss < threshold
    }

    pub fn is_flyer(&self, threshold: f64) -> bool {
        self.miss >= threshold
    }
}

/// 全モデルを登録したスケジューラを作る
///
/// 登録順（＝フレーム更新順）は、観測を作るモデルがそれを使うモデルより先になるようにする。
pub fn build_scheduler(config: &SimulationConfig, run: u32) -> Scheduler<Engagement> {
    let scenario = &config.scenario;
    let launch_time = config.missile.launch_time;

    let mut scheduler = Scheduler::new(Engagement::new(NoiseSource::for_run(run)), scenario.time_step);
    scheduler.add_model(Box::new(Target::new(
        config.target.clone(),
        scenario.crossing_angle(),
        scenario.time_to_go,
    )));
    scheduler.add_model(Box::new(FcRadar::new(config.fc_radar.clone())));
    scheduler.add_model(Box::new(FcWeaveTracker::new(config.fc_weave_tracker.clone())));
    scheduler.add_model(Box::new(FcMscTracker::new(config.fc_msc_tracker.clone())));
    scheduler.add_model(Box::new(Missile::new(config.missile.clone(), scenario.time_to_go)));
    scheduler.add_model(Box::new(Seeker::new(config.seeker.clone(), launch_time)));
    scheduler.add_model(Box::new(MissileTracker::new(config.missile_tracker.clone(), launch_time)));
    scheduler.add_model(Box::new(Guidance::new(config.guidance.clone(), launch_time)));
    scheduler.add_model(Box::new(Autopilot::new(config.autopilot.clone(), launch_time)));
    scheduler
}

/// 1 試行を実行する
///
/// 距離変化率が非負になった（最接近を過ぎた）時点、または最大時間で終了する。
///
/// # 引数
/// - `config`: 設定
/// - `run`: 試行番号
/// - `output_dir`: 軌道出力先。`None` または出力レートが 0 以下なら出力しない
///
/// # 戻り値
/// - 試行結果
pub fn run_trial(config: &SimulationConfig, run: u32, output_dir: Option<&Path>) -> Result<TrialResult, SimulationError> {
    let scenario = &config.scenario;
    let mut scheduler = build_scheduler(config, run);
    scheduler.set_record_interval(scenario.output_interval());
    scheduler.initialize(0.0)?;

    let mut writer = match (output_dir, scenario.output_interval()) {
        (Some(dir), Some(_)) => {
            let path = dir.join(format!("{}-{:05}.csv", scenario.file_stub, run));
            debug!("trajectory output: {}", path.display());
            let mut writer = setup_csv_output(path)?;
            writer.write_all(create_csv_row(scheduler.time(), scheduler.context()).as_bytes())?;
            Some(writer)
        }
        _ => None,
    };

    let mut frame_failures = 0;
    let mut diverged = false;
    let (approach, timed_out) = loop {
        let report = scheduler.tick();
        for failure in &report.failures {
            frame_failures += 1;
            if matches!(failure.error, ModelError::Estimator(_)) {
                diverged = true;
            }
        }

        let ctx = scheduler.context();
        if report.record_due {
            if let Some(writer) = writer.as_mut() {
                writer.write_all(create_csv_row(scheduler.time(), ctx).as_bytes())?;
            }
        }

        let rel = ctx.relative_truth();
        let los = LineOfSight::from_relative(&rel);
        if los.range_rate >= 0.0 {
            break (closest_approach(&rel), false);
        }
        if scheduler.time() >= scenario.max_time {
            break (
                ClosestApproach {
                    miss: LARGE_MISS,
                    miss_x: LARGE_MISS,
                    miss_y: LARGE_MISS,
                },
                true,
            );
        }
    };

    scheduler.finalize();
    let ctx = scheduler.context();
    if let Some(mut writer) = writer {
        writer.write_all(create_csv_row(scheduler.time(), ctx).as_bytes())?;
        writer.flush()?;
    }

    let result = TrialResult {
        run,
        seed: run_seed(run),
        miss: approach.miss,
        miss_x: approach.miss_x,
        miss_y: approach.miss_y,
        time_of_flight: scheduler.time(),
        crossing_angle: crossing_angle(&ctx.missile.kinematics.velocity, &ctx.target.kinematics.velocity),
        timed_out,
        frame_failures,
        diverged,
    };
    if timed_out {
        warn!("run {}: 最大時間 {} s に達しました", run, scenario.max_time);
    }
    if frame_failures > 0 {
        warn!("run {}: フレーム更新の失敗 {} 回", run, frame_failures);
    }
    info!(
        "run {} finished: miss = {:.3} m, tof = {:.3} s",
        run, result.miss, result.time_of_flight
    );
    Ok(result)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::parameters::GuidanceLaw;
    use approx::assert_abs_diff_eq;

    #[test]
    fn test_closest_approach_geometry() {
        // 相対位置 (100, 10)、相対速度 (-1000, 0) -> 最接近距離 10
        let ca = closest_approach(&[100.0, 10.0, -1000.0, 0.0]);
        assert_abs_diff_eq!(ca.miss, 10.0, epsilon = 1e-9);
        assert_abs_diff_eq!(ca.miss_x, 0.0, epsilon = 1e-9);
        assert_abs_diff_eq!(ca.miss_y, 10.0, epsilon = 1e-9);

        // 最接近点を過ぎた直後
        let ca = closest_approach(&[-0.5, 3.0, -1000.0, 0.0]);
        assert_abs_diff_eq!(ca.miss, 3.0, epsilon = 1e-9);
        assert_abs_diff_eq!(ca.miss_x, 0.0, epsilon = 1e-9);
    }

    #[test]
    fn test_closest_approach_zero_range() {
        let ca = closest_approach(&[0.0, 0.0, -1000.0, 0.0]);
        assert_eq!(ca, ClosestApproach { miss: 0.0, miss_x: 0.0, miss_y: 0.0 });
    }

    #[test]
    fn test_crossing_angle() {
        assert_abs_diff_eq!(crossing_angle(&[1000.0, 0.0], &[-270.0, 0.0]), 0.0, epsilon = 1e-12);
        assert_abs_diff_eq!(
            crossing_angle(&[1000.0, 0.0], &[0.0, 270.0]),
            std::f64::consts::FRAC_PI_2,
            epsilon = 1e-12
        );
        assert_eq!(crossing_angle(&[0.0, 0.0], &[1.0, 0.0]), 0.0);
    }

    #[test]
    fn test_model_registration_order() {
        let scheduler = build_scheduler(&SimulationConfig::default(), 1);
        assert_eq!(
            scheduler.model_names(),
            vec![
                "target",
                "fc_radar",
                "fc_weave_tracker",
                "fc_msc_tracker",
                "missile",
                "seeker",
                "missile_tracker",
                "guidance",
                "autopilot",
            ]
        );
    }

    fn short_config() -> SimulationConfig {
        let mut config = SimulationConfig::default();
        config.scenario.time_to_go = 12.0;
        config.missile.launch_time = 2.0;
        config.scenario.time_step = 2.0e-3;
        config
    }

    #[test]
    fn test_truth_guided_trial_hits() {
        let mut config = short_config();
        config.guidance.use_truth = true;
        let result = run_trial(&config, 1, None).unwrap();

        assert!(!result.timed_out);
        assert!(result.miss < 1.0, "miss = {}", result.miss);
        assert_abs_diff_eq!(result.time_of_flight, 12.0, epsilon = 0.05);
        assert!(result.crossing_angle.abs() < 0.05);
    }

    #[test]
    fn test_estimate_guided_trial_is_deterministic() {
        let config = short_config();
        let a = run_trial(&config, 3, None).unwrap();
        let b = run_trial(&config, 3, None).unwrap();
        assert_eq!(a, b);
        assert_eq!(a.seed, run_seed(3));
        assert!(!a.timed_out);
        assert!(a.miss < config.scenario.flyer_threshold, "miss = {}", a.miss);

        let c = run_trial(&config, 4, None).unwrap();
        assert_ne!(a.miss, c.miss);
    }

    #[test]
    fn test_weave_guidance_against_weaving_target() {
        let mut config = short_config();
        config.target.weave_start = 0.0;
        config.target.weave_end = 100.0;
        config.target.weave_period = 4.0;
        config.guidance.law = GuidanceLaw::Weave;
        config.guidance.use_truth = true;
        let result = run_trial(&config, 2, None).unwrap();
        assert!(!result.timed_out);
        assert!(result.miss < 0.5, "miss = {}", result.miss);
    }

    #[test]
    fn test_max_time_reports_large_miss() {
        let mut config = short_config();
        config.scenario.max_time = 1.0;
        let result = run_trial(&config, 1, None).unwrap();
        assert!(result.timed_out);
        assert_eq!(result.miss, LARGE_MISS);
        assert!(result.is_flyer(config.scenario.flyer_threshold));
    }

    #[test]
    fn test_trajectory_output() {
        let mut config = short_config();
        config.scenario.output_rate = 10.0;
        config.scenario.file_stub = "unit".to_string();
        config.guidance.use_truth = true;
        let dir = std::env::temp_dir().join(format!("msc_intercept_traj_{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();

        let result = run_trial(&config, 7, Some(&dir)).unwrap();
        let text = std::fs::read_to_string(dir.join("unit-00007.csv")).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        // ヘッダー + 初期行 + 10 Hz 記録 + 最終行
        let expected = 1 + 1 + (result.time_of_flight * 10.0).floor() as usize + 1;
        assert!((lines.len() as i64 - expected as i64).abs() <= 1, "{} lines", lines.len());
        assert!(lines[0].starts_with("time(s)"));
        std::fs::remove_dir_all(&dir).unwrap();
    }
}
