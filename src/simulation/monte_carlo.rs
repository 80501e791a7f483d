// src/simulation/monte_carlo.rs

use std::fmt;
use std::path::Path;

use log::info;

use crate::config::SimulationConfig;
use crate::simulation::load_parameters::ConfigError;
use crate::simulation::runner::{run_trial, TrialResult};
use crate::simulation::SimulationError;

/// 外れ距離の統計
#[derive(Debug, Clone, PartialEq)]
pub struct MissStatistics {
    pub runs: usize,
    pub p_hit: f64,
    pub p_hit_threshold: f64,
    pub miss70: f64,
    pub median: f64,
    pub miss35: f64,
    pub miss20: f64,
    pub avg_miss: f64,   // 非フライヤーの平均
    pub min_miss: f64,
    pub max_miss: f64,
    pub avg_miss_x: f64, // 非フライヤーの平均
    pub avg_miss_y: f64,
    pub std_miss_x: f64, // 非フライヤーの標本標準偏差
    pub std_miss_y: f64,
    pub avg_crossing_angle: f64, // 非フライヤーの平均 (rad)
    pub flyers: usize,
}

/// 昇順ソート済み配列のパーセンタイル（下側、floor(n p) 番目）。空なら `None`。
pub fn percentile(sorted: &[f64], fraction: f64) -> Option<f64> {
    let last = sorted.len().checked_sub(1)?;
    let index = ((sorted.len() as f64 * fraction) as usize).saturating_sub(1);
    sorted.get(index.min(last)).copied()
}

/// 昇順ソート済み配列の中央値。空なら `None`。
pub fn median(sorted: &[f64]) -> Option<f64> {
    let n = sorted.len();
    if n == 0 {
        None
    } else if n % 2 == 0 {
        Some(0.5 * (sorted[n / 2 - 1] + sorted[n / 2]))
    } else {
        Some(sorted[n / 2])
    }
}

/// 標本標準偏差（n - 1 で割る）。要素数 1 以下なら 0。
pub fn sample_std(values: &[f64]) -> f64 {
    let n = values.len();
    if n <= 1 {
        return 0.0;
    }
    let mean = values.iter().sum::<f64>() / n as f64;
    let ss: f64 = values.iter().map(|v| (v - mean).powi(2)).sum();
    (ss / (n - 1) as f64).sqrt()
}

fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        0.0
    } else {
        values.iter().sum::<f64>() / values.len() as f64
    }
}

impl MissStatistics {
    /// 試行結果を集計する。結果が空なら `None`。
    ///
    /// # 引数
    /// - `results`: 試行結果
    /// - `flyer_threshold`: これ以上の外れ距離は平均・標準偏差から除く (m)
    /// - `p_hit_threshold`: 命中とみなす外れ距離 (m)
    pub fn from_results(results: &[TrialResult], flyer_threshold: f64, p_hit_threshold: f64) -> Option<Self> {
        let runs = results.len();
        let mut sorted: Vec<f64> = results.iter().map(|r| r.miss).collect();
        sorted.sort_by(f64::total_cmp);
        let (&min_miss, &max_miss) = (sorted.first()?, sorted.last()?);

        let non_flyers: Vec<&TrialResult> = results.iter().filter(|r| !r.is_flyer(flyer_threshold)).collect();
        let miss: Vec<f64> = non_flyers.iter().map(|r| r.miss.abs()).collect();
        let miss_x: Vec<f64> = non_flyers.iter().map(|r| r.miss_x).collect();
        let miss_y: Vec<f64> = non_flyers.iter().map(|r| r.miss_y).collect();
        let angles: Vec<f64> = non_flyers.iter().map(|r| r.crossing_angle).collect();
        let hits = results.iter().filter(|r| r.is_hit(p_hit_threshold)).count();

        Some(MissStatistics {
            runs,
            p_hit: hits as f64 / runs as f64,
            p_hit_threshold,
            miss70: percentile(&sorted, 0.7)?,
            median: median(&sorted)?,
            miss35: percentile(&sorted, 0.35)?,
            miss20: percentile(&sorted, 0.2)?,
            avg_miss: mean(&miss),
            min_miss,
            max_miss,
            avg_miss_x: mean(&miss_x),
            avg_miss_y: mean(&miss_y),
            std_miss_x: sample_std(&miss_x),
            std_miss_y: sample_std(&miss_y),
            avg_crossing_angle: mean(&angles),
            flyers: runs - non_flyers.len(),
        })
    }
}

impl fmt::Display for MissStatistics {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let header = [
            "runs", "pHit", "pHitThld", "miss70", "medMiss", "miss35", "miss20", "avgMissMag", "minMiss", "maxMiss",
            "avgMissX", "avgMissY", "stdMissX", "stdMissY", "avgXang", "qtyFly",
        ];
        for name in header {
            write!(f, "{:>10} ", name)?;
        }
        writeln!(f)?;

        write!(f, "{:>10} ", self.runs)?;
        let values = [
            self.p_hit,
            self.p_hit_threshold,
            self.miss70,
            self.median,
            self.miss35,
            self.miss20,
            self.avg_miss,
            self.min_miss,
            self.max_miss,
            self.avg_miss_x,
            self.avg_miss_y,
            self.std_miss_x,
            self.std_miss_y,
            self.avg_crossing_angle.to_degrees(),
        ];
        for value in values {
            write!(f, "{:>10.3} ", value)?;
        }
        write!(f, "{:>10}", self.flyers)
    }
}

/// 各試行の結果 1 行（print_all 用）
pub fn format_trial(result: &TrialResult, flyer_threshold: f64) -> String {
    if result.is_flyer(flyer_threshold) {
        format!("{:5}{:10.3e}{:10.3}{:10}", result.run, result.miss, result.time_of_flight, result.seed)
    } else {
        format!("{:5}{:10.3}{:10.3}{:10}", result.run, result.miss, result.time_of_flight, result.seed)
    }
}

/// Monte-Carlo 試行を順に実行し、統計を返す
///
/// # 引数
/// - `config`: 設定（試行数と開始番号は `scenario` から取る）
/// - `output_dir`: 軌道出力先
/// - `on_result`: 各試行の終了時に呼ばれる
///
/// # 戻り値
/// - 全試行の結果と統計
pub fn run_monte_carlo<F>(
    config: &SimulationConfig,
    output_dir: Option<&Path>,
    mut on_result: F,
) -> Result<(Vec<TrialResult>, MissStatistics), SimulationError>
where
    F: FnMut(&TrialResult),
{
    let scenario = &config.scenario;
    let first = scenario.run_start;
    let mut results = Vec::with_capacity(scenario.runs as usize);

    info!("Monte-Carlo: {} runs from run {}", scenario.runs, first);
    for run in first..first + scenario.runs {
        let result = run_trial(config, run, output_dir)?;
        on_result(&result);
        results.push(result);
    }

    let stats = MissStatistics::from_results(&results, scenario.flyer_threshold, scenario.p_hit_threshold)
        .ok_or_else(|| ConfigError::Invalid("scenario.runs が 0 です".to_string()))?;
    info!("pHit = {:.3}, median miss = {:.3} m", stats.p_hit, stats.median);
    Ok((results, stats))
}
