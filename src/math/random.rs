// src/math/random.rs

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rand_distr::{Distribution, StandardNormal, Uniform};

/// Monte-Carlo 試行番号から乱数シードを決める
///
/// 試行番号 n に対して |2n - 1| * 13579 を用いる。
pub fn run_seed(run: u32) -> u64 {
    (2 * i64::from(run) - 1).unsigned_abs() * 13579
}

/// シード付きの雑音源
///
/// 1試行につき1つ生成し、全センサで共有する。同じシードなら同じ系列を返す。
#[derive(Debug, Clone)]
pub struct NoiseSource {
    rng: StdRng,
}

impl NoiseSource {
    pub fn from_seed(seed: u64) -> Self {
        NoiseSource {
            rng: StdRng::seed_from_u64(seed),
        }
    }

    /// 試行番号に対応する雑音源
    pub fn for_run(run: u32) -> Self {
        NoiseSource::from_seed(run_seed(run))
    }

    /// 平均 0、標準偏差 `sigma` の正規乱数
    pub fn gaussian(&mut self, sigma: f64) -> f64 {
        let z: f64 = StandardNormal.sample(&mut self.rng);
        sigma * z
    }

    /// [low, high] の一様乱数。範囲が空なら `low` を返す。
    pub fn uniform(&mut self, low: f64, high: f64) -> f64 {
        if !(high > low) {
            return low;
        }
        Uniform::new_inclusive(low, high).sample(&mut self.rng)
    }

    /// 生の乱数生成器（テスト用の補助）
    pub fn next_u64(&mut self) -> u64 {
        self.rng.gen()
    }
}
