// src/math/integrator.rs

//! 常微分方程式の1ステップ積分器
//!
//! スケジューラは複数モデルの状態をまとめて4段ルンゲ・クッタで進めるため、
//! 段ごとの時刻オフセットと重みをここで共有する。

/// 4段ルンゲ・クッタの各段の時刻オフセット（dt に対する比率）
pub const RK4_STAGE_OFFSETS: [f64; 4] = [0.0, 0.5, 0.5, 1.0];

/// 4段ルンゲ・クッタの各段の重み
pub const RK4_WEIGHTS: [f64; 4] = [1.0 / 6.0, 1.0 / 3.0, 1.0 / 3.0, 1.0 / 6.0];

/// 4段ルンゲ・クッタ法で状態ベクトルを1ステップ進める
///
/// # 引数
/// - `x`: 状態ベクトル（その場で更新される）
/// - `t`: 現在時刻
/// - `dt`: 刻み幅
/// - `f`: 微分関数 `f(t, x, dxdt)`
pub fn rk4_step<F>(x: &mut [f64], t: f64, dt: f64, mut f: F)
where
    F: FnMut(f64, &[f64], &mut [f64]),
{
    let n = x.len();
    let x0 = x.to_vec();
    let mut stage = x0.clone();
    let mut k = vec![0.0; n];
    let mut acc = vec![0.0; n];

    for (i, (offset, weight)) in RK4_STAGE_OFFSETS.iter().zip(RK4_WEIGHTS).enumerate() {
        if i > 0 {
            // 前段の傾きから今段の評価点を作る
            for j in 0..n {
                stage[j] = x0[j] + offset * dt * k[j];
            }
        }
        f(t + offset * dt, &stage, &mut k);
        for j in 0..n {
            acc[j] += weight * k[j];
        }
    }

    for j in 0..n {
        x[j] = x0[j] + dt * acc[j];
    }
}

/// 2次ルンゲ・クッタ法（中点法）で状態ベクトルを1ステップ進める
///
/// # 引数
/// - `x`: 状態ベクトル（その場で更新される）
/// - `t`: 現在時刻
/// - `dt`: 刻み幅
/// - `f`: 微分関数 `f(t, x, dxdt)`
pub fn rk2_step<F>(x: &mut [f64], t: f64, dt: f64, mut f: F)
where
    F: FnMut(f64, &[f64], &mut [f64]),
{
    let n = x.len();
    let mut k = vec![0.0; n];
    f(t, x, &mut k);

    let mid: Vec<f64> = x.iter().zip(&k).map(|(xi, ki)| xi + 0.5 * dt * ki).collect();
    f(t + 0.5 * dt, &mid, &mut k);

    for (xi, ki) in x.iter_mut().zip(&k) {
        *xi += dt * ki;
    }
}
