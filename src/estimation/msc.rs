// src/estimation/msc.rs

//! 修正球座標 (MSC) による 6 状態の目標運動推定モデル
//!
//! 状態ベクトル:
//! 0. 視線角
//! 1. 視線角速度
//! 2. 距離の逆数
//! 3. 距離変化率 / 距離
//! 4. 視線方向加速度 / 距離
//! 5. 視線直交方向加速度 / 距離
//!
//! 観測は [視線角, 1/距離, 距離変化率/距離] の 3 要素。プロセス雑音は Singer モデル。

use crate::estimation::kalman::{EstimatorError, FilterModel};
use crate::math::{rk2_step, Matrix};

pub const LOS_ANGLE: usize = 0;
pub const LOS_RATE: usize = 1;
pub const INV_RANGE: usize = 2;
pub const RANGE_RATE_NORM: usize = 3;
pub const ACC_ALONG_NORM: usize = 4;
pub const ACC_ACROSS_NORM: usize = 5;

/// 観測雑音の標準偏差
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MscNoise {
    pub angle: f64,      // 視線角 (rad)
    pub range: f64,      // 距離 (m)
    pub range_rate: f64, // 距離変化率 (m/s)
}

/// Singer モデルで調整した MSC フィルタモデル
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MscModel {
    pub singer_tau: f64,
    pub singer_var: f64,
}

impl MscModel {
    pub fn new(singer_tau: f64, singer_var: f64) -> Self {
        MscModel {
            singer_tau,
            singer_var,
        }
    }
}

/// 角度・距離・距離変化率から MSC 観測ベクトルを作る
pub fn msc_measurement(angle: f64, range: f64, range_rate: f64) -> [f64; 3] {
    [angle, 1.0 / range, range_rate / range]
}

/// MSC 状態を直交座標の相対状態 [px, py, vx, vy, ax, ay] に変換する
pub fn msc_to_cartesian(msc: &[f64]) -> [f64; 6] {
    let range = 1.0 / msc[INV_RANGE];
    let range_rate = msc[RANGE_RATE_NORM] * range;
    let (sth, cth) = msc[LOS_ANGLE].sin_cos();
    let los_rate = msc[LOS_RATE];

    [
        range * cth,
        range * sth,
        range_rate * cth - range * los_rate * sth,
        range_rate * sth + range * los_rate * cth,
        range * (msc[ACC_ALONG_NORM] * cth - msc[ACC_ACROSS_NORM] * sth),
        range * (msc[ACC_ALONG_NORM] * sth + msc[ACC_ACROSS_NORM] * cth),
    ]
}

/// 直交座標の相対状態を MSC 状態に変換する
pub fn cartesian_to_msc(cart: &[f64]) -> [f64; 6] {
    let range2 = cart[0] * cart[0] + cart[1] * cart[1];
    let range = range2.sqrt();
    let range_rate = (cart[0] * cart[2] + cart[1] * cart[3]) / range;
    let los_angle = cart[1].atan2(cart[0]);
    let los_rate = (cart[0] * cart[3] - cart[1] * cart[2]) / range2;

    let (sth, cth) = los_angle.sin_cos();
    let acc_along = cart[4] * cth + cart[5] * sth;
    let acc_across = -cart[4] * sth + cart[5] * cth;

    [
        los_angle,
        los_rate,
        1.0 / range,
        range_rate / range,
        acc_along / range,
        acc_across / range,
    ]
}

/// MSC 推定値を物理量に直したもの
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct MscEstimate {
    pub los_angle: f64,  // 視線角 (rad)
    pub los_rate: f64,   // 視線角速度 (rad/s)
    pub range: f64,      // 距離 (m)
    pub range_rate: f64, // 距離変化率 (m/s)
    pub acc_along: f64,  // 視線方向加速度 (m/s^2)
    pub acc_across: f64, // 視線直交方向加速度 (m/s^2)
}

impl MscEstimate {
    pub fn from_state(msc: &[f64]) -> Self {
        let range = 1.0 / msc[INV_RANGE];
        MscEstimate {
            los_angle: msc[LOS_ANGLE],
            los_rate: msc[LOS_RATE],
            range,
            range_rate: msc[RANGE_RATE_NORM] * range,
            acc_along: msc[ACC_ALONG_NORM] * range,
            acc_across: msc[ACC_ACROSS_NORM] * range,
        }
    }

    /// 慣性座標系での加速度 [ax, ay]
    pub fn acceleration_xy(&self) -> [f64; 2] {
        let (sth, cth) = self.los_angle.sin_cos();
        [
            self.acc_along * cth - self.acc_across * sth,
            self.acc_along * sth + self.acc_across * cth,
        ]
    }
}

/// 加加速度ゼロの相対運動 [p, v, a] の微分
fn zero_jerk(_t: f64, x: &[f64], dx: &mut [f64]) {
    dx[0] = x[2];
    dx[1] = x[3];
    dx[2] = x[4];
    dx[3] = x[5];
    dx[4] = 0.0;
    dx[5] = 0.0;
}

/// 直交座標の相対状態を 2 次ルンゲ・クッタで dt 伝播する
pub fn propagate_cartesian(cart: &mut [f64; 6], dt: f64) {
    rk2_step(cart, 0.0, dt, zero_jerk);
}

impl FilterModel for MscModel {
    type Noise = MscNoise;

    fn state_len(&self) -> usize {
        6
    }

    fn measurement_len(&self) -> usize {
        3
    }

    fn measurement_matrix(&self) -> Matrix {
        let mut h = Matrix::new(3, 6);
        h[(0, LOS_ANGLE)] = 1.0;
        h[(1, INV_RANGE)] = 1.0;
        h[(2, RANGE_RATE_NORM)] = 1.0;
        h
    }

    fn seed(&self, z: &[f64], noise: &MscNoise) -> (Matrix, Matrix) {
        let x = Matrix::column(&[z[0], 0.0, z[1], z[2], 0.0, 0.0]);

        // 観測雑音を MSC 写像で一次伝播した初期共分散
        let inv_rng2 = z[1] * z[1];
        let range_rate = z[2] / z[1];
        let rdot_var = noise.range_rate * noise.range_rate;
        let mut p = Matrix::new(6, 6);
        p[(0, 0)] = noise.angle * noise.angle;
        p[(1, 1)] = (rdot_var * z[2]).powi(2);
        p[(2, 2)] = (noise.range * inv_rng2).powi(2);
        p[(3, 3)] = (rdot_var * z[1]).powi(2) + (range_rate * noise.range * inv_rng2).powi(2);
        p[(2, 3)] = (noise.range * z[1]).powi(2) * z[1] * z[2];
        p[(3, 2)] = p[(2, 3)];
        p[(4, 4)] = self.singer_var * inv_rng2;
        p[(5, 5)] = p[(4, 4)];
        (x, p)
    }

    fn propagate_state(&self, x: &Matrix, dt: f64) -> Matrix {
        let mut cart = msc_to_cartesian(x.as_slice());
        propagate_cartesian(&mut cart, dt);
        Matrix::column(&cartesian_to_msc(&cart))
    }

    fn transition(&self, x: &Matrix, dt: f64) -> Matrix {
        let mut phi = Matrix::new(6, 6);
        phi[(0, 0)] = 1.0;
        phi[(0, 1)] = dt;

        phi[(1, 1)] = 1.0 - 2.0 * x[RANGE_RATE_NORM] * dt;
        phi[(1, 3)] = -2.0 * x[LOS_RATE] * dt;
        phi[(1, 5)] = dt;

        phi[(2, 2)] = 1.0 - x[RANGE_RATE_NORM] * dt;
        phi[(2, 3)] = -x[INV_RANGE] * dt;

        phi[(3, 1)] = 2.0 * x[LOS_RATE] * dt;
        phi[(3, 3)] = 1.0 - 2.0 * x[RANGE_RATE_NORM] * dt;
        phi[(3, 4)] = dt;

        phi[(4, 3)] = -x[ACC_ALONG_NORM] * dt;
        phi[(4, 4)] = 1.0 - (1.0 / self.singer_tau + x[RANGE_RATE_NORM]) * dt;

        phi[(5, 3)] = -x[ACC_ACROSS_NORM] * dt;
        phi[(5, 5)] = phi[(4, 4)];
        phi
    }

    fn process_noise(&self, x: &Matrix, phi: &Matrix, dt: f64) -> Matrix {
        let alpha_r = 2.0 * x[INV_RANGE].powi(2) * dt / (3.0 * self.singer_tau) * self.singer_var;
        let phi44 = phi[(4, 4)];
        let q = alpha_r * (phi44 * phi44 + phi44 + 1.0);

        let mut noise = Matrix::new(6, 6);
        noise[(4, 4)] = q;
        noise[(5, 5)] = q;
        noise
    }

    fn measurement_noise(&self, z: &[f64], noise: &MscNoise) -> Matrix {
        let rng_var = noise.range * noise.range;
        let mut r = Matrix::new(3, 3);
        r[(0, 0)] = noise.angle * noise.angle;
        r[(1, 1)] = (noise.range * z[1] * z[1]).powi(2);
        r[(2, 2)] = (noise.range_rate.powi(2) + (noise.range * z[2]).powi(2)) * z[1] * z[1];
        r[(1, 2)] = rng_var * z[2] * z[1].powi(3);
        r[(2, 1)] = r[(1, 2)];
        r
    }

    fn check_state(&self, x: &Matrix) -> Result<(), EstimatorError> {
        let inv_range = x[INV_RANGE];
        if !inv_range.is_finite() || inv_range <= 0.0 {
            return Err(EstimatorError::Diverged(format!("inverse range = {:e}", inv_range)));
        }
        if x.as_slice().iter().any(|v| !v.is_finite()) {
            return Err(EstimatorError::Diverged("non-finite MSC state".to_string()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::estimation::kalman::{FilterHealth, KalmanFilter, UpdateOutcome};
    use crate::math::NoiseSource;
    use approx::assert_abs_diff_eq;

    const RADAR_NOISE: MscNoise = MscNoise {
        angle: 500e-6,
        range: 3.0,
        range_rate: 3.0,
    };

    #[test]
    fn test_coordinate_conversions_are_inverse() {
        let cart = [12_000.0, -3_500.0, -250.0, 40.0, 15.0, -30.0];
        let msc = cartesian_to_msc(&cart);
        let back = msc_to_cartesian(&msc);
        for (a, b) in cart.iter().zip(back) {
            assert_abs_diff_eq!(*a, b, epsilon = 1e-6);
        }
    }

    #[test]
    fn test_msc_components() {
        // 真横に離れて接近する目標
        let cart = [0.0, 2_000.0, 0.0, -100.0, 0.0, 0.0];
        let msc = cartesian_to_msc(&cart);
        assert_abs_diff_eq!(msc[LOS_ANGLE], std::f64::consts::FRAC_PI_2, epsilon = 1e-12);
        assert_abs_diff_eq!(msc[LOS_RATE], 0.0, epsilon = 1e-12);
        assert_abs_diff_eq!(msc[INV_RANGE], 1.0 / 2_000.0, epsilon = 1e-15);
        assert_abs_diff_eq!(msc[RANGE_RATE_NORM], -0.05, epsilon = 1e-12);

        let est = MscEstimate::from_state(&msc);
        assert_abs_diff_eq!(est.range, 2_000.0, epsilon = 1e-9);
        assert_abs_diff_eq!(est.range_rate, -100.0, epsilon = 1e-9);
    }

    #[test]
    fn test_propagation_matches_kinematics() {
        let model = MscModel::new(100.0, 100.0);
        let cart = [10_000.0, 1_000.0, -300.0, 20.0, 0.0, 5.0];
        let x = Matrix::column(&cartesian_to_msc(&cart));
        let next = model.propagate_state(&x, 0.5);
        let moved = msc_to_cartesian(next.as_slice());
        assert_abs_diff_eq!(moved[0], 10_000.0 - 150.0, epsilon = 1e-6);
        assert_abs_diff_eq!(moved[1], 1_000.0 + 10.0 + 0.5 * 5.0 * 0.25, epsilon = 1e-6);
        assert_abs_diff_eq!(moved[3], 20.0 + 2.5, epsilon = 1e-9);
    }

    #[test]
    fn test_seed_covariance_is_positive_semi_definite() {
        let model = MscModel::new(100.0, 100.0);
        let z = msc_measurement(0.1, 15_000.0, -400.0);
        let (x, p) = model.seed(&z, &RADAR_NOISE);
        assert_eq!(x.as_slice(), &[0.1, 0.0, z[1], z[2], 0.0, 0.0]);
        assert!(p.is_symmetric(None));
        assert_diagonal_non_negative(&p);
        // 対角がゼロに近い成分があるので小さな値を足して確認する
        assert!(normalized_psd(&p));
    }

    #[test]
    fn test_normalized_psd_rejects_negative_diagonal() {
        let mut p = Matrix::identity(3);
        p[(1, 1)] = -1e-12;
        assert!(!normalized_psd(&p));
        p[(1, 1)] = 0.0;
        assert!(normalized_psd(&p));
    }

    #[test]
    fn test_check_state_rejects_negative_inverse_range() {
        let model = MscModel::new(100.0, 100.0);
        let x = Matrix::column(&[0.0, 0.0, -1e-4, 0.0, 0.0, 0.0]);
        assert!(matches!(model.check_state(&x), Err(EstimatorError::Diverged(_))));
    }

    fn assert_diagonal_non_negative(p: &Matrix) {
        for i in 0..p.rows() {
            assert!(p[(i, i)] >= 0.0, "P[{0}][{0}] = {1:e}", i, p[(i, i)]);
        }
    }

    /// 相関行列に正規化したうえで Cholesky 分解できるか
    ///
    /// 負の対角成分は相関行列に現れないので、先に弾く。
    fn normalized_psd(p: &Matrix) -> bool {
        let n = p.rows();
        if (0..n).any(|i| p[(i, i)].is_nan() || p[(i, i)] < 0.0) {
            return false;
        }
        let mut corr = Matrix::identity(n);
        for r in 0..n {
            for c in 0..n {
                let scale = (p[(r, r)] * p[(c, c)]).sqrt();
                if r != c && scale > 0.0 {
                    corr[(r, c)] = p[(r, c)] / scale;
                }
            }
        }
        // 丸め誤差による非対称を除去
        corr.symmetrize().unwrap();
        for i in 0..n {
            corr[(i, i)] += 1e-9;
        }
        corr.cholesky_llt().unwrap().1
    }

    /// 等速直進目標を 64 Hz で 10000 サイクル追尾し、共分散の対称性・半正定値性と
    /// 距離・距離変化率の収束を確認する
    #[test]
    fn test_long_run_covariance_and_convergence() {
        let dt = 1.0 / 64.0;
        let mut kf = KalmanFilter::new(MscModel::new(100.0, 100.0));
        let mut noise = NoiseSource::from_seed(2024);

        // レーダ原点から 20 km、横切る方向に 100 m/s、接近方向に 50 m/s
        let start = [20_000.0, 0.0];
        let vel = [-50.0, 100.0];

        let mut max_range_err: f64 = 0.0;
        let mut max_rdot_err: f64 = 0.0;
        for cycle in 0..10_000 {
            let t = cycle as f64 * dt;
            let px = start[0] + vel[0] * t;
            let py = start[1] + vel[1] * t;
            let range = (px * px + py * py).sqrt();
            let range_rate = (px * vel[0] + py * vel[1]) / range;
            let angle = py.atan2(px);

            let z = msc_measurement(
                angle + noise.gaussian(RADAR_NOISE.angle),
                range + noise.gaussian(RADAR_NOISE.range),
                range_rate + noise.gaussian(RADAR_NOISE.range_rate),
            );

            kf.propagate(dt).unwrap();
            let outcome = kf.update(&z, &RADAR_NOISE).unwrap();
            if cycle == 0 {
                assert_eq!(outcome, UpdateOutcome::Seeded);
            }
            assert_eq!(kf.health(), FilterHealth::Nominal);

            let p = kf.covariance().unwrap();
            assert!(p.is_symmetric(None), "cycle {}", cycle);
            assert_diagonal_non_negative(p);
            assert!(normalized_psd(p), "cycle {}", cycle);

            if cycle >= 9_000 {
                let est = MscEstimate::from_state(kf.estimate().unwrap().as_slice());
                max_range_err = max_range_err.max((est.range - range).abs());
                max_rdot_err = max_rdot_err.max((est.range_rate - range_rate).abs());
            }
        }

        assert!(max_range_err < 30.0, "range error {}", max_range_err);
        assert!(max_rdot_err < 10.0, "range rate error {}", max_rdot_err);
    }
}
