// src/estimation/kalman.rs

//! 汎用カーネル：ヤコビアン線形化による共分散伝播と線形カルマン補正
//!
//! 状態量ごとの違い（非線形伝播・遷移行列・プロセス雑音・観測雑音・初期化）は
//! [`FilterModel`] に閉じ込め、伝播／更新の手順自体は [`KalmanFilter`] が共通に持つ。

use log::{debug, warn};
use thiserror::Error;

use crate::math::{MathError, Matrix};

/// 推定器のエラー
#[derive(Error, Debug, Clone, PartialEq)]
pub enum EstimatorError {
    #[error("イノベーション共分散が特異のため更新をスキップしました。")]
    SingularInnovation,
    #[error("推定値が発散しました: {0}")]
    Diverged(String),
    #[error("観測ベクトルの長さが不正です（期待値 {expected}、実際 {actual}）。")]
    MeasurementLength { expected: usize, actual: usize },
    #[error(transparent)]
    Math(#[from] MathError),
}

/// フィルタ固有の部分
pub trait FilterModel {
    /// 観測ごとに渡される雑音パラメータ
    type Noise;

    /// 状態量の数
    fn state_len(&self) -> usize;

    /// 観測量の数
    fn measurement_len(&self) -> usize;

    /// 観測行列 H (measurement_len × state_len)
    fn measurement_matrix(&self) -> Matrix;

    /// 最初の観測から状態量と共分散を初期化する
    fn seed(&self, z: &[f64], noise: &Self::Noise) -> (Matrix, Matrix);

    /// 状態量の非線形伝播
    fn propagate_state(&self, x: &Matrix, dt: f64) -> Matrix;

    /// 状態遷移ヤコビアン phi（伝播前の状態で線形化）
    fn transition(&self, x: &Matrix, dt: f64) -> Matrix;

    /// プロセス雑音 Q
    fn process_noise(&self, x: &Matrix, phi: &Matrix, dt: f64) -> Matrix;

    /// 観測雑音 R
    fn measurement_noise(&self, z: &[f64], noise: &Self::Noise) -> Matrix;

    /// 状態量の妥当性検査。発散時は `EstimatorError::Diverged` を返す。
    fn check_state(&self, _x: &Matrix) -> Result<(), EstimatorError> {
        Ok(())
    }
}

/// フィルタの状態遷移（未初期化 → 追尾中）
#[derive(Debug, Clone, PartialEq)]
pub enum FilterState {
    Uninitialized,
    Tracking { x: Matrix, p: Matrix },
}

/// 直近の伝播・更新の健全性
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FilterHealth {
    Nominal,
    Degraded,
}

/// `update` の結果
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpdateOutcome {
    /// 最初の観測で状態を初期化した（補正は行わない）
    Seeded,
    /// 通常のカルマン補正を行った
    Corrected,
}

/// 汎用カルマンフィルタ
#[derive(Debug, Clone)]
pub struct KalmanFilter<M: FilterModel> {
    model: M,
    state: FilterState,
    health: FilterHealth,
    h: Matrix,
    residual: Matrix,
}

impl<M: FilterModel> KalmanFilter<M> {
    pub fn new(model: M) -> Self {
        let h = model.measurement_matrix();
        let residual = Matrix::new(model.measurement_len(), 1);
        KalmanFilter {
            model,
            state: FilterState::Uninitialized,
            health: FilterHealth::Nominal,
            h,
            residual,
        }
    }

    pub fn model(&self) -> &M {
        &self.model
    }

    pub fn state(&self) -> &FilterState {
        &self.state
    }

    pub fn health(&self) -> FilterHealth {
        self.health
    }

    pub fn is_tracking(&self) -> bool {
        matches!(self.state, FilterState::Tracking { .. })
    }

    /// 推定状態ベクトル（追尾中のみ）
    pub fn estimate(&self) -> Option<&Matrix> {
        match &self.state {
            FilterState::Tracking { x, .. } => Some(x),
            FilterState::Uninitialized => None,
        }
    }

    /// 推定共分散（追尾中のみ）
    pub fn covariance(&self) -> Option<&Matrix> {
        match &self.state {
            FilterState::Tracking { p, .. } => Some(p),
            FilterState::Uninitialized => None,
        }
    }

    /// 直近の観測残差 z - Hx
    pub fn residual(&self) -> &Matrix {
        &self.residual
    }

    /// 未初期化状態に戻す
    pub fn reset(&mut self) {
        self.state = FilterState::Uninitialized;
        self.health = FilterHealth::Nominal;
        self.residual.fill(0.0);
    }

    /// 状態量と共分散を dt だけ時間伝播する
    ///
    /// 未初期化の間は何もしない。伝播後の状態が発散していた場合は状態を更新せずに
    /// `EstimatorError::Diverged` を返す。
    ///
    /// # 引数
    /// - `dt`: 伝播時間 (s)
    pub fn propagate(&mut self, dt: f64) -> Result<(), EstimatorError> {
        let KalmanFilter {
            model,
            state,
            health,
            ..
        } = self;
        let FilterState::Tracking { x, p } = state else {
            return Ok(());
        };
        if dt == 0.0 {
            return Ok(());
        }

        let phi = model.transition(x, dt);
        let q = model.process_noise(x, &phi, dt);
        let x_next = model.propagate_state(x, dt);
        if let Err(err) = model.check_state(&x_next) {
            *health = FilterHealth::Degraded;
            return Err(err);
        }

        // P = phi * P * phi' + Q
        let mut p_next = phi.matmul(p)?.matmul(&phi.transpose())?;
        p_next.try_add_assign(&q)?;
        p_next.symmetrize()?;

        *x = x_next;
        *p = p_next;
        Ok(())
    }

    /// 観測による補正
    ///
    /// 未初期化なら観測から状態を初期化して `Seeded` を返す。
    /// イノベーション共分散が特異な場合は補正をスキップし、健全性を `Degraded` にして
    /// `EstimatorError::SingularInnovation` を返す（フィルタは追尾を継続できる）。
    ///
    /// # 引数
    /// - `z`: 観測ベクトル
    /// - `noise`: 観測雑音パラメータ
    ///
    /// # 戻り値
    /// - `UpdateOutcome`
    pub fn update(&mut self, z: &[f64], noise: &M::Noise) -> Result<UpdateOutcome, EstimatorError> {
        let expected = self.model.measurement_len();
        if z.len() != expected {
            return Err(EstimatorError::MeasurementLength {
                expected,
                actual: z.len(),
            });
        }

        let KalmanFilter {
            model,
            state,
            health,
            h,
            residual,
        } = self;
        let (x, p) = match state {
            FilterState::Uninitialized => {
                let (x, p) = model.seed(z, noise);
                *state = FilterState::Tracking { x, p };
                *health = FilterHealth::Nominal;
                return Ok(UpdateOutcome::Seeded);
            }
            FilterState::Tracking { x, p } => (x, p),
        };

        let r = model.measurement_noise(z, noise);
        let ht = h.transpose();
        let pht = p.matmul(&ht)?;

        // K = P * H' * [H * P * H' + R]^-1
        let s = h.matmul(&pht)?.try_add(&r)?;
        let s_inv = match s.inverse() {
            Ok(inv) => inv,
            Err(MathError::SingularMatrix) => {
                *health = FilterHealth::Degraded;
                warn!("イノベーション共分散が特異です。今回の補正をスキップします。");
                return Err(EstimatorError::SingularInnovation);
            }
            Err(err) => return Err(err.into()),
        };
        let k = pht.matmul(&s_inv)?;

        let innovation = Matrix::column(z).try_sub(&h.matmul(x)?)?;
        let x_next = x.try_add(&k.matmul(&innovation)?)?;
        if let Err(err) = model.check_state(&x_next) {
            *health = FilterHealth::Degraded;
            return Err(err);
        }

        // Joseph 形式: P = (I - KH) P (I - KH)' + K R K'
        let i_kh = Matrix::identity(model.state_len()).try_sub(&k.matmul(h)?)?;
        let mut p_next = i_kh
            .matmul(p)?
            .matmul(&i_kh.transpose())?
            .try_add(&k.matmul(&r)?.matmul(&k.transpose())?)?;
        p_next.symmetrize()?;

        debug!("kalman update: residual = {:?}", innovation.as_slice());
        *residual = innovation;
        *x = x_next;
        *p = p_next;
        *health = FilterHealth::Nominal;
        Ok(UpdateOutcome::Corrected)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    /// 1次元の定速度モデル（位置を観測）
    struct ConstantVelocity {
        q: f64,
    }

    impl FilterModel for ConstantVelocity {
        type Noise = f64;

        fn state_len(&self) -> usize {
            2
        }

        fn measurement_len(&self) -> usize {
            1
        }

        fn measurement_matrix(&self) -> Matrix {
            Matrix::from_rows(&[&[1.0, 0.0]]).unwrap()
        }

        fn seed(&self, z: &[f64], noise: &f64) -> (Matrix, Matrix) {
            let x = Matrix::column(&[z[0], 0.0]);
            let p = Matrix::from_rows(&[&[noise * noise, 0.0], &[0.0, 100.0]]).unwrap();
            (x, p)
        }

        fn propagate_state(&self, x: &Matrix, dt: f64) -> Matrix {
            Matrix::column(&[x[0] + x[1] * dt, x[1]])
        }

        fn transition(&self, _x: &Matrix, dt: f64) -> Matrix {
            Matrix::from_rows(&[&[1.0, dt], &[0.0, 1.0]]).unwrap()
        }

        fn process_noise(&self, _x: &Matrix, _phi: &Matrix, dt: f64) -> Matrix {
            let mut q = Matrix::new(2, 2);
            q[(1, 1)] = self.q * dt;
            q
        }

        fn measurement_noise(&self, _z: &[f64], noise: &f64) -> Matrix {
            Matrix::filled(1, 1, noise * noise)
        }

        fn check_state(&self, x: &Matrix) -> Result<(), EstimatorError> {
            if x[0].is_finite() {
                Ok(())
            } else {
                Err(EstimatorError::Diverged(format!("position = {}", x[0])))
            }
        }
    }

    #[test]
    fn test_first_update_seeds_without_correction() {
        let mut kf = KalmanFilter::new(ConstantVelocity { q: 0.0 });
        assert!(!kf.is_tracking());
        // 未初期化では伝播しても何も起きない
        kf.propagate(1.0).unwrap();
        assert!(kf.estimate().is_none());

        assert_eq!(kf.update(&[5.0], &1.0).unwrap(), UpdateOutcome::Seeded);
        assert!(kf.is_tracking());
        assert_eq!(kf.estimate().unwrap().as_slice(), &[5.0, 0.0]);
        assert_eq!(kf.update(&[5.0], &1.0).unwrap(), UpdateOutcome::Corrected);
    }

    #[test]
    fn test_tracks_constant_velocity() {
        let mut kf = KalmanFilter::new(ConstantVelocity { q: 1e-4 });
        let dt = 0.1;
        for i in 0..500 {
            let t = i as f64 * dt;
            kf.propagate(dt).unwrap();
            kf.update(&[2.0 + 3.0 * t], &0.5).unwrap();
        }
        let x = kf.estimate().unwrap();
        assert_abs_diff_eq!(x[1], 3.0, epsilon = 1e-2);
        let p = kf.covariance().unwrap();
        assert!(p.is_symmetric(None));
        assert!(p.cholesky_llt().unwrap().1);
    }

    #[test]
    fn test_measurement_length_is_checked() {
        let mut kf = KalmanFilter::new(ConstantVelocity { q: 0.0 });
        let err = kf.update(&[1.0, 2.0], &1.0).unwrap_err();
        assert_eq!(err, EstimatorError::MeasurementLength { expected: 1, actual: 2 });
    }

    #[test]
    fn test_singular_innovation_skips_update() {
        let mut kf = KalmanFilter::new(ConstantVelocity { q: 0.0 });
        // 位置分散ゼロ・観測雑音ゼロで S = 0 となる
        kf.update(&[1.0], &0.0).unwrap();
        let before = kf.estimate().unwrap().clone();
        let err = kf.update(&[2.0], &0.0).unwrap_err();
        assert_eq!(err, EstimatorError::SingularInnovation);
        assert_eq!(kf.health(), FilterHealth::Degraded);
        assert_eq!(kf.estimate().unwrap(), &before);

        // 次の正常な観測で回復する
        kf.update(&[1.0], &1.0).unwrap();
        assert_eq!(kf.health(), FilterHealth::Nominal);
    }

    #[test]
    fn test_diverged_state_is_not_committed() {
        let mut kf = KalmanFilter::new(ConstantVelocity { q: 0.0 });
        kf.update(&[0.0], &1.0).unwrap();
        let err = kf.propagate(f64::INFINITY).unwrap_err();
        assert!(matches!(err, EstimatorError::Diverged(_)));
        assert_eq!(kf.health(), FilterHealth::Degraded);
        assert!(kf.estimate().unwrap()[0].is_finite());

        kf.reset();
        assert!(!kf.is_tracking());
        assert_eq!(kf.health(), FilterHealth::Nominal);
    }
}
