// src/estimation/weave.rs

//! 正弦運動（ウィーブ）する目標の横方向推定モデル
//!
//! 状態ベクトル [横位置, 横速度, ω²]、観測は横位置のみ。
//! 運動方程式は y'' = -ω² y（ω² は定数とみなす）。

use crate::estimation::kalman::{EstimatorError, FilterModel};
use crate::math::{rk2_step, Matrix};

pub const POS_Y: usize = 0;
pub const VEL_Y: usize = 1;
pub const OMEGA2: usize = 2;

/// ウィーブ推定モデルのパラメータ
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WeaveModel {
    pub process_noise: f64,
    pub init_vel_y: f64,
    pub init_omega2: f64,
    pub init_pos_sigma_scale: f64,
    pub init_vel_sigma: f64,
    pub init_omega2_sigma: f64,
}

impl Default for WeaveModel {
    fn default() -> Self {
        WeaveModel {
            process_noise: 0.0128,
            init_vel_y: 0.0,
            init_omega2: 4.0,
            init_pos_sigma_scale: 1.4,
            init_vel_sigma: 5.0,
            init_omega2_sigma: 2.0,
        }
    }
}

/// 角度・距離の雑音から横位置 (距離 × 角度) の雑音を近似する
pub fn lateral_position_sigma(range: f64, angle: f64, range_sigma: f64, angle_sigma: f64) -> f64 {
    range * angle_sigma + angle.abs() * range_sigma
}

/// 推定値を物理量に直したもの
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct WeaveEstimate {
    pub pos_y: f64,
    pub vel_y: f64,
    pub omega2: f64,
}

impl WeaveEstimate {
    pub fn from_state(x: &[f64]) -> Self {
        WeaveEstimate {
            pos_y: x[POS_Y],
            vel_y: x[VEL_Y],
            omega2: x[OMEGA2],
        }
    }

    /// 角周波数 ω（ω² が負なら 0）
    pub fn omega(&self) -> f64 {
        self.omega2.max(0.0).sqrt()
    }
}

fn harmonic(_t: f64, x: &[f64], dx: &mut [f64]) {
    dx[0] = x[1];
    dx[1] = -x[2] * x[0];
    dx[2] = 0.0;
}

impl FilterModel for WeaveModel {
    /// 横位置の観測雑音 (m)
    type Noise = f64;

    fn state_len(&self) -> usize {
        3
    }

    fn measurement_len(&self) -> usize {
        1
    }

    fn measurement_matrix(&self) -> Matrix {
        let mut h = Matrix::new(1, 3);
        h[(0, POS_Y)] = 1.0;
        h
    }

    /// 横位置は初回観測から、横速度と ω² は設定値から取る
    fn seed(&self, z: &[f64], sigma: &f64) -> (Matrix, Matrix) {
        let x = Matrix::column(&[z[0], self.init_vel_y, self.init_omega2]);
        let mut p = Matrix::new(3, 3);
        p[(0, 0)] = (self.init_pos_sigma_scale * sigma).powi(2);
        p[(1, 1)] = self.init_vel_sigma.powi(2);
        p[(2, 2)] = self.init_omega2_sigma.powi(2);
        (x, p)
    }

    fn propagate_state(&self, x: &Matrix, dt: f64) -> Matrix {
        let mut next = x.clone();
        rk2_step(next.as_mut_slice(), 0.0, dt, harmonic);
        next
    }

    fn transition(&self, x: &Matrix, dt: f64) -> Matrix {
        let mut phi = Matrix::identity(3);
        phi[(0, 1)] = dt;
        phi[(1, 0)] = -x[OMEGA2] * dt;
        phi[(1, 2)] = -x[POS_Y] * dt;
        phi
    }

    fn process_noise(&self, x: &Matrix, _phi: &Matrix, dt: f64) -> Matrix {
        let q = self.process_noise;
        let mut noise = Matrix::new(3, 3);
        noise[(1, 1)] = x[POS_Y].powi(2) * dt.powi(3) * q / 3.0;
        noise[(1, 2)] = -0.5 * x[POS_Y] * dt * dt * q;
        noise[(2, 1)] = noise[(1, 2)];
        noise[(2, 2)] = dt * q;
        noise
    }

    /// R は分散 σ²。σ をそのまま R に入れると単位が合わない。
    fn measurement_noise(&self, _z: &[f64], sigma: &f64) -> Matrix {
        Matrix::filled(1, 1, sigma * sigma)
    }

    fn check_state(&self, x: &Matrix) -> Result<(), EstimatorError> {
        if x.as_slice().iter().all(|v| v.is_finite()) {
            Ok(())
        } else {
            Err(EstimatorError::Diverged("non-finite weave state".to_string()))
        }
    }
}
