// src/simulation/engagement.rs

//! 交戦モデル間で共有するコンテキスト
//!
//! 各モデルは自分の出力をここへ書き込み、他モデルの出力をここから読む。
//! モデル同士が直接参照し合うことはない。

use crate::estimation::{MscEstimate, MscNoise, WeaveEstimate};
use crate::math::NoiseSource;

/// 平面内の運動状態（慣性座標系）
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Kinematics {
    pub position: [f64; 2],     // [x, y] (m)
    pub velocity: [f64; 2],     // [vx, vy] (m/s)
    pub acceleration: [f64; 2], // [ax, ay] (m/s^2)
}

impl Kinematics {
    /// `origin` から見た相対状態 [px, py, vx, vy, ax, ay]
    pub fn relative_to(&self, origin: &Kinematics) -> [f64; 6] {
        [
            self.position[0] - origin.position[0],
            self.position[1] - origin.position[1],
            self.velocity[0] - origin.velocity[0],
            self.velocity[1] - origin.velocity[1],
            self.acceleration[0] - origin.acceleration[0],
            self.acceleration[1] - origin.acceleration[1],
        ]
    }

    pub fn speed(&self) -> f64 {
        self.velocity[0].hypot(self.velocity[1])
    }
}

/// 観測者から目標への視線の幾何
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct LineOfSight {
    pub angle: f64,      // 視線角 (rad)
    pub rate: f64,       // 視線角速度 (rad/s)
    pub range: f64,      // 距離 (m)
    pub range_rate: f64, // 距離変化率 (m/s)
}

impl LineOfSight {
    /// 相対状態 [px, py, vx, vy, ...] から視線の幾何を求める
    ///
    /// # 引数
    /// - `rel`: 目標の観測者に対する相対状態
    ///
    /// # 戻り値
    /// - 距離がゼロのときは角速度・距離変化率を 0 とする
    pub fn from_relative(rel: &[f64]) -> Self {
        let range2 = rel[0] * rel[0] + rel[1] * rel[1];
        let range = range2.sqrt();
        if range == 0.0 {
            return LineOfSight::default();
        }
        LineOfSight {
            angle: rel[1].atan2(rel[0]),
            rate: (rel[0] * rel[3] - rel[1] * rel[2]) / range2,
            range,
            range_rate: (rel[0] * rel[2] + rel[1] * rel[3]) / range,
        }
    }

    pub fn between(observer: &Kinematics, target: &Kinematics) -> Self {
        LineOfSight::from_relative(&target.relative_to(observer))
    }
}

/// 目標の真値
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct TargetTruth {
    pub kinematics: Kinematics,
    pub jerk: [f64; 2], // 加加速度 (m/s^3)
    pub weaving: bool,  // ウィーブ開始済み
    pub omega: f64,     // ウィーブ角周波数 (rad/s)
}

/// ミサイルの真値
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct MissileTruth {
    pub kinematics: Kinematics,
    pub launched: bool,
}

/// 火器管制レーダの観測
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RadarReport {
    pub valid: bool,
    pub time_stamp: f64,
    pub angle: f64,
    pub range: f64,
    pub range_rate: f64,
    pub site: Kinematics, // レーダ設置点
    pub noise: MscNoise,  // 観測雑音の標準偏差
}

impl Default for RadarReport {
    fn default() -> Self {
        RadarReport {
            valid: false,
            time_stamp: 0.0,
            angle: 0.0,
            range: 0.0,
            range_rate: 0.0,
            site: Kinematics::default(),
            noise: MscNoise {
                angle: 0.0,
                range: 0.0,
                range_rate: 0.0,
            },
        }
    }
}

/// シーカの観測
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct SeekerReport {
    pub valid: bool, // 捕捉距離内
    pub time_stamp: f64,
    pub angle: f64,
    pub angle_sigma: f64,
}

/// 火器管制 MSC 追尾の出力（レーダ設置点基準）
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct FireControlTrack {
    pub estimate: Option<MscEstimate>,
    pub relative: [f64; 6], // 直交座標の相対状態
    pub time_stamp: f64,
}

/// 火器管制ウィーブ追尾の出力
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct WeaveTrack {
    pub estimate: Option<WeaveEstimate>,
    pub time_stamp: f64,
}

/// ミサイル搭載追尾の出力
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct MissileTrack {
    pub estimate: Option<MscEstimate>,
    pub target: Kinematics,    // 推定目標状態（慣性座標系）
    pub target_jerk: [f64; 2], // データリンクから得た目標加加速度
    pub omega: f64,            // データリンクから得たウィーブ角周波数
    pub time_stamp: f64,
}

/// 交戦コンテキスト
#[derive(Debug, Clone)]
pub struct Engagement {
    pub target: TargetTruth,
    pub missile: MissileTruth,
    pub radar: RadarReport,
    pub seeker: SeekerReport,
    pub fc_track: FireControlTrack,
    pub weave_track: WeaveTrack,
    pub missile_track: MissileTrack,
    pub guidance_command: f64, // 誘導指令 (m/s^2)
    pub autopilot_accel: f64,  // 機体横加速度 (m/s^2)
    pub noise: NoiseSource,
}

impl Engagement {
    pub fn new(noise: NoiseSource) -> Self {
        Engagement {
            target: TargetTruth::default(),
            missile: MissileTruth::default(),
            radar: RadarReport::default(),
            seeker: SeekerReport::default(),
            fc_track: FireControlTrack::default(),
            weave_track: WeaveTrack::default(),
            missile_track: MissileTrack::default(),
            guidance_command: 0.0,
            autopilot_accel: 0.0,
            noise,
        }
    }

    /// ミサイルから見た目標の相対状態
    pub fn relative_truth(&self) -> [f64; 6] {
        self.target.kinematics.relative_to(&self.missile.kinematics)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    #[test]
    fn test_line_of_sight_geometry() {
        let observer = Kinematics {
            position: [0.0, 0.0],
            velocity: [100.0, 0.0],
            acceleration: [0.0, 0.0],
        };
        let target = Kinematics {
            position: [1000.0, 1000.0],
            velocity: [0.0, 0.0],
            acceleration: [0.0, 0.0],
        };
        let los = LineOfSight::between(&observer, &target);

        assert_abs_diff_eq!(los.angle, std::f64::consts::FRAC_PI_4, epsilon = 1e-12);
        assert_abs_diff_eq!(los.range, 1000.0 * 2f64.sqrt(), epsilon = 1e-9);
        // 相対速度 (-100, 0)
        assert_abs_diff_eq!(los.range_rate, -100.0 / 2f64.sqrt(), epsilon = 1e-9);
        assert_abs_diff_eq!(los.rate, 100.0 * 1000.0 / 2.0e6, epsilon = 1e-12);
    }

    #[test]
    fn test_line_of_sight_zero_range() {
        let los = LineOfSight::from_relative(&[0.0, 0.0, 5.0, 5.0]);
        assert_eq!(los, LineOfSight::default());
    }

    #[test]
    fn test_relative_state() {
        let a = Kinematics {
            position: [1.0, 2.0],
            velocity: [3.0, 4.0],
            acceleration: [5.0, 6.0],
        };
        let b = Kinematics {
            position: [0.5, 0.5],
            velocity: [1.0, 1.0],
            acceleration: [1.0, 2.0],
        };
        assert_eq!(a.relative_to(&b), [0.5, 1.5, 2.0, 3.0, 4.0, 4.0]);
        assert_abs_diff_eq!(a.speed(), 5.0, epsilon = 1e-12);
    }
}
