// src/config/parameters.rs

use serde::{Deserialize, Serialize};

/// 重力加速度 (m/s^2)
pub const GRAVITY: f64 = 9.80665;

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct TargetParameters {
    pub init_speed: f64,        // 初期速度 (m/s)
    pub weave_start: f64,       // ウィーブ開始時刻 (s)
    pub weave_end: f64,         // ウィーブ終了時刻 (s)
    pub weave_amplitude_g: f64, // ウィーブ加速度振幅 (G)
    pub weave_period: f64,      // ウィーブ周期 (s)
}

impl Default for TargetParameters {
    fn default() -> Self {
        TargetParameters {
            init_speed: 270.0,
            weave_start: 999.0e9,
            weave_end: -1.0,
            weave_amplitude_g: 4.0,
            weave_period: 10.0,
        }
    }
}

impl TargetParameters {
    /// ウィーブ加速度振幅 (m/s^2)
    pub fn weave_amplitude(&self) -> f64 {
        self.weave_amplitude_g * GRAVITY
    }

    /// ウィーブ角周波数 (rad/s)
    pub fn weave_omega(&self) -> f64 {
        std::f64::consts::TAU / self.weave_period
    }
}

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct RadarParameters {
    pub frame_time_step: f64,  // フレーム周期 (s)
    pub init_frame_time: f64,  // 最初のフレーム時刻 (s)
    pub position: [f64; 2],    // 設置位置 [x, y] (m)
    pub angle_sigma: f64,      // 角度雑音 (rad)
    pub range_sigma: f64,      // 距離雑音 (m)
    pub range_rate_sigma: f64, // 距離変化率雑音 (m/s)
}

impl Default for RadarParameters {
    fn default() -> Self {
        RadarParameters {
            frame_time_step: 1.0 / 64.0,
            init_frame_time: 0.0,
            position: [-10.0e3, 0.0],
            angle_sigma: 500.0e-6,
            range_sigma: 3.0,
            range_rate_sigma: 3.0,
        }
    }
}

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct WeaveTrackerParameters {
    pub frame_time_step: f64,
    pub init_frame_time: f64,
    pub process_noise: f64,        // プロセス雑音密度
    pub init_pos_y_sigma_scale: f64, // 横位置初期分散の倍率
    pub init_vel_y: f64,           // 横速度初期値 (m/s)
    pub init_vel_y_sigma: f64,     // 横速度初期標準偏差 (m/s)
    pub init_omega2: f64,          // ω² 初期値 (rad^2/s^2)
    pub init_omega2_sigma: f64,    // ω² 初期標準偏差
}

impl Default for WeaveTrackerParameters {
    fn default() -> Self {
        WeaveTrackerParameters {
            frame_time_step: 1.0 / 64.0,
            init_frame_time: 0.0,
            process_noise: 0.0128,
            init_pos_y_sigma_scale: 1.4,
            init_vel_y: 0.0,
            init_vel_y_sigma: 5.0,
            init_omega2: 4.0,
            init_omega2_sigma: 2.0,
        }
    }
}

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct MscTrackerParameters {
    pub frame_time_step: f64,
    pub init_frame_time: f64,
    pub singer_tau: f64, // Singer モデル相関時間 (s)
    pub singer_var: f64, // Singer モデル加速度分散 (m^2/s^4)
}

impl Default for MscTrackerParameters {
    fn default() -> Self {
        MscTrackerParameters {
            frame_time_step: 1.0 / 64.0,
            init_frame_time: 0.0,
            singer_tau: 100.0,
            singer_var: 100.0,
        }
    }
}

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct MissileParameters {
    pub init_speed: f64,      // 発射時速度 (m/s)
    pub launch_time: f64,     // 発射時刻 (s)
    pub frame_time_step: f64, // 発射後のフレーム周期 (s)
}

impl Default for MissileParameters {
    fn default() -> Self {
        MissileParameters {
            init_speed: 1.0e3,
            launch_time: 30.0,
            frame_time_step: 999.0e9,
        }
    }
}

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct SeekerParameters {
    pub frame_time_step: f64,
    pub detection_range: f64, // 捕捉距離 (m)
    pub angle_sigma: f64,     // 角度雑音 (rad)
}

impl Default for SeekerParameters {
    fn default() -> Self {
        SeekerParameters {
            frame_time_step: 1.0 / 180.0,
            detection_range: 10.0e3,
            angle_sigma: 0.2e-3,
        }
    }
}

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct MissileTrackerParameters {
    pub frame_time_step: f64,
    pub datalink_step: f64, // データリンク更新間隔 (s)
    pub singer_tau: f64,
    pub singer_var: f64,
}

impl Default for MissileTrackerParameters {
    fn default() -> Self {
        MissileTrackerParameters {
            frame_time_step: 1.0 / 64.0,
            datalink_step: 1.0 / 64.0,
            singer_tau: 0.3,
            singer_var: 600.0,
        }
    }
}

/// 誘導則
#[derive(Debug, Deserialize, Serialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum GuidanceLaw {
    ProNav,
    Weave,
}

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct GuidanceParameters {
    pub frame_time_step: f64,
    pub law: GuidanceLaw,
    pub nav_gain: f64,  // 比例航法係数
    pub tau_ctrl: f64,  // 最適誘導の時定数 (s)
    pub use_truth: bool, // 推定値の代わりに真値を使う
}

impl Default for GuidanceParameters {
    fn default() -> Self {
        GuidanceParameters {
            frame_time_step: 1.0 / 64.0,
            law: GuidanceLaw::ProNav,
            nav_gain: 3.0,
            tau_ctrl: 0.4,
            use_truth: false,
        }
    }
}

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct AutopilotParameters {
    pub frame_time_step: f64,
    pub accel_limit: f64, // 加速度制限 (m/s^2)
    pub tau: f64,         // 制御系時定数 (s)
}

impl Default for AutopilotParameters {
    fn default() -> Self {
        AutopilotParameters {
            frame_time_step: 1.0 / 64.0,
            accel_limit: 300.0,
            tau: 0.2,
        }
    }
}
