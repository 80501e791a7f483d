// src/config/scenario.rs

use serde::{Deserialize, Serialize};

/// 実行制御と Monte-Carlo のシナリオ設定
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct Scenario {
    pub time_step: f64,          // 基本積分刻み幅 (s)
    pub max_time: f64,           // 最大シミュレーション時間 (s)
    pub time_to_go: f64,         // 目標が原点を通過する時刻 (s)
    pub crossing_angle_deg: f64, // 交差角：速度ベクトル間の角の補角 (度)
    pub runs: u32,               // Monte-Carlo 試行数
    pub run_start: u32,          // 最初の試行番号
    pub flyer_threshold: f64,    // これ以上の外れ距離は「フライヤー」(m)
    pub p_hit_threshold: f64,    // 命中とみなす外れ距離 (m)
    pub output_rate: f64,        // 軌道出力レート (Hz)。0 以下で出力しない
    pub file_stub: String,       // 軌道出力ファイル名の接頭辞
    pub print_all: bool,         // 各試行の結果を表示する
}

impl Default for Scenario {
    fn default() -> Self {
        Scenario {
            time_step: 1.0e-3,
            max_time: 100.0,
            time_to_go: 50.0,
            crossing_angle_deg: 0.0,
            runs: 1,
            run_start: 1,
            flyer_threshold: 10.0,
            p_hit_threshold: 1.0,
            output_rate: -1.0,
            file_stub: "traj".to_string(),
            print_all: false,
        }
    }
}

impl Scenario {
    /// 交差角 (rad)
    pub fn crossing_angle(&self) -> f64 {
        self.crossing_angle_deg.to_radians()
    }

    /// 軌道出力間隔 (s)。出力しない場合は `None`。
    pub fn output_interval(&self) -> Option<f64> {
        (self.output_rate > 0.0).then(|| 1.0 / self.output_rate)
    }
}
