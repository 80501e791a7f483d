// src/config/mod.rs

pub mod parameters;
pub mod scenario;

use serde::{Deserialize, Serialize};

use parameters::{
    AutopilotParameters, GuidanceParameters, MissileParameters, MissileTrackerParameters, MscTrackerParameters,
    RadarParameters, SeekerParameters, TargetParameters, WeaveTrackerParameters,
};
use scenario::Scenario;

/// 交戦シミュレーションの全設定（YAML 1 文書）
///
/// どのセクション・フィールドも省略でき、省略時は既定値を使う。
#[derive(Debug, Default, Deserialize, Serialize, Clone, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct SimulationConfig {
    pub scenario: Scenario,
    pub target: TargetParameters,
    pub fc_radar: RadarParameters,
    pub fc_weave_tracker: WeaveTrackerParameters,
    pub fc_msc_tracker: MscTrackerParameters,
    pub missile: MissileParameters,
    pub seeker: SeekerParameters,
    pub missile_tracker: MissileTrackerParameters,
    pub guidance: GuidanceParameters,
    pub autopilot: AutopilotParameters,
}

impl SimulationConfig {
    /// 値の整合性を検査する。問題があれば内容を返す。
    pub fn validate(&self) -> Result<(), String> {
        let positive = [
            ("scenario.time_step", self.scenario.time_step),
            ("scenario.max_time", self.scenario.max_time),
            ("target.weave_period", self.target.weave_period),
            ("fc_radar.frame_time_step", self.fc_radar.frame_time_step),
            ("fc_weave_tracker.frame_time_step", self.fc_weave_tracker.frame_time_step),
            ("fc_msc_tracker.frame_time_step", self.fc_msc_tracker.frame_time_step),
            ("fc_msc_tracker.singer_tau", self.fc_msc_tracker.singer_tau),
            ("missile.frame_time_step", self.missile.frame_time_step),
            ("seeker.frame_time_step", self.seeker.frame_time_step),
            ("missile_tracker.frame_time_step", self.missile_tracker.frame_time_step),
            ("missile_tracker.datalink_step", self.missile_tracker.datalink_step),
            ("missile_tracker.singer_tau", self.missile_tracker.singer_tau),
            ("guidance.frame_time_step", self.guidance.frame_time_step),
            ("guidance.tau_ctrl", self.guidance.tau_ctrl),
            ("autopilot.frame_time_step", self.autopilot.frame_time_step),
            ("autopilot.tau", self.autopilot.tau),
        ];
        for (name, value) in positive {
            if !(value > 0.0 && value.is_finite()) {
                return Err(format!("{} は正の有限値である必要があります: {}", name, value));
            }
        }
        if self.scenario.runs == 0 {
            return Err("scenario.runs は 1 以上である必要があります".to_string());
        }
        Ok(())
    }
}
