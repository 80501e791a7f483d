// src/models/radar.rs

use crate::config::parameters::RadarParameters;
use crate::estimation::MscNoise;
use crate::math::NoiseSource;
use crate::simulation::engagement::{Engagement, Kinematics, LineOfSight, RadarReport};
use crate::simulation::framework::{Model, ModelError};

/// 火器管制レーダ
///
/// 設置点から目標への視線角・距離・距離変化率を、距離に依存しない
/// 正規雑音を加えて観測する。
pub struct FcRadar {
    params: RadarParameters,
}

/// 真の視線幾何に雑音を加えた観測値を作る
///
/// # 引数
/// - `truth`: 真の視線幾何
/// - `noise`: 観測雑音の標準偏差
/// - `source`: 雑音源
///
/// # 戻り値
/// - `(角度, 距離, 距離変化率)`
pub fn noisy_measurement(truth: &LineOfSight, noise: &MscNoise, source: &mut NoiseSource) -> (f64, f64, f64) {
    let angle = truth.angle + source.gaussian(noise.angle);
    let range = truth.range + source.gaussian(noise.range);
    let range_rate = truth.range_rate + source.gaussian(noise.range_rate);
    (angle, range, range_rate)
}

impl FcRadar {
    pub fn new(params: RadarParameters) -> Self {
        FcRadar { params }
    }

    fn site(&self) -> Kinematics {
        Kinematics {
            position: self.params.position,
            ..Kinematics::default()
        }
    }

    fn noise(&self) -> MscNoise {
        MscNoise {
            angle: self.params.angle_sigma,
            range: self.params.range_sigma,
            range_rate: self.params.range_rate_sigma,
        }
    }
}

impl Model<Engagement> for FcRadar {
    fn name(&self) -> &'static str {
        "fc_radar"
    }

    fn initialize(&mut self, _t: f64, ctx: &mut Engagement) -> Result<(), ModelError> {
        ctx.radar = RadarReport {
            site: self.site(),
            noise: self.noise(),
            ..RadarReport::default()
        };
        Ok(())
    }

    fn frame_schedule(&self) -> Option<(f64, f64)> {
        Some((self.params.init_frame_time, self.params.frame_time_step))
    }

    fn frame_update(&mut self, t: f64, ctx: &mut Engagement) -> Result<(), ModelError> {
        let site = self.site();
        let noise = self.noise();
        let truth = LineOfSight::between(&site, &ctx.target.kinematics);
        let (angle, range, range_rate) = noisy_measurement(&truth, &noise, &mut ctx.noise);
        if !(range > 0.0) {
            return Err(ModelError::Invalid(format!("radar range is not positive: {}", range)));
        }

        ctx.radar = RadarReport {
            valid: true,
            time_stamp: t,
            angle,
            range,
            range_rate,
            site,
            noise,
        };
        Ok(())
    }
}
