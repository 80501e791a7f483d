// src/models/trackers.rs

//! 目標追尾器
//!
//! - 火器管制ウィーブ追尾：レーダ観測の横位置 (距離 × 角度) から正弦運動を推定
//! - 火器管制 MSC 追尾：レーダ観測から目標の相対運動を推定
//! - ミサイル搭載追尾：データリンクで受けた火器管制推定とシーカ角度を融合

use log::{debug, warn};

use crate::config::parameters::{
    MissileTrackerParameters, MscTrackerParameters, WeaveTrackerParameters,
};
use crate::estimation::msc::{msc_measurement, msc_to_cartesian, propagate_cartesian};
use crate::estimation::weave::lateral_position_sigma;
use crate::estimation::{
    EstimatorError, FilterModel, KalmanFilter, MscEstimate, MscFilter, MscModel, MscNoise, UpdateOutcome,
    WeaveEstimate, WeaveFilter, WeaveModel,
};
use crate::simulation::engagement::{Engagement, FireControlTrack, Kinematics, LineOfSight, MissileTrack, WeaveTrack};
use crate::simulation::framework::{Model, ModelError, TIME_EPSILON};

/// 前回の観測時刻から伝播し、観測で補正する
///
/// 未初期化のフィルタは観測で初期化されるだけで伝播しない。
fn propagate_and_correct<M: FilterModel>(
    filter: &mut KalmanFilter<M>,
    last_stamp: &mut Option<f64>,
    stamp: f64,
    z: &[f64],
    noise: &M::Noise,
) -> Result<UpdateOutcome, EstimatorError> {
    if let Some(last) = *last_stamp {
        filter.propagate(stamp - last)?;
    }
    *last_stamp = Some(stamp);
    filter.update(z, noise)
}

impl From<&WeaveTrackerParameters> for WeaveModel {
    fn from(params: &WeaveTrackerParameters) -> Self {
        WeaveModel {
            process_noise: params.process_noise,
            init_vel_y: params.init_vel_y,
            init_omega2: params.init_omega2,
            init_pos_sigma_scale: params.init_pos_y_sigma_scale,
            init_vel_sigma: params.init_vel_y_sigma,
            init_omega2_sigma: params.init_omega2_sigma,
        }
    }
}

/// 火器管制ウィーブ追尾器
pub struct FcWeaveTracker {
    params: WeaveTrackerParameters,
    filter: WeaveFilter,
    last_stamp: Option<f64>,
}

impl FcWeaveTracker {
    pub fn new(params: WeaveTrackerParameters) -> Self {
        let filter = WeaveFilter::new(WeaveModel::from(&params));
        FcWeaveTracker {
            params,
            filter,
            last_stamp: None,
        }
    }
}

impl Model<Engagement> for FcWeaveTracker {
    fn name(&self) -> &'static str {
        "fc_weave_tracker"
    }

    fn initialize(&mut self, _t: f64, ctx: &mut Engagement) -> Result<(), ModelError> {
        self.filter.reset();
        self.last_stamp = None;
        ctx.weave_track = WeaveTrack::default();
        Ok(())
    }

    fn frame_schedule(&self) -> Option<(f64, f64)> {
        Some((self.params.init_frame_time, self.params.frame_time_step))
    }

    fn frame_update(&mut self, _t: f64, ctx: &mut Engagement) -> Result<(), ModelError> {
        let radar = ctx.radar;
        if !radar.valid || self.last_stamp == Some(radar.time_stamp) {
            return Ok(());
        }

        let pos_y = radar.range * radar.angle;
        let sigma = lateral_position_sigma(radar.range, radar.angle, radar.noise.range, radar.noise.angle);
        let result = propagate_and_correct(&mut self.filter, &mut self.last_stamp, radar.time_stamp, &[pos_y], &sigma);

        ctx.weave_track = WeaveTrack {
            estimate: self.filter.estimate().map(|x| WeaveEstimate::from_state(x.as_slice())),
            time_stamp: radar.time_stamp,
        };
        result?;
        Ok(())
    }
}

/// 火器管制 MSC 追尾器
pub struct FcMscTracker {
    params: MscTrackerParameters,
    filter: MscFilter,
    last_stamp: Option<f64>,
}

impl FcMscTracker {
    pub fn new(params: MscTrackerParameters) -> Self {
        let filter = MscFilter::new(MscModel::new(params.singer_tau, params.singer_var));
        FcMscTracker {
            params,
            filter,
            last_stamp: None,
        }
    }
}

impl Model<Engagement> for FcMscTracker {
    fn name(&self) -> &'static str {
        "fc_msc_tracker"
    }

    fn initialize(&mut self, _t: f64, ctx: &mut Engagement) -> Result<(), ModelError> {
        self.filter.reset();
        self.last_stamp = None;
        ctx.fc_track = FireControlTrack::default();
        Ok(())
    }

    fn frame_schedule(&self) -> Option<(f64, f64)> {
        Some((self.params.init_frame_time, self.params.frame_time_step))
    }

    fn frame_update(&mut self, _t: f64, ctx: &mut Engagement) -> Result<(), ModelError> {
        let radar = ctx.radar;
        if !radar.valid || self.last_stamp == Some(radar.time_stamp) {
            return Ok(());
        }

        let z = msc_measurement(radar.angle, radar.range, radar.range_rate);
        let result = propagate_and_correct(&mut self.filter, &mut self.last_stamp, radar.time_stamp, &z, &radar.noise);

        if let Some(x) = self.filter.estimate() {
            ctx.fc_track = FireControlTrack {
                estimate: Some(MscEstimate::from_state(x.as_slice())),
                relative: msc_to_cartesian(x.as_slice()),
                time_stamp: radar.time_stamp,
            };
        }
        result?;
        Ok(())
    }
}

/// データリンクで受けた目標状態
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Datalink {
    pub state: [f64; 6], // 目標の [px, py, vx, vy, ax, ay]（慣性座標系）
    pub jerk: [f64; 2],
    pub omega: f64,
    pub time: f64, // state の時刻
}

impl Datalink {
    /// 火器管制 MSC 推定から目標の慣性状態を作る
    ///
    /// # 引数
    /// - `site`: レーダ設置点
    /// - `track`: 火器管制 MSC 追尾の出力
    pub fn from_msc(site: &Kinematics, track: &FireControlTrack) -> Option<Self> {
        let est = track.estimate?;
        let (sth, cth) = est.los_angle.sin_cos();
        let acc = est.acceleration_xy();
        Some(Datalink {
            state: [
                site.position[0] + est.range * cth,
                site.position[1] + est.range * sth,
                site.velocity[0] + est.range_rate * cth - est.range * est.los_rate * sth,
                site.velocity[1] + est.range_rate * sth + est.range * est.los_rate * cth,
                acc[0],
                acc[1],
            ],
            jerk: [0.0, 0.0],
            omega: 0.0,
            time: track.time_stamp,
        })
    }

    /// ウィーブ推定と火器管制 MSC 推定の距離・距離変化率から目標の慣性状態を作る
    ///
    /// 視線角は横位置 / 距離の小角近似で求める。横方向の加速度と加加速度は
    /// 正弦運動 y'' = -ω² y から与える。
    pub fn from_weave(site: &Kinematics, track: &FireControlTrack, weave: &WeaveEstimate) -> Option<Self> {
        let est = track.estimate?;
        let range = est.range;
        let los_angle = weave.pos_y / range;
        let los_rate = weave.vel_y / range;
        let (sth, cth) = los_angle.sin_cos();
        let omega2 = weave.omega2.max(0.0);

        let px = site.position[0] + range * cth;
        let py = site.position[1] + range * sth;
        let vx = site.velocity[0] + est.range_rate * cth - range * los_rate * sth;
        let vy = site.velocity[1] + est.range_rate * sth + range * los_rate * cth;
        Some(Datalink {
            state: [px, py, vx, vy, track.relative[4], -(py - site.position[1]) * omega2],
            jerk: [0.0, -(vy - site.velocity[1]) * omega2],
            omega: weave.omega(),
            time: track.time_stamp,
        })
    }

    /// 指定時刻まで加加速度ゼロで外挿する
    pub fn advance_to(&mut self, time: f64) {
        if time != self.time {
            propagate_cartesian(&mut self.state, time - self.time);
            self.time = time;
        }
    }
}

/// シーカ観測が無効な間に使う角度雑音（レーダ角度雑音をミサイルからの距離に換算）
///
/// # 引数
/// - `radar_angle_sigma`: レーダ角度雑音 (rad)
/// - `radar_range`: レーダから目標までの距離 (m)
/// - `missile_range`: ミサイルから目標までの距離 (m)
/// - `seeker_angle_sigma`: シーカ角度雑音 (rad)。下限として使う
pub fn datalink_angle_sigma(radar_angle_sigma: f64, radar_range: f64, missile_range: f64, seeker_angle_sigma: f64) -> f64 {
    (radar_angle_sigma * radar_range / missile_range).max(seeker_angle_sigma)
}

/// ミサイル搭載 MSC 追尾器
///
/// データリンクで受けた目標状態をシーカの観測時刻まで外挿し、距離・距離変化率の
/// 擬似観測とシーカ角度を合わせて MSC フィルタを更新する。
pub struct MissileTracker {
    params: MissileTrackerParameters,
    launch_time: f64,
    filter: MscFilter,
    datalink: Option<Datalink>,
    next_uplink: f64,
    last_stamp: Option<f64>,
}

impl MissileTracker {
    pub fn new(params: MissileTrackerParameters, launch_time: f64) -> Self {
        let filter = MscFilter::new(MscModel::new(params.singer_tau, params.singer_var));
        MissileTracker {
            params,
            launch_time,
            filter,
            datalink: None,
            next_uplink: launch_time,
            last_stamp: None,
        }
    }

    /// データリンク受信
    fn receive_uplink(&mut self, ctx: &Engagement) {
        let site = ctx.radar.site;
        let from_weave = match (ctx.target.weaving, ctx.weave_track.estimate) {
            (true, Some(weave)) => Datalink::from_weave(&site, &ctx.fc_track, &weave),
            _ => None,
        };
        if let Some(link) = from_weave.or_else(|| Datalink::from_msc(&site, &ctx.fc_track)) {
            self.datalink = Some(link);
        }
    }

    fn fuse(&mut self, ctx: &Engagement) -> Result<(), EstimatorError> {
        let Some(link) = self.datalink.as_mut() else {
            return Ok(());
        };
        let seeker = ctx.seeker;
        link.advance_to(seeker.time_stamp);
        if self.last_stamp == Some(seeker.time_stamp) {
            return Ok(());
        }

        let missile = &ctx.missile.kinematics;
        let rel = [
            link.state[0] - missile.position[0],
            link.state[1] - missile.position[1],
            link.state[2] - missile.velocity[0],
            link.state[3] - missile.velocity[1],
        ];
        let los = LineOfSight::from_relative(&rel);
        if !(los.range > 0.0) {
            return Err(EstimatorError::Diverged("datalink range is zero".to_string()));
        }

        let (angle, angle_sigma) = if seeker.valid {
            (seeker.angle, seeker.angle_sigma)
        } else {
            let radar_range = ctx.fc_track.estimate.map_or(ctx.radar.range, |est| est.range);
            (
                los.angle,
                datalink_angle_sigma(ctx.radar.noise.angle, radar_range, los.range, seeker.angle_sigma),
            )
        };
        // 距離・距離変化率は推定値どうしの相関を考慮し、レーダの観測雑音で重み付けする
        let noise = MscNoise {
            angle: angle_sigma,
            range: ctx.radar.noise.range,
            range_rate: ctx.radar.noise.range_rate,
        };
        let z = msc_measurement(angle, los.range, los.range_rate);
        propagate_and_correct(&mut self.filter, &mut self.last_stamp, seeker.time_stamp, &z, &noise)?;
        Ok(())
    }

    fn publish(&self, ctx: &mut Engagement) {
        let Some(x) = self.filter.estimate() else {
            return;
        };
        let missile = ctx.missile.kinematics;
        let rel = msc_to_cartesian(x.as_slice());
        let (jerk, omega) = self.datalink.map_or(([0.0, 0.0], 0.0), |link| (link.jerk, link.omega));
        ctx.missile_track = MissileTrack {
            estimate: Some(MscEstimate::from_state(x.as_slice())),
            target: Kinematics {
                position: [missile.position[0] + rel[0], missile.position[1] + rel[1]],
                velocity: [missile.velocity[0] + rel[2], missile.velocity[1] + rel[3]],
                acceleration: [missile.acceleration[0] + rel[4], missile.acceleration[1] + rel[5]],
            },
            target_jerk: jerk,
            omega,
            time_stamp: self.last_stamp.unwrap_or(0.0),
        };
    }
}

impl Model<Engagement> for MissileTracker {
    fn name(&self) -> &'static str {
        "missile_tracker"
    }

    fn initialize(&mut self, _t: f64, ctx: &mut Engagement) -> Result<(), ModelError> {
        self.filter.reset();
        self.datalink = None;
        self.next_uplink = self.launch_time;
        self.last_stamp = None;
        ctx.missile_track = MissileTrack::default();
        Ok(())
    }

    fn frame_schedule(&self) -> Option<(f64, f64)> {
        Some((self.launch_time, self.params.frame_time_step))
    }

    fn frame_update(&mut self, t: f64, ctx: &mut Engagement) -> Result<(), ModelError> {
        if t >= self.next_uplink - TIME_EPSILON {
            self.next_uplink = t + self.params.datalink_step;
            self.receive_uplink(ctx);
        }

        let result = self.fuse(ctx);
        if let Err(err) = &result {
            warn!("missile tracker: {} (t = {:.4})", err, t);
        } else if self.filter.is_tracking() {
            debug!("missile tracker updated at t = {:.4}", t);
        }
        self.publish(ctx);
        result?;
        Ok(())
    }
}
