// src/models/seeker.rs

use crate::config::parameters::SeekerParameters;
use crate::simulation::engagement::{Engagement, LineOfSight, SeekerReport};
use crate::simulation::framework::{Model, ModelError};

/// ミサイル搭載シーカ
///
/// 発射後、捕捉距離内にある目標への視線角を雑音付きで観測する。
/// 捕捉距離外では観測無効（角度 0）とする。
pub struct Seeker {
    params: SeekerParameters,
    launch_time: f64,
}

impl Seeker {
    pub fn new(params: SeekerParameters, launch_time: f64) -> Self {
        Seeker { params, launch_time }
    }
}

impl Model<Engagement> for Seeker {
    fn name(&self) -> &'static str {
        "seeker"
    }

    fn initialize(&mut self, _t: f64, ctx: &mut Engagement) -> Result<(), ModelError> {
        ctx.seeker = SeekerReport {
            angle_sigma: self.params.angle_sigma,
            ..SeekerReport::default()
        };
        Ok(())
    }

    fn frame_schedule(&self) -> Option<(f64, f64)> {
        Some((self.launch_time, self.params.frame_time_step))
    }

    fn frame_update(&mut self, t: f64, ctx: &mut Engagement) -> Result<(), ModelError> {
        let truth = LineOfSight::between(&ctx.missile.kinematics, &ctx.target.kinematics);
        let valid = truth.range < self.params.detection_range;
        let angle = if valid {
            truth.angle + ctx.noise.gaussian(self.params.angle_sigma)
        } else {
            0.0
        };

        ctx.seeker = SeekerReport {
            valid,
            time_stamp: t,
            angle,
            angle_sigma: self.params.angle_sigma,
        };
        Ok(())
    }
}
