// src/models/mod.rs

//! 交戦シミュレーションを構成するモデル
//!
//! どのモデルも [`crate::simulation::framework::Model`] を実装し、
//! [`crate::simulation::engagement::Engagement`] を介してデータを受け渡す。

pub mod autopilot;
pub mod guidance;
pub mod missile;
pub mod radar;
pub mod seeker;
pub mod target;
pub mod trackers;

pub use autopilot::Autopilot;
pub use guidance::Guidance;
pub use missile::Missile;
pub use radar::FcRadar;
pub use seeker::Seeker;
pub use target::Target;
pub use trackers::{FcMscTracker, FcWeaveTracker, MissileTracker};
