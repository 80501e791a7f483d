// src/estimation/mod.rs

//! 目標状態推定器
//!
//! 6 状態の MSC フィルタ（火器管制用とミサイル搭載用の 2 インスタンス）と、
//! 3 状態のウィーブフィルタは、どちらも [`kalman::KalmanFilter`] の具体化として作る。

pub mod kalman;
pub mod msc;
pub mod weave;

pub use kalman::{EstimatorError, FilterHealth, FilterModel, FilterState, KalmanFilter, UpdateOutcome};
pub use msc::{MscEstimate, MscModel, MscNoise};
pub use weave::{WeaveEstimate, WeaveModel};

/// 火器管制用・ミサイル搭載用 MSC フィルタ
pub type MscFilter = KalmanFilter<MscModel>;

/// ウィーブフィルタ
pub type WeaveFilter = KalmanFilter<WeaveModel>;
