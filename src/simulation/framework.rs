// src/simulation/framework.rs

//! マルチレートのシミュレーション実行系
//!
//! [`Scheduler`] は全モデルとシミュレーション時刻、モデル間で共有するコンテキスト `C`
//! を所有する。1 ティックの処理は次のとおり。
//!
//! 1. 離散更新時刻に達したモデルのフレーム更新を登録順に実行し、次回時刻を進める
//!    （実行があれば全モデルの出力を更新する）
//! 2. 基本刻み幅を、各モデルの次回フレーム時刻と記録時刻を越えないよう縮める
//! 3. 積分対象モデルの状態を同時に 4 段ルンゲ・クッタで進める
//! 4. 時刻を進め、全モデルの出力を更新する

use log::{debug, warn};
use thiserror::Error;

use crate::estimation::EstimatorError;
use crate::math::integrator::{RK4_STAGE_OFFSETS, RK4_WEIGHTS};

/// フレーム時刻判定の許容誤差 (s)
pub const TIME_EPSILON: f64 = 1.0e-6;

/// モデルのフレーム更新・初期化のエラー
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ModelError {
    #[error(transparent)]
    Estimator(#[from] EstimatorError),
    #[error("{model}: フレーム周期が不正です ({period})")]
    InvalidSchedule { model: &'static str, period: f64 },
    #[error("{0}")]
    Invalid(String),
}

/// モデルが所有する連続状態とその微分
///
/// 要素の並びは生成時に固定され、実行中に変わらない。
#[derive(Debug, Clone, PartialEq)]
pub struct StateBlock {
    x: Vec<f64>,
    dx: Vec<f64>,
}

impl StateBlock {
    pub fn new(len: usize) -> Self {
        StateBlock {
            x: vec![0.0; len],
            dx: vec![0.0; len],
        }
    }

    pub fn len(&self) -> usize {
        self.x.len()
    }

    pub fn is_empty(&self) -> bool {
        self.x.is_empty()
    }

    pub fn x(&self) -> &[f64] {
        &self.x
    }

    pub fn x_mut(&mut self) -> &mut [f64] {
        &mut self.x
    }

    pub fn dx(&self) -> &[f64] {
        &self.dx
    }

    pub fn dx_mut(&mut self) -> &mut [f64] {
        &mut self.dx
    }

    /// 状態と微分をゼロに戻す
    pub fn clear(&mut self) {
        self.x.iter_mut().for_each(|v| *v = 0.0);
        self.dx.iter_mut().for_each(|v| *v = 0.0);
    }
}

/// スケジューラに登録されるモデル
///
/// 他モデルとのデータの受け渡しはすべてコンテキスト `C` を介して行う。
pub trait Model<C> {
    fn name(&self) -> &'static str;

    /// 試行開始時の初期化
    fn initialize(&mut self, _t: f64, _ctx: &mut C) -> Result<(), ModelError> {
        Ok(())
    }

    /// 離散更新のスケジュール `(最初の更新時刻, 周期)`。離散更新を持たないモデルは `None`。
    ///
    /// `initialize` の後に一度だけ参照される。
    fn frame_schedule(&self) -> Option<(f64, f64)> {
        None
    }

    /// 積分対象の連続状態。`None` のモデルは積分に参加しない。
    fn states(&self) -> Option<&StateBlock> {
        None
    }

    fn states_mut(&mut self) -> Option<&mut StateBlock> {
        None
    }

    /// 現在の状態から出力をコンテキストへ反映する（積分の各段でも呼ばれる）
    fn update(&mut self, _t: f64, _ctx: &mut C) {}

    /// 微分を計算して `StateBlock` の dx に書き込む
    fn update_derivatives(&mut self, _t: f64, _ctx: &C) {}

    /// 離散更新
    fn frame_update(&mut self, _t: f64, _ctx: &mut C) -> Result<(), ModelError> {
        Ok(())
    }

    /// 試行終了時の処理
    fn finalize(&mut self, _t: f64, _ctx: &mut C) {}
}

/// フレーム更新に失敗したモデル
#[derive(Debug, Clone, PartialEq)]
pub struct FrameFailure {
    pub model: &'static str,
    pub time: f64,
    pub error: ModelError,
}

/// 1 ティックの結果
#[derive(Debug, Clone, PartialEq)]
pub struct TickReport {
    pub time_before: f64,
    pub time_after: f64,
    pub step: f64,
    /// フレーム更新したモデル（実行順）
    pub frame_updates: Vec<&'static str>,
    /// `time_after` が記録時刻に一致した
    pub record_due: bool,
    pub failures: Vec<FrameFailure>,
}

#[derive(Debug, Clone, Copy)]
struct FrameClock {
    period: f64,
    next: f64,
}

struct ModelEntry<C> {
    model: Box<dyn Model<C>>,
    clock: Option<FrameClock>,
    offset: usize,
    len: usize,
}

/// シミュレーション実行系
pub struct Scheduler<C> {
    models: Vec<ModelEntry<C>>,
    ctx: C,
    sim_time: f64,
    base_step: f64,
    record_interval: Option<f64>,
    next_record: f64,
    x0: Vec<f64>,
    k: Vec<f64>,
    acc: Vec<f64>,
}

impl<C> Scheduler<C> {
    /// # 引数
    /// - `ctx`: モデル間で共有するコンテキスト
    /// - `base_step`: 基本積分刻み幅 (s)
    pub fn new(ctx: C, base_step: f64) -> Self {
        Scheduler {
            models: Vec::new(),
            ctx,
            sim_time: 0.0,
            base_step,
            record_interval: None,
            next_record: f64::INFINITY,
            x0: Vec::new(),
            k: Vec::new(),
            acc: Vec::new(),
        }
    }

    /// 記録間隔を設定する。記録時刻にはステップが一致するよう縮められる。
    pub fn set_record_interval(&mut self, interval: Option<f64>) {
        self.record_interval = interval.filter(|dt| *dt > 0.0 && dt.is_finite());
    }

    /// モデルを登録する。登録順がフレーム更新の実行順になる。
    pub fn add_model(&mut self, model: Box<dyn Model<C>>) {
        self.models.push(ModelEntry {
            model,
            clock: None,
            offset: 0,
            len: 0,
        });
    }

    pub fn time(&self) -> f64 {
        self.sim_time
    }

    pub fn base_step(&self) -> f64 {
        self.base_step
    }

    pub fn context(&self) -> &C {
        &self.ctx
    }

    pub fn context_mut(&mut self) -> &mut C {
        &mut self.ctx
    }

    pub fn into_context(self) -> C {
        self.ctx
    }

    pub fn model_names(&self) -> Vec<&'static str> {
        self.models.iter().map(|e| e.model.name()).collect()
    }

    /// 指定モデルの次回フレーム時刻
    pub fn next_frame_time(&self, name: &str) -> Option<f64> {
        self.models
            .iter()
            .find(|e| e.model.name() == name)
            .and_then(|e| e.clock.map(|c| c.next))
    }

    /// 全モデルを初期化し、積分用の作業領域を確保する
    ///
    /// # 引数
    /// - `t0`: 開始時刻 (s)
    pub fn initialize(&mut self, t0: f64) -> Result<(), ModelError> {
        self.sim_time = t0;
        self.next_record = match self.record_interval {
            Some(dt) => t0 + dt,
            None => f64::INFINITY,
        };

        let mut offset = 0;
        for entry in &mut self.models {
            entry.model.initialize(t0, &mut self.ctx)?;

            entry.clock = match entry.model.frame_schedule() {
                Some((first, period)) => {
                    if !(period > 0.0 && period.is_finite() && first.is_finite()) {
                        return Err(ModelError::InvalidSchedule {
                            model: entry.model.name(),
                            period,
                        });
                    }
                    Some(FrameClock { period, next: first })
                }
                None => None,
            };

            entry.offset = offset;
            entry.len = entry.model.states().map_or(0, StateBlock::len);
            offset += entry.len;
        }

        self.x0 = vec![0.0; offset];
        self.k = vec![0.0; offset];
        self.acc = vec![0.0; offset];

        for entry in &mut self.models {
            entry.model.update(t0, &mut self.ctx);
        }
        debug!("scheduler initialized: {} models, {} states", self.models.len(), offset);
        Ok(())
    }

    /// 1 ティック進める
    pub fn tick(&mut self) -> TickReport {
        let t = self.sim_time;
        let mut frame_updates = Vec::new();
        let mut failures = Vec::new();

        // 離散更新
        for entry in &mut self.models {
            let Some(clock) = entry.clock.as_mut() else {
                continue;
            };
            if t >= clock.next - TIME_EPSILON {
                let name = entry.model.name();
                if let Err(error) = entry.model.frame_update(t, &mut self.ctx) {
                    warn!("{} のフレーム更新に失敗しました (t = {:.6}): {}", name, t, error);
                    failures.push(FrameFailure { model: name, time: t, error });
                }
                frame_updates.push(name);
                clock.next += clock.period;
            }
        }
        // フレーム更新で状態が変わったモデルの出力を積分前に反映する
        if !frame_updates.is_empty() {
            for entry in &mut self.models {
                entry.model.update(t, &mut self.ctx);
            }
        }

        // 刻み幅の決定
        let mut dt = self.base_step;
        for clock in self.models.iter().filter_map(|e| e.clock.as_ref()) {
            let gap = clock.next - t;
            if dt - gap > TIME_EPSILON {
                dt = gap;
            }
        }
        let gap = self.next_record - t;
        if dt - gap > TIME_EPSILON {
            dt = gap;
        }
        debug_assert!(dt > 0.0 && dt.is_finite(), "invalid step {} at t = {}", dt, t);

        self.integrate(t, dt);
        self.sim_time = t + dt;

        for entry in &mut self.models {
            entry.model.update(self.sim_time, &mut self.ctx);
        }

        let record_due = self.sim_time >= self.next_record - TIME_EPSILON;
        if record_due {
            if let Some(interval) = self.record_interval {
                self.next_record += interval;
            }
        }

        TickReport {
            time_before: t,
            time_after: self.sim_time,
            step: dt,
            frame_updates,
            record_due,
            failures,
        }
    }

    /// 積分対象の全モデルを同時に 4 段ルンゲ・クッタで dt 進める
    ///
    /// 各段では中間状態を書き込んだ後に全モデルの `update` を呼び、
    /// 他モデルの出力に依存する微分も中間時刻の値で評価されるようにする。
    fn integrate(&mut self, t: f64, dt: f64) {
        if self.x0.is_empty() {
            return;
        }
        for entry in &self.models {
            if let Some(block) = entry.model.states() {
                self.x0[entry.offset..entry.offset + entry.len].copy_from_slice(block.x());
            }
        }
        self.acc.iter_mut().for_each(|v| *v = 0.0);

        for (stage, (offset, weight)) in RK4_STAGE_OFFSETS.iter().zip(RK4_WEIGHTS).enumerate() {
            let ts = t + offset * dt;
            if stage > 0 {
                for entry in &mut self.models {
                    let range = entry.offset..entry.offset + entry.len;
                    if let Some(block) = entry.model.states_mut() {
                        for ((x, x0), k) in block.x_mut().iter_mut().zip(&self.x0[range.clone()]).zip(&self.k[range]) {
                            *x = x0 + offset * dt * k;
                        }
                    }
                }
                for entry in &mut self.models {
                    entry.model.update(ts, &mut self.ctx);
                }
            }

            for entry in &mut self.models {
                if entry.len == 0 {
                    continue;
                }
                entry.model.update_derivatives(ts, &self.ctx);
                if let Some(block) = entry.model.states() {
                    let range = entry.offset..entry.offset + entry.len;
                    self.k[range.clone()].copy_from_slice(block.dx());
                    for (acc, k) in self.acc[range.clone()].iter_mut().zip(&self.k[range]) {
                        *acc += weight * k;
                    }
                }
            }
        }

        for entry in &mut self.models {
            let range = entry.offset..entry.offset + entry.len;
            if let Some(block) = entry.model.states_mut() {
                for ((x, x0), acc) in block.x_mut().iter_mut().zip(&self.x0[range.clone()]).zip(&self.acc[range]) {
                    *x = x0 + dt * acc;
                }
            }
        }
    }

    /// 全モデルの終了処理
    pub fn finalize(&mut self) {
        for entry in &mut self.models {
            entry.model.finalize(self.sim_time, &mut self.ctx);
        }
    }
}
