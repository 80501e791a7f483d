// src/simulation/mod.rs

pub mod csv;
pub mod engagement;
pub mod framework;
pub mod load_parameters;
pub mod monte_carlo;
pub mod runner;

use thiserror::Error;

use framework::ModelError;
use load_parameters::ConfigError;

/// シミュレーション実行のエラー
#[derive(Error, Debug)]
pub enum SimulationError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("モデルの初期化に失敗しました: {0}")]
    Model(#[from] ModelError),
    #[error("軌道出力に失敗しました: {0}")]
    Io(#[from] std::io::Error),
}
