// src/simulation/load_parameters.rs

use std::fs::File;
use std::path::{Path, PathBuf};

use log::info;
use serde_yaml::from_reader;
use thiserror::Error;

use crate::config::SimulationConfig;

/// 設定読み込みのエラー
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("{} を開けません: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("YAML の解析に失敗しました: {0}")]
    Yaml(#[from] serde_yaml::Error),
    #[error("設定値が不正です: {0}")]
    Invalid(String),
}

/// シミュレーション設定の読み込み
///
/// # 引数
/// - `path`: YAML ファイルのパス
///
/// # 戻り値
/// - 検査済みの設定
pub fn load_config<P: AsRef<Path>>(path: P) -> Result<SimulationConfig, ConfigError> {
    let path = path.as_ref();
    let file = File::open(path).map_err(|source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let config: SimulationConfig = from_reader(file)?;
    config.validate().map_err(ConfigError::Invalid)?;
    info!("設定を読み込みました: {}", path.display());
    Ok(config)
}

/// 文字列からの読み込み
pub fn parse_config(text: &str) -> Result<SimulationConfig, ConfigError> {
    let config: SimulationConfig = serde_yaml::from_str(text)?;
    config.validate().map_err(ConfigError::Invalid)?;
    Ok(config)
}
