// src/main.rs

use std::error::Error;
use std::fs;
use std::path::PathBuf;

use clap::Parser;
use log::info;

use msc_intercept::simulation::load_parameters::{load_config, ConfigError};
use msc_intercept::simulation::monte_carlo::{format_trial, run_monte_carlo};

/// 迎撃交戦の Monte-Carlo シミュレーション
#[derive(Parser, Debug)]
#[command(version)]
struct Args {
    /// 設定ファイル (YAML)
    #[arg(long, default_value = "config/engagement.yaml")]
    config: PathBuf,

    /// 試行数（設定を上書き）
    #[arg(long)]
    runs: Option<u32>,

    /// 最初の試行番号（設定を上書き）
    #[arg(long)]
    run_start: Option<u32>,

    /// 軌道 CSV の出力先ディレクトリ
    #[arg(long, default_value = "output")]
    output_dir: PathBuf,

    /// 各試行の結果を表示する
    #[arg(long)]
    print_all: bool,
}

fn main() -> Result<(), Box<dyn Error>> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();
    let args = Args::parse();

    // 設定の読み込みと引数による上書き
    let mut config = load_config(&args.config)?;
    if let Some(runs) = args.runs {
        config.scenario.runs = runs;
    }
    if let Some(run_start) = args.run_start {
        config.scenario.run_start = run_start;
    }
    config.scenario.print_all |= args.print_all;
    config.validate().map_err(ConfigError::Invalid)?;

    let output_dir = match config.scenario.output_interval() {
        Some(_) => {
            fs::create_dir_all(&args.output_dir)?;
            Some(args.output_dir.as_path())
        }
        None => None,
    };

    let print_all = config.scenario.print_all;
    let flyer_threshold = config.scenario.flyer_threshold;
    if print_all {
        println!("{:>5}{:>10}{:>10}{:>10}", "run", "miss", "tof", "seed");
    }
    let (results, stats) = run_monte_carlo(&config, output_dir, |result| {
        if print_all {
            println!("{}", format_trial(result, flyer_threshold));
        }
    })?;

    let failures: usize = results.iter().map(|r| r.frame_failures).sum();
    let diverged = results.iter().filter(|r| r.diverged).count();
    info!("フレーム更新の失敗 {} 回、発散した試行 {} 件", failures, diverged);

    println!("{}", stats);
    Ok(())
}
