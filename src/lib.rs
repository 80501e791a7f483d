// src/lib.rs

//! 2 次元の迎撃交戦シミュレーション
//!
//! 射撃管制レーダーの修正球座標 (MSC) カルマンフィルタとウィーブ追尾、
//! ミサイル搭載シーカとデータリンクの融合、誘導則、オートパイロットを
//! マルチレート RK4 スケジューラ上で組み合わせ、Monte-Carlo で外れ距離を評価する。

pub mod config;
pub mod estimation;
pub mod math;
pub mod models;
pub mod simulation;
