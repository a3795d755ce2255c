//! chessmap tools
//!
//! - [`analyzer`]: PGN アーカイブを並列に解析し、引き分け局面・詰み局面の駒配置を出力する
//! - [`heatmap`]: 解析出力をマス目ごとに集計する
//! - [`common`]: 入出力・同期の共通ユーティリティ

pub mod analyzer;
pub mod common;
pub mod heatmap;
