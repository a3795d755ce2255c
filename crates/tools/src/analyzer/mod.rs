//! アーカイブ解析パイプライン
//!
//! 読み込みスレッドがアーカイブから1局ずつ取り出し、許可証（permit）を1枚取得してから
//! 固定数のワーカーへ投入する。許可証が尽きると読み込み側がブロックし、これが唯一の
//! 背圧になる。各ワーカーは棋譜をリプレイして分類し、1局分の出力をまとめて書き出した
//! 後に許可証を返却する。アーカイブを読み切ったら投入を止め、時間制限付きで全タスクの
//! 完了を待つ。
//!
//! ```text
//! RecordSource ──next_block──▶ Dispatcher ──(permit)──▶ worker × N
//!                                                         │ GameClassifier
//!                                                         ▼
//!                                                      Emitter ──▶ sink
//! ```

pub mod classifier;
pub mod config;
pub mod dispatcher;
pub mod emitter;
pub mod error;
pub mod permit;
pub mod shutdown;
pub mod stats;

pub use classifier::{ClassifyError, Finding, GameClassifier, ReplayClassifier};
pub use config::{AnalyzerConfig, PipelineOptions};
pub use dispatcher::Dispatcher;
pub use emitter::{Emitter, GAME_MARKER};
pub use error::PipelineError;
pub use permit::{Permit, PermitPool};
pub use stats::RunSummary;
