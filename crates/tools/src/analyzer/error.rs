//! パイプライン全体を止める致命的エラー
//!
//! 1局単位の回復可能なエラー（パース失敗・非合法手）は
//! [`chessmap_pgn::GameError`] として扱い、ここには含めない。

use std::io;
use std::time::Duration;

#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    /// 詰み局面のはずなのに玉が無い・利きが無いなど、ルールモデルと分類の整合が崩れた
    #[error("invariant violated in game #{game} (line {line}): {detail} [board: {board}]")]
    InvariantViolation {
        game: u64,
        line: usize,
        detail: String,
        board: String,
    },

    /// 終了待ちが制限時間を超えた
    #[error("drain timed out after {timeout:?} with {outstanding} game(s) still in flight")]
    DrainTimeout { timeout: Duration, outstanding: usize },

    /// タスク内で panic が発生した
    #[error("task for game #{game} (line {line}) panicked: {message}")]
    TaskPanicked {
        game: u64,
        line: usize,
        message: String,
    },

    #[error("failed to read archive after {games_read} game(s): {source}")]
    Source {
        games_read: u64,
        #[source]
        source: io::Error,
    },

    #[error("failed to write output for game #{game}: {source}")]
    Output {
        game: u64,
        #[source]
        source: io::Error,
    },

    #[error("failed to flush output: {0}")]
    Flush(#[source] io::Error),

    #[error("failed to spawn worker thread: {0}")]
    Spawn(#[source] io::Error),

    /// 全ワーカーが終了してしまい投入できない
    #[error("worker pool closed while {games_dispatched} game(s) were dispatched")]
    PoolClosed { games_dispatched: u64 },

    #[error("invalid configuration: {0}")]
    Config(String),
}

impl PipelineError {
    /// ログ・集計用の短いラベル
    pub fn kind(&self) -> &'static str {
        match self {
            PipelineError::InvariantViolation { .. } => "invariant_violation",
            PipelineError::DrainTimeout { .. } => "drain_timeout",
            PipelineError::TaskPanicked { .. } => "task_panicked",
            PipelineError::Source { .. } => "source",
            PipelineError::Output { .. } => "output",
            PipelineError::Flush(_) => "flush",
            PipelineError::Spawn(_) => "spawn",
            PipelineError::PoolClosed { .. } => "pool_closed",
            PipelineError::Config(_) => "config",
        }
    }
}
