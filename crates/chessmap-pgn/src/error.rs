//! 1局単位のエラー
//!
//! どちらもその対局だけを諦めれば続行できる（回復可能）。アーカイブ全体を止める
//! 致命的エラーは tools 側の `PipelineError` が扱う。

/// 棋譜パース・リプレイで発生する対局単位のエラー
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum GameError {
    /// 生テキストが棋譜として解釈できない
    #[error("malformed game record at line {line}: {reason}")]
    Parse { line: usize, reason: String },

    /// リプレイ中に非合法手が現れた（`index` は 0 始まりの手数）
    #[error("illegal move #{index} '{notation}' ({side} to move): {reason}")]
    IllegalMove {
        index: usize,
        notation: String,
        side: &'static str,
        reason: String,
    },
}

impl GameError {
    pub(crate) fn parse(line: usize, reason: impl Into<String>) -> Self {
        GameError::Parse {
            line,
            reason: reason.into(),
        }
    }

    /// ログ集計用の短いラベル
    pub fn kind(&self) -> &'static str {
        match self {
            GameError::Parse { .. } => "parse",
            GameError::IllegalMove { .. } => "illegal_move",
        }
    }
}
