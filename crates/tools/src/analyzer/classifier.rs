//! 終局局面の分類
//!
//! - 引き分け: 終局局面の全駒配置（a1..h8 の段優先）
//! - 最終手に `#`: 詰まされた玉の位置と、その玉に利いている相手の駒
//! - それ以外: 所見なし（`game` マーカーのみ出力）

use chessmap_pgn::{
    Chess, Color, GameError, GameRecord, GameResult, Piece, Position, RawGameBlock, Square,
    attackers_of, board_fen, occupied, parse_game, replay,
};

/// 1局分の分類結果
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Finding {
    DrawLayout {
        pieces: Vec<(Piece, Square)>,
    },
    MateAttack {
        mated: Color,
        king: Square,
        attackers: Vec<(Piece, Square)>,
    },
    None,
}

impl Finding {
    pub fn label(&self) -> &'static str {
        match self {
            Finding::DrawLayout { .. } => "draw",
            Finding::MateAttack { .. } => "mate",
            Finding::None => "none",
        }
    }
}

/// 分類の失敗
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ClassifyError {
    /// その局だけ諦めればよい（パース失敗・非合法手）
    #[error(transparent)]
    Game(#[from] GameError),

    /// ルールモデルと詰みの定義が食い違っている。続行すると誤った所見を出すので致命的
    #[error("{detail}")]
    Invariant { detail: String, board: String },
}

impl ClassifyError {
    pub fn is_fatal(&self) -> bool {
        matches!(self, ClassifyError::Invariant { .. })
    }
}

/// ワーカーから呼ばれる分類器
///
/// 複数ワーカーから同時に呼ばれるので `Send + Sync` が必要。
pub trait GameClassifier: Send + Sync {
    fn classify(&self, block: &RawGameBlock) -> Result<Finding, ClassifyError>;
}

/// 棋譜をパースして終局局面までリプレイし分類する
#[derive(Debug, Default, Clone, Copy)]
pub struct ReplayClassifier;

impl ReplayClassifier {
    pub fn new() -> Self {
        Self
    }

    /// パース済みの棋譜を分類する
    pub fn classify_record(&self, record: &GameRecord) -> Result<Finding, ClassifyError> {
        let terminal = replay(record)?;

        if record.result == GameResult::Draw {
            return Ok(Finding::DrawLayout {
                pieces: occupied(&terminal),
            });
        }
        if record.ends_with_mate_marker() {
            return mate_attack(&terminal);
        }
        Ok(Finding::None)
    }
}

impl GameClassifier for ReplayClassifier {
    fn classify(&self, block: &RawGameBlock) -> Result<Finding, ClassifyError> {
        let record = parse_game(block)?;
        self.classify_record(&record)
    }
}

fn mate_attack(terminal: &Chess) -> Result<Finding, ClassifyError> {
    let board = terminal.board();
    // 詰まされた側 = 終局局面の手番
    let mated = terminal.turn();
    let opponent = !mated;

    let invariant = |detail: String| ClassifyError::Invariant {
        detail,
        board: board_fen(terminal),
    };

    let king = board
        .king_of(mated)
        .ok_or_else(|| invariant(format!("no {mated:?} king on a checkmate terminal position")))?;

    let squares = attackers_of(king, opponent, terminal);
    if squares.is_empty() {
        return Err(invariant(format!(
            "no {opponent:?} attacker on the mated king at {king}"
        )));
    }

    let mut attackers = Vec::with_capacity(squares.len());
    for sq in squares {
        match board.piece_at(sq) {
            Some(piece) if piece.color == opponent => attackers.push((piece, sq)),
            other => {
                return Err(invariant(format!(
                    "bad attacker square {sq} for king at {king}: found {other:?}"
                )));
            }
        }
    }

    Ok(Finding::MateAttack {
        mated,
        king,
        attackers,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chessmap_pgn::Role;

    fn block(text: &str) -> RawGameBlock {
        RawGameBlock {
            index: 0,
            line: 1,
            text: text.to_string(),
        }
    }

    fn classify(text: &str) -> Result<Finding, ClassifyError> {
        ReplayClassifier::new().classify(&block(text))
    }

    #[test]
    fn fools_mate_yields_one_attacker() {
        let finding = classify("[Result \"0-1\"]\n\n1. f3 e5 2. g4 Qh4# 0-1\n").unwrap();
        match finding {
            Finding::MateAttack {
                mated,
                king,
                attackers,
            } => {
                assert_eq!(mated, Color::White);
                assert_eq!(king.to_string(), "e1");
                assert_eq!(attackers.len(), 1);
                let (piece, sq) = attackers[0];
                assert_eq!(piece.role, Role::Queen);
                assert_eq!(piece.color, Color::Black);
                assert_eq!(sq.to_string(), "h4");
            }
            other => panic!("unexpected finding: {other:?}"),
        }
    }

    #[test]
    fn legal_mate_reports_knight_attacker() {
        // レガールの詰み: ビショップは e7 に利いていない
        let text = "[Result \"1-0\"]\n\n\
                    1. e4 e5 2. Nf3 d6 3. Bc4 Bg4 4. Nc3 g6 5. Nxe5 Bxd1 6. Bxf7+ Ke7 7. Nd5# 1-0\n";
        match classify(text).unwrap() {
            Finding::MateAttack {
                mated,
                king,
                attackers,
            } => {
                assert_eq!(mated, Color::Black);
                assert_eq!(king.to_string(), "e7");
                let squares: Vec<String> = attackers.iter().map(|(_, sq)| sq.to_string()).collect();
                assert_eq!(squares, vec!["d5"]);
            }
            other => panic!("unexpected finding: {other:?}"),
        }
    }

    #[test]
    fn double_check_mate_lists_both_attackers_in_square_order() {
        // Nd6 の王手と同時に e ファイルのクイーンが開く
        let text = "[Result \"1-0\"]\n\n\
                    1. d4 e5 2. Nc3 exd4 3. Ne4 a6 4. Qd2 a5 5. Qe3 b6 6. Nd6# 1-0\n";
        match classify(text).unwrap() {
            Finding::MateAttack {
                mated,
                king,
                attackers,
            } => {
                assert_eq!(mated, Color::Black);
                assert_eq!(king.to_string(), "e8");
                let seen: Vec<(Role, String)> =
                    attackers.iter().map(|(p, sq)| (p.role, sq.to_string())).collect();
                assert_eq!(
                    seen,
                    vec![(Role::Queen, "e3".to_string()), (Role::Knight, "d6".to_string())]
                );
                assert!(attackers.iter().all(|(p, _)| p.color == Color::White));
            }
            other => panic!("unexpected finding: {other:?}"),
        }
    }

    #[test]
    fn zero_move_draw_lists_initial_layout() {
        match classify("[Result \"1/2-1/2\"]\n\n1/2-1/2\n").unwrap() {
            Finding::DrawLayout { pieces } => assert_eq!(pieces.len(), 32),
            other => panic!("unexpected finding: {other:?}"),
        }
    }

    #[test]
    fn draw_layout_matches_terminal_occupancy() {
        match classify("[Result \"1/2-1/2\"]\n\n1. e4 d5 2. exd5 Qxd5 1/2-1/2\n").unwrap() {
            Finding::DrawLayout { pieces } => assert_eq!(pieces.len(), 30),
            other => panic!("unexpected finding: {other:?}"),
        }
    }

    #[test]
    fn decisive_game_without_mate_marker_has_no_finding() {
        let finding = classify("[Result \"1-0\"]\n\n1. e4 e5 2. Qh5 Nc6 1-0\n").unwrap();
        assert_eq!(finding, Finding::None);
    }

    #[test]
    fn mate_marker_on_earlier_move_is_ignored() {
        let finding = classify("[Result \"*\"]\n\n1. e4# e5 *\n").unwrap();
        assert_eq!(finding, Finding::None);
    }

    #[test]
    fn illegal_move_is_recoverable() {
        let err = classify("[Result \"1/2-1/2\"]\n\n1. e4 e5 2. Ke3 1/2-1/2\n").unwrap_err();
        assert!(!err.is_fatal());
        assert!(matches!(err, ClassifyError::Game(GameError::IllegalMove { index: 2, .. })));
    }

    #[test]
    fn illegal_move_surfaces_even_without_finding() {
        let err = classify("[Result \"1-0\"]\n\n1. e4 e5 2. Ke3 1-0\n").unwrap_err();
        assert!(matches!(err, ClassifyError::Game(GameError::IllegalMove { .. })));
    }

    #[test]
    fn parse_error_is_recoverable() {
        let err = classify("garbage\n").unwrap_err();
        assert!(!err.is_fatal());
        assert!(matches!(err, ClassifyError::Game(GameError::Parse { .. })));
    }

    #[test]
    fn mate_marker_without_checkmate_is_an_invariant_violation() {
        // `#` が付いているが実際には王手ですらない
        let err = classify("[Result \"1-0\"]\n\n1. e4 e5 2. Nf3# 1-0\n").unwrap_err();
        assert!(err.is_fatal());
        match err {
            ClassifyError::Invariant { detail, board } => {
                assert!(detail.contains("attacker"), "{detail}");
                assert!(board.ends_with(" b"), "{board}");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }
}
