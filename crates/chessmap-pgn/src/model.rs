//! 終局局面のリプレイと盤面照会
//!
//! 局面は不変値として扱い、指し手の適用は常に新しい局面を返す。
//! 合法手判定・SAN 解決・利き計算は shakmaty に委譲する。

use std::sync::LazyLock;

use shakmaty::san::SanPlus;
use shakmaty::{Chess, Color, Piece, Position, Role, Square};

use crate::error::GameError;
use crate::record::GameRecord;

/// 平手初期局面（プロセス全体で共有する読み取り専用値）
static STARTING_POSITION: LazyLock<Chess> = LazyLock::new(Chess::default);

pub fn starting_position() -> &'static Chess {
    &STARTING_POSITION
}

fn side_label(color: Color) -> &'static str {
    match color {
        Color::White => "white",
        Color::Black => "black",
    }
}

/// SAN 1手を適用した次の局面を返す
///
/// `index` はエラー報告用の手数（0 始まり）。
pub fn apply_move(pos: &Chess, notation: &str, index: usize) -> Result<Chess, GameError> {
    let illegal = |reason: String| GameError::IllegalMove {
        index,
        notation: notation.to_string(),
        side: side_label(pos.turn()),
        reason,
    };
    let san: SanPlus = notation.parse().map_err(|e| illegal(format!("{e}")))?;
    let mv = san.san.to_move(pos).map_err(|e| illegal(format!("{e}")))?;
    pos.clone().play(&mv).map_err(|e| illegal(format!("{e}")))
}

/// 初期局面から全指し手を適用して終局局面を得る（最初の非合法手で打ち切る）
pub fn replay(record: &GameRecord) -> Result<Chess, GameError> {
    record
        .moves
        .iter()
        .enumerate()
        .try_fold(starting_position().clone(), |pos, (index, notation)| {
            apply_move(&pos, notation, index)
        })
}

/// `target` に利いている `by` 側の駒のマス（a1..h8 の昇順）
pub fn attackers_of(target: Square, by: Color, pos: &Chess) -> Vec<Square> {
    let board = pos.board();
    board.attacks_to(target, by, board.occupied()).into_iter().collect()
}

/// 駒のあるマスを段優先（a1, b1, ..., h1, a2, ..., h8）で列挙する
pub fn occupied(pos: &Chess) -> Vec<(Piece, Square)> {
    let board = pos.board();
    board
        .occupied()
        .into_iter()
        .filter_map(|sq| board.piece_at(sq).map(|piece| (piece, sq)))
        .collect()
}

/// 出力用の駒文字（手番色によらず大文字。キングは `K`）
pub fn piece_letter(role: Role) -> char {
    role.char().to_ascii_uppercase()
}

/// 診断用の盤面文字列（FEN の駒配置部 + 手番）
pub fn board_fen(pos: &Chess) -> String {
    let board = pos.board();
    let mut out = String::with_capacity(72);
    for rank in (0..8u32).rev() {
        let mut empty = 0u8;
        for file in 0..8u32 {
            let sq = Square::new(rank * 8 + file);
            match board.piece_at(sq) {
                Some(piece) => {
                    if empty > 0 {
                        out.push(char::from(b'0' + empty));
                        empty = 0;
                    }
                    let c = piece.role.char();
                    out.push(match piece.color {
                        Color::White => c.to_ascii_uppercase(),
                        Color::Black => c,
                    });
                }
                None => empty += 1,
            }
        }
        if empty > 0 {
            out.push(char::from(b'0' + empty));
        }
        if rank != 0 {
            out.push('/');
        }
    }
    out.push(' ');
    out.push(match pos.turn() {
        Color::White => 'w',
        Color::Black => 'b',
    });
    out
}
