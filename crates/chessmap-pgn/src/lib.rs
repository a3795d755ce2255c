//! PGN アーカイブの分割・棋譜パース・終局局面リプレイ
//!
//! - [`splitter`]: アーカイブを1局ずつの生テキストに分割する（逐次・一度きり）
//! - [`record`]: 生テキストを結果タグと SAN 指し手列にパースする
//! - [`model`]: 初期局面から指し手を適用して終局局面を得る。合法性判定・利き計算は
//!   shakmaty に委譲する
//! - [`io`]: 入力オープン（gzip は内容で判定）

pub mod error;
pub mod io;
pub mod model;
pub mod record;
pub mod splitter;

pub use error::GameError;
pub use io::{ArchiveReader, open_reader};
pub use model::{
    apply_move, attackers_of, board_fen, occupied, piece_letter, replay, starting_position,
};
pub use record::{GameRecord, GameResult, parse_game};
pub use splitter::{PgnSplitter, RawGameBlock, RecordSource};

// 利用側がルールエンジンの型を直接 import しなくて済むように再公開する
pub use shakmaty::{Chess, Color, Piece, Position, Role, Square};
