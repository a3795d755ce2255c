//! 所見の行出力
//!
//! 1局分の行（所見 0 行以上 + 末尾の `game`）はロックの外で文字列に組み立て、
//! 出力先のロックは `write_all` 1回の間だけ保持する。これで並行に終わった局同士の
//! 行が混ざらない。

use std::fmt::Write as _;
use std::io::{self, Write};
use std::sync::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};

use chessmap_pgn::{Piece, Square, piece_letter};

use super::classifier::Finding;
use crate::common::sync::lock_or_recover;

/// 1局分の出力の終端行
pub const GAME_MARKER: &str = "game";

const DRAW_PREFIX: char = 'd';
const MATE_PREFIX: char = 'c';

/// 出力先を排他的に所有する書き出し器
pub struct Emitter<W> {
    sink: Mutex<W>,
    games: AtomicU64,
    finding_lines: AtomicU64,
}

impl<W: Write> Emitter<W> {
    pub fn new(sink: W) -> Self {
        Self {
            sink: Mutex::new(sink),
            games: AtomicU64::new(0),
            finding_lines: AtomicU64::new(0),
        }
    }

    /// 1局分（所見 + `game`）をまとめて書き出し、所見の行数を返す
    pub fn emit_game(&self, finding: &Finding) -> io::Result<usize> {
        let mut block = String::with_capacity(256);
        let lines = render_finding(finding, &mut block);
        block.push_str(GAME_MARKER);
        block.push('\n');

        {
            let mut sink = lock_or_recover(&self.sink);
            sink.write_all(block.as_bytes())?;
        }

        self.games.fetch_add(1, Ordering::Relaxed);
        self.finding_lines.fetch_add(lines as u64, Ordering::Relaxed);
        Ok(lines)
    }

    pub fn flush(&self) -> io::Result<()> {
        lock_or_recover(&self.sink).flush()
    }

    /// 書き出した `game` 行の数
    pub fn games(&self) -> u64 {
        self.games.load(Ordering::Relaxed)
    }

    pub fn finding_lines(&self) -> u64 {
        self.finding_lines.load(Ordering::Relaxed)
    }

    /// 出力先を取り出す（finish が必要な出力先向け）
    pub fn into_inner(self) -> W {
        self.sink.into_inner().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

fn push_line(out: &mut String, prefix: char, letter: char, sq: Square) {
    // String への書き込みは失敗しない
    let _ = writeln!(out, "{prefix}{letter}{sq}");
}

fn push_pieces(out: &mut String, prefix: char, pieces: &[(Piece, Square)]) {
    for (piece, sq) in pieces {
        push_line(out, prefix, piece_letter(piece.role), *sq);
    }
}

/// 所見を行に整形して `out` に追記し、追記した行数を返す（`game` 行は含まない）
pub fn render_finding(finding: &Finding, out: &mut String) -> usize {
    match finding {
        Finding::DrawLayout { pieces } => {
            push_pieces(out, DRAW_PREFIX, pieces);
            pieces.len()
        }
        Finding::MateAttack {
            king, attackers, ..
        } => {
            push_line(out, MATE_PREFIX, 'K', *king);
            push_pieces(out, MATE_PREFIX, attackers);
            1 + attackers.len()
        }
        Finding::None => 0,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chessmap_pgn::{Color, Role};

    fn sq(name: &str) -> Square {
        name.parse().unwrap()
    }

    #[test]
    fn mate_block_lists_king_then_attackers() {
        let emitter = Emitter::new(Vec::new());
        let finding = Finding::MateAttack {
            mated: Color::White,
            king: sq("e1"),
            attackers: vec![(
                Piece {
                    color: Color::Black,
                    role: Role::Queen,
                },
                sq("h4"),
            )],
        };
        assert_eq!(emitter.emit_game(&finding).unwrap(), 2);
        assert_eq!(String::from_utf8(emitter.into_inner()).unwrap(), "cKe1\ncQh4\ngame\n");
    }

    #[test]
    fn draw_block_uses_uppercase_letters_for_both_colors() {
        let emitter = Emitter::new(Vec::new());
        let finding = Finding::DrawLayout {
            pieces: vec![
                (
                    Piece {
                        color: Color::White,
                        role: Role::King,
                    },
                    sq("g1"),
                ),
                (
                    Piece {
                        color: Color::Black,
                        role: Role::Knight,
                    },
                    sq("c6"),
                ),
            ],
        };
        emitter.emit_game(&finding).unwrap();
        assert_eq!(emitter.finding_lines(), 2);
        assert_eq!(String::from_utf8(emitter.into_inner()).unwrap(), "dKg1\ndNc6\ngame\n");
    }

    #[test]
    fn no_finding_writes_marker_only() {
        let emitter = Emitter::new(Vec::new());
        assert_eq!(emitter.emit_game(&Finding::None).unwrap(), 0);
        assert_eq!(emitter.emit_game(&Finding::None).unwrap(), 0);
        assert_eq!(emitter.games(), 2);
        assert_eq!(String::from_utf8(emitter.into_inner()).unwrap(), "game\ngame\n");
    }

    struct FailingSink;

    impl Write for FailingSink {
        fn write(&mut self, _buf: &[u8]) -> io::Result<usize> {
            Err(io::Error::new(io::ErrorKind::BrokenPipe, "closed"))
        }
        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn sink_errors_propagate() {
        let emitter = Emitter::new(FailingSink);
        let err = emitter.emit_game(&Finding::None).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::BrokenPipe);
        assert_eq!(emitter.games(), 0);
    }
}
