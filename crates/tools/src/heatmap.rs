//! 解析出力のマス目別集計
//!
//! `analyze_archive` の出力（`cQh4` のような所見行と `game` 行）を読み、
//! `<接頭辞><駒>` ごとに 8×8 の出現回数を数える。解釈できない行は無視する。

use std::collections::BTreeMap;
use std::fmt::Write as _;
use std::io::{self, BufRead};

use serde::Serialize;

pub const PREFIXES: [char; 2] = ['c', 'd'];
pub const PIECE_TYPES: [char; 6] = ['K', 'Q', 'R', 'B', 'N', 'P'];
const FILES: &str = "abcdefgh";

/// 行 0 が 8 段目、列 0 が a 筋（盤面図と同じ向き）
pub type Grid = [[u64; 8]; 8];

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HeatmapTally {
    pub games: u64,
    pub heatmaps: BTreeMap<String, Grid>,
}

impl Default for HeatmapTally {
    fn default() -> Self {
        let heatmaps = PREFIXES
            .iter()
            .flat_map(|p| PIECE_TYPES.iter().map(move |k| (format!("{p}{k}"), [[0; 8]; 8])))
            .collect();
        Self { games: 0, heatmaps }
    }
}

/// `e4` → (行, 列)
fn coord_to_index(coord: &str) -> Option<(usize, usize)> {
    let bytes = coord.as_bytes();
    if bytes.len() != 2 {
        return None;
    }
    let file = bytes[0].checked_sub(b'a').filter(|f| *f < 8)?;
    let rank = bytes[1].checked_sub(b'1').filter(|r| *r < 8)?;
    Some((7 - rank as usize, file as usize))
}

fn piece_name(piece: char) -> &'static str {
    match piece {
        'K' => "KING",
        'Q' => "QUEEN",
        'R' => "ROOK",
        'B' => "BISHOP",
        'N' => "KNIGHT",
        _ => "PAWN",
    }
}

/// 集計表の見出し
pub fn title(key: &str) -> String {
    let mut chars = key.chars();
    let (Some(prefix), Some(piece)) = (chars.next(), chars.next()) else {
        return key.to_string();
    };
    if key == "cK" {
        return "...a KING to be checkmated on.".to_string();
    }
    let tail = if prefix == 'c' {
        "to checkmate a king."
    } else {
        "to end up on in a draw."
    };
    format!("...a {} {tail}", piece_name(piece))
}

impl HeatmapTally {
    pub fn new() -> Self {
        Self::default()
    }

    /// 1行を集計に反映する。`game` 行なら true
    pub fn observe_line(&mut self, line: &str) -> bool {
        let line = line.trim();
        if line == crate::analyzer::GAME_MARKER {
            self.games += 1;
            return true;
        }
        if line.len() < 3 || !line.is_ascii() {
            return false;
        }
        let (key, coord) = line.split_at(2);
        let Some(grid) = self.heatmaps.get_mut(key) else {
            return false;
        };
        if let Some((row, col)) = coord_to_index(coord) {
            grid[row][col] += 1;
        }
        false
    }

    /// reader の全行を集計する（10 万局ごとに進捗をログに出す）
    pub fn tally_reader<R: BufRead>(&mut self, reader: R) -> io::Result<()> {
        for line in reader.lines() {
            let line = line?;
            if self.observe_line(&line) && self.games.is_multiple_of(100_000) {
                log::info!("{} games processed...", self.games);
            }
        }
        Ok(())
    }

    pub fn grid(&self, key: &str) -> Option<&Grid> {
        self.heatmaps.get(key)
    }

    /// 全集計表をテキストで出力する（接頭辞 c → d、駒 K Q R B N P の順）
    pub fn render_text(&self) -> String {
        let mut out = String::new();
        let _ = writeln!(out, "games: {}", self.games);
        for prefix in PREFIXES {
            for piece in PIECE_TYPES {
                let key = format!("{prefix}{piece}");
                let Some(grid) = self.heatmaps.get(&key) else {
                    continue;
                };
                let width = grid
                    .iter()
                    .flatten()
                    .map(|n| n.to_string().len())
                    .max()
                    .unwrap_or(1);
                let _ = writeln!(out);
                let _ = writeln!(out, "[{key}] {}", title(&key));
                for (row, counts) in grid.iter().enumerate() {
                    let _ = write!(out, "{} ", 8 - row);
                    for n in counts {
                        let _ = write!(out, " {n:>width$}");
                    }
                    let _ = writeln!(out);
                }
                let _ = write!(out, "  ");
                for f in FILES.chars() {
                    let _ = write!(out, " {f:>width$}");
                }
                let _ = writeln!(out);
            }
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counts_games_and_squares() {
        let input = "cKe1\ncQh4\ngame\ndKa1\ndKa1\ndPh8\ngame\ngame\n";
        let mut tally = HeatmapTally::new();
        tally.tally_reader(input.as_bytes()).unwrap();
        assert_eq!(tally.games, 3);
        assert_eq!(tally.grid("cK").unwrap()[7][4], 1);
        assert_eq!(tally.grid("cQ").unwrap()[4][7], 1);
        assert_eq!(tally.grid("dK").unwrap()[7][0], 2);
        assert_eq!(tally.grid("dP").unwrap()[0][7], 1);
    }

    #[test]
    fn ignores_junk_lines() {
        let mut tally = HeatmapTally::new();
        for line in ["", "x", "xKe1", "cXe1", "cKz9", "cKe10", "cKé1", "  game  "] {
            tally.observe_line(line);
        }
        assert_eq!(tally.games, 1);
        assert!(tally.heatmaps.values().flatten().flatten().all(|n| *n == 0));
    }

    #[test]
    fn twelve_grids_are_always_present() {
        let tally = HeatmapTally::new();
        assert_eq!(tally.heatmaps.len(), 12);
        let json = serde_json::to_value(&tally).unwrap();
        assert_eq!(json["games"], 0);
        assert_eq!(json["heatmaps"]["dN"].as_array().unwrap().len(), 8);
    }

    #[test]
    fn text_table_puts_rank_eight_first() {
        let mut tally = HeatmapTally::new();
        tally.observe_line("dRa8");
        let text = tally.render_text();
        assert!(text.contains("[dR] ...a ROOK to end up on in a draw."), "{text}");
        assert!(text.contains("8  1 0 0 0 0 0 0 0"), "{text}");
        assert!(text.contains("[cK] ...a KING to be checkmated on."));
    }
}
