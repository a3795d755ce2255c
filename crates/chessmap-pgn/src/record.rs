//! 1局分の PGN テキストを結果タグと SAN 指し手列にパースする
//!
//! 指し手の合法性はここでは見ない（SAN として構文的に正しいかだけ確認する）。
//! 合法性はリプレイ時に [`crate::model::apply_move`] が判定する。

use std::sync::LazyLock;

use regex::Regex;
use shakmaty::san::SanPlus;

use crate::error::GameError;
use crate::splitter::RawGameBlock;

/// `[Name "value"]` 形式のタグ行（値中の `\"` `\\` エスケープを許す）
pub(crate) static TAG_PAIR: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"^\[\s*([A-Za-z0-9_+#=:-]+)\s+"((?:[^"\\]|\\.)*)"\s*\]$"#)
        .expect("tag pair regex is valid")
});

/// 対局結果タグ
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum GameResult {
    WhiteWins,
    BlackWins,
    Draw,
    Unknown,
}

impl GameResult {
    /// 終局記号（`1-0` `0-1` `1/2-1/2` `*`）を解釈する
    pub fn from_token(token: &str) -> Option<Self> {
        match token {
            "1-0" => Some(GameResult::WhiteWins),
            "0-1" => Some(GameResult::BlackWins),
            "1/2-1/2" => Some(GameResult::Draw),
            "*" => Some(GameResult::Unknown),
            _ => None,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            GameResult::WhiteWins => "white_win",
            GameResult::BlackWins => "black_win",
            GameResult::Draw => "draw",
            GameResult::Unknown => "unknown",
        }
    }
}

/// パース済みの1局（不変）
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GameRecord {
    /// タグ (名前, 値)。ファイル中の順序を保持する
    pub tags: Vec<(String, String)>,
    pub result: GameResult,
    /// SAN 指し手（`+` / `#` の記号は残し、`!` `?` の注記は除去済み）
    pub moves: Vec<String>,
}

impl GameRecord {
    pub fn tag(&self, name: &str) -> Option<&str> {
        self.tags.iter().find(|(k, _)| k == name).map(|(_, v)| v.as_str())
    }

    /// 最終手に詰み記号 `#` が付いているか（途中の手の `#` は見ない）
    pub fn ends_with_mate_marker(&self) -> bool {
        self.moves.last().is_some_and(|mv| mv.contains('#'))
    }
}

/// 1局分の生テキストをパースする
pub fn parse_game(block: &RawGameBlock) -> Result<GameRecord, GameError> {
    let mut tags = Vec::new();
    let mut scanner = MovetextScanner::default();
    let mut in_movetext = false;

    for (offset, line) in block.text.lines().enumerate() {
        let line_no = block.line + offset;
        let trimmed = line.trim();
        if trimmed.starts_with('%') {
            // PGN のエスケープ行
            continue;
        }
        if !in_movetext && trimmed.starts_with('[') {
            let caps = TAG_PAIR
                .captures(trimmed)
                .ok_or_else(|| GameError::parse(line_no, format!("invalid tag pair: {trimmed}")))?;
            tags.push((caps[1].to_string(), unescape(&caps[2])));
            continue;
        }
        if trimmed.is_empty() {
            continue;
        }
        in_movetext = true;
        scanner.feed_line(line, line_no)?;
    }
    let last_line = block.line + block.text.lines().count().saturating_sub(1);
    let (moves, termination) = scanner.finish(last_line)?;

    if tags.is_empty() && moves.is_empty() && termination.is_none() {
        return Err(GameError::parse(block.line, "no tag pairs or movetext"));
    }

    let result = tags
        .iter()
        .find(|(k, _)| k == "Result")
        .map(|(_, v)| GameResult::from_token(v).unwrap_or(GameResult::Unknown))
        .or(termination)
        .unwrap_or(GameResult::Unknown);

    Ok(GameRecord {
        tags,
        result,
        moves,
    })
}

fn unescape(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    let mut chars = raw.chars();
    while let Some(c) = chars.next() {
        if c == '\\' {
            if let Some(next) = chars.next() {
                out.push(next);
            }
        } else {
            out.push(c);
        }
    }
    out
}

/// 指し手部の字句解析（行をまたぐコメント・変化手順の状態を保持する）
#[derive(Default)]
struct MovetextScanner {
    moves: Vec<String>,
    termination: Option<GameResult>,
    /// `{` コメントの開始行（閉じていなければ Some）
    brace_open: Option<usize>,
    /// `(` 変化手順のネスト深さと最外側の開始行
    variation_depth: usize,
    variation_open: usize,
    token: String,
}

impl MovetextScanner {
    fn feed_line(&mut self, line: &str, line_no: usize) -> Result<(), GameError> {
        for c in line.chars() {
            if self.brace_open.is_some() {
                if c == '}' {
                    self.brace_open = None;
                }
                continue;
            }
            match c {
                '{' => {
                    self.flush(line_no)?;
                    self.brace_open = Some(line_no);
                }
                ';' => {
                    // 行末までコメント
                    self.flush(line_no)?;
                    return Ok(());
                }
                '(' => {
                    self.flush(line_no)?;
                    if self.variation_depth == 0 {
                        self.variation_open = line_no;
                    }
                    self.variation_depth += 1;
                }
                ')' => {
                    self.flush(line_no)?;
                    if self.variation_depth == 0 {
                        return Err(GameError::parse(line_no, "unbalanced ')' in movetext"));
                    }
                    self.variation_depth -= 1;
                }
                c if c.is_whitespace() => self.flush(line_no)?,
                _ => self.token.push(c),
            }
        }
        self.flush(line_no)
    }

    fn flush(&mut self, line_no: usize) -> Result<(), GameError> {
        if self.token.is_empty() {
            return Ok(());
        }
        let token = std::mem::take(&mut self.token);
        if self.variation_depth > 0 {
            return Ok(());
        }
        if let Some(result) = GameResult::from_token(&token) {
            if self.termination.is_some() {
                return Err(GameError::parse(line_no, "duplicate game termination marker"));
            }
            self.termination = Some(result);
            return Ok(());
        }
        if self.termination.is_some() {
            return Err(GameError::parse(
                line_no,
                format!("unexpected token after game termination: {token}"),
            ));
        }
        if token.starts_with('$') {
            // NAG
            return Ok(());
        }
        let san = strip_move_number(&token).trim_end_matches(['!', '?']);
        if san.is_empty() {
            return Ok(());
        }
        san.parse::<SanPlus>()
            .map_err(|e| GameError::parse(line_no, format!("invalid SAN '{san}': {e}")))?;
        self.moves.push(san.to_string());
        Ok(())
    }

    fn finish(self, last_line: usize) -> Result<(Vec<String>, Option<GameResult>), GameError> {
        if let Some(open) = self.brace_open {
            return Err(GameError::parse(open, "unterminated '{' comment"));
        }
        if self.variation_depth > 0 {
            return Err(GameError::parse(self.variation_open, "unterminated '(' variation"));
        }
        debug_assert!(self.token.is_empty(), "token flushed at end of line {last_line}");
        Ok((self.moves, self.termination))
    }
}

/// `12.` `12...` `12.e4` の手数部分を取り除く
fn strip_move_number(token: &str) -> &str {
    let digits = token.len() - token.trim_start_matches(|c: char| c.is_ascii_digit()).len();
    if digits == 0 {
        return token;
    }
    let rest = &token[digits..];
    let dotted = rest.trim_start_matches('.');
    if dotted.len() == rest.len() {
        // 数字だけで `.` がない（例: 不正なトークン）はそのまま SAN 検証に回す
        return token;
    }
    dotted
}
