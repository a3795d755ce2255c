//! PGN データベースを1局ずつの生テキストに分割する
//!
//! アーカイブ全体をメモリに載せないよう、1行ずつ読み進めて1局分たまった時点で返す。
//! 区切りの規則:
//! - 空行を読み飛ばした後の最初の非空行から1局が始まる
//! - `[Name "value"]` 形のタグ行が `{` コメントの外に現れ、かつそれまでに指し手部
//!   （タグ行以外の行）か空行を読んでいれば、その行は次の局の先頭として保留する
//! - 閉じていない `{` コメントの中でも、空行直後のタグ行では区切る
//!   （壊れた1局が以降のアーカイブ全体を飲み込まないように）
//! - 入力末尾で最後の局を返す
//!
//! PGN として解釈できないテキストも1局として返す（パースで弾いて件数に計上するため）。

use std::io::{self, BufRead};

use crate::record::TAG_PAIR;

const UTF8_BOM: char = '\u{feff}';

/// アーカイブ中の1局分の生テキスト
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawGameBlock {
    /// アーカイブ内の通し番号（0 始まり）
    pub index: u64,
    /// 先頭行の行番号（1 始まり）
    pub line: usize,
    pub text: String,
}

/// 1局ずつ生テキストを供給するソース
///
/// 一度きりの前方走査で、`Ok(None)` を返したら以後は呼ばない前提。
/// 読み込み中の I/O エラーは `Err` で返す（呼び出し側では致命的扱い）。
pub trait RecordSource {
    fn next_block(&mut self) -> io::Result<Option<RawGameBlock>>;
}

/// PGN アーカイブ分割器
///
/// reader の所有権を持つので、途中で打ち切った場合も drop でハンドルが解放される。
pub struct PgnSplitter<R> {
    reader: R,
    line_no: usize,
    emitted: u64,
    /// 直前の局の末尾で読んでしまった次局の先頭行 (行番号, 内容)
    pending: Option<(usize, String)>,
    exhausted: bool,
    buf: Vec<u8>,
}

impl<R: BufRead> PgnSplitter<R> {
    pub fn new(reader: R) -> Self {
        Self {
            reader,
            line_no: 0,
            emitted: 0,
            pending: None,
            exhausted: false,
            buf: Vec::with_capacity(256),
        }
    }

    /// これまでに返した局数
    pub fn emitted(&self) -> u64 {
        self.emitted
    }

    fn read_line(&mut self) -> io::Result<Option<String>> {
        self.buf.clear();
        let n = self.reader.read_until(b'\n', &mut self.buf)?;
        if n == 0 {
            return Ok(None);
        }
        self.line_no += 1;
        // 不正な UTF-8 で全体を止めないよう置換文字で読む（その局はパースで弾かれる）
        let mut line = String::from_utf8_lossy(&self.buf).into_owned();
        while line.ends_with('\n') || line.ends_with('\r') {
            line.pop();
        }
        if self.line_no == 1 && line.starts_with(UTF8_BOM) {
            line.remove(0);
        }
        Ok(Some(line))
    }
}

impl<R: BufRead> RecordSource for PgnSplitter<R> {
    fn next_block(&mut self) -> io::Result<Option<RawGameBlock>> {
        let mut text = String::new();
        let mut start_line = 0usize;
        let mut seen_movetext = false;
        let mut seen_blank = false;
        let mut prev_blank = false;
        let mut in_comment = false;

        if let Some((line_no, line)) = self.pending.take() {
            start_line = line_no;
            text.push_str(&line);
            text.push('\n');
        }

        while !self.exhausted {
            let Some(line) = self.read_line()? else {
                self.exhausted = true;
                break;
            };
            let trimmed = line.trim();
            if text.is_empty() {
                if trimmed.is_empty() {
                    continue;
                }
                start_line = self.line_no;
            } else if TAG_PAIR.is_match(trimmed) {
                let boundary =
                    if in_comment { prev_blank } else { seen_movetext || seen_blank };
                if boundary {
                    if in_comment {
                        log::debug!("unterminated comment before line {}", self.line_no);
                    }
                    self.pending = Some((self.line_no, line));
                    break;
                }
            }
            prev_blank = trimmed.is_empty();
            if prev_blank {
                seen_blank = true;
            } else if in_comment || !(trimmed.starts_with('[') || trimmed.starts_with('%')) {
                seen_movetext = true;
                in_comment = comment_open_after(trimmed, in_comment);
            }
            text.push_str(&line);
            text.push('\n');
        }

        if text.is_empty() {
            return Ok(None);
        }
        // 局間の空行は次局に持ち越さない
        let keep = text.trim_end().len();
        text.truncate(keep);
        text.push('\n');

        let block = RawGameBlock {
            index: self.emitted,
            line: start_line,
            text,
        };
        self.emitted += 1;
        log::trace!("split game #{} starting at line {}", block.index, block.line);
        Ok(Some(block))
    }
}

/// 行末時点で `{` コメントの中にいるか（`;` 以降は行末コメント）
fn comment_open_after(line: &str, mut inside: bool) -> bool {
    for c in line.chars() {
        match (inside, c) {
            (true, '}') => inside = false,
            (false, '{') => inside = true,
            (false, ';') => break,
            _ => {}
        }
    }
    inside
}
